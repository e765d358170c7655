use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use survey_merge::*;

use crate::args::{Args, Command};
use crate::dash::config_reader::*;
use crate::dash::store::*;
use crate::dash::upload::*;

pub mod config_reader;
pub mod io_common;
mod io_csv;
pub mod io_export;
mod io_xlsx;
pub mod store;
pub mod upload;
pub mod views;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DashError {
    #[snafu(display("Exactly 2 spreadsheet files must be uploaded together (got {count})"))]
    InvalidFileCount { count: usize },
    #[snafu(display("{name}: only .xlsx and .csv files can be uploaded"))]
    UnsupportedFileType { name: String },
    #[snafu(display("{message}"))]
    MissingArgument { message: String },
    #[snafu(display("Invalid exclusion: {source}"))]
    InvalidExclusion { source: SurveyError },

    #[snafu(display("Error reading file {path}"))]
    ReadingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening Excel file {name}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        name: String,
    },
    #[snafu(display("{name}: no worksheet or no header row"))]
    EmptySpreadsheet { name: String },
    #[snafu(display("{name}: could not read the cell at line {lineno}: {content}"))]
    ExcelWrongCellType {
        name: String,
        lineno: u64,
        content: String,
    },
    #[snafu(display("{name}: malformed CSV"))]
    CsvParse { source: csv::Error, name: String },

    #[snafu(display("Merge aborted, could not read {name}: {source}"))]
    Merge {
        name: String,
        #[snafu(source(from(DashError, Box::new)))]
        source: Box<DashError>,
    },
    #[snafu(display("Decoding {name} did not complete"))]
    DecodeTask {
        source: tokio::task::JoinError,
        name: String,
    },

    #[snafu(display("An upload is already running for {track} batch {batch}"))]
    UploadInProgress { track: String, batch: String },

    #[snafu(display("Error accessing the stored value {key}"))]
    StorageIo {
        source: std::io::Error,
        key: String,
    },
    #[snafu(display("Error encoding the stored value {key}"))]
    StorageJson {
        source: serde_json::Error,
        key: String,
    },
    #[snafu(display("Error writing the Excel export"))]
    Export { source: rust_xlsxwriter::XlsxError },
    #[snafu(display("Error writing the CSV export"))]
    ExportCsv { source: csv::Error },
    #[snafu(display("Error writing the export to {path}"))]
    ExportIo {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("Error opening configuration {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing configuration {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid date {value:?} (expected YYYY-MM-DD)"))]
    InvalidDate {
        source: chrono::ParseError,
        value: String,
    },
}

pub type DashResult<T> = Result<T, DashError>;

/// How an error is reported to the user.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ErrorKind {
    /// Wrong usage, reported as a warning. Nothing was attempted.
    Validation,
    /// An uploaded file could not be decoded. Nothing was stored.
    Parse,
    Merge,
    Storage,
    /// Another operation is running on the same batch.
    Conflict,
    Config,
}

impl DashError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashError::InvalidFileCount { .. }
            | DashError::UnsupportedFileType { .. }
            | DashError::MissingArgument { .. }
            | DashError::InvalidExclusion { .. } => ErrorKind::Validation,
            DashError::ReadingFile { .. }
            | DashError::OpeningExcel { .. }
            | DashError::EmptySpreadsheet { .. }
            | DashError::ExcelWrongCellType { .. }
            | DashError::CsvParse { .. } => ErrorKind::Parse,
            DashError::Merge { .. } | DashError::DecodeTask { .. } => ErrorKind::Merge,
            DashError::UploadInProgress { .. } => ErrorKind::Conflict,
            DashError::StorageIo { .. }
            | DashError::StorageJson { .. }
            | DashError::Export { .. }
            | DashError::ExportCsv { .. }
            | DashError::ExportIo { .. } => ErrorKind::Storage,
            DashError::OpeningJson { .. }
            | DashError::ParsingJson { .. }
            | DashError::InvalidDate { .. } => ErrorKind::Config,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> DashResult<()> {
    let js = serde_json::to_string_pretty(value).context(StorageJsonSnafu { key: "stdout" })?;
    println!("{}", js);
    Ok(())
}

fn reference_date(today: &Option<String>) -> DashResult<NaiveDate> {
    match today {
        Some(s) => {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").context(InvalidDateSnafu { value: s.clone() })
        }
        None => Ok(Local::now().date_naive()),
    }
}

fn find_track<'a>(config: &'a DashboardConfig, name: &str) -> DashResult<&'a TrackConfig> {
    match config.track(name) {
        Some(t) => Ok(t),
        None => MissingArgumentSnafu {
            message: format!(
                "Unknown track {:?}, known tracks: {:?}",
                name,
                config.track_names()
            ),
        }
        .fail(),
    }
}

fn read_upload(path: &str) -> DashResult<UploadFile> {
    let bytes = fs::read(path).context(ReadingFileSnafu { path })?;
    Ok(UploadFile {
        name: io_common::simplify_file_name(path),
        bytes,
    })
}

/// Runs one command line invocation against the directory store.
pub async fn run_command(args: Args) -> DashResult<()> {
    let mut config = match &args.config {
        Some(p) => read_config(p)?,
        None => DashboardConfig::default(),
    };
    if let Some(dir) = &args.store {
        config.store_dir = dir.clone();
    }
    debug!("run_command: config: {:?}", config);
    let options = config.aggregate_options(reference_date(&args.today)?);
    let store = DirStore::new(Path::new(&config.store_dir));
    let mut repo = DashboardRepository::new(store, config.exclusion_scope);

    match args.command {
        Command::Upload {
            track,
            batch,
            files,
        } => {
            let scope = Scope::new(&track, &batch);
            check_file_names(&files)?;
            let uploads = files
                .iter()
                .map(|p| read_upload(p))
                .collect::<DashResult<Vec<UploadFile>>>()?;
            let session = UploadSession::new(repo, config.fields.clone(), config.labels.clone());
            let outcome = session.upload(&scope, uploads).await?;
            info!(
                "Stored {} records for {}",
                outcome.records, outcome.storage_key
            );
            let res = session.with_repo(|repo| views::batch_view(repo, &scope, &options, false))?;
            print_json(&res.result.summary)
        }
        Command::RemoveFile { track, batch, uid } => {
            let scope = Scope::new(&track, &batch);
            let _lock = repo.lock_scope(&scope)?;
            if repo.remove_file(&scope, &uid)? {
                warn!("All the files of {} were removed, its data was reset", scope);
            }
            print_json(&repo.load_file_list(Some(&scope))?)
        }
        Command::Exclude { track, batch, id } => {
            let scope = Scope::new(&track, &batch);
            let excluded = repo.toggle_exclusion(&scope, &id)?;
            info!("Response {} excluded: {}", id, excluded);
            let res = views::batch_view(&repo, &scope, &options, false)?;
            print_json(&res.result.summary)
        }
        Command::Batch {
            track,
            batch,
            with_rows,
        } => {
            let scope = Scope::new(&track, &batch);
            print_json(&views::batch_view(&repo, &scope, &options, with_rows)?)
        }
        Command::Track { track } => {
            let track_config = find_track(&config, &track)?;
            print_json(&views::track_view(&repo, track_config, &options)?)
        }
        Command::Overview => print_json(&views::overview(&repo, &config.tracks, &options)?),
        Command::Export { track, batch, out } => {
            let scope = Scope::new(&track, &batch);
            let rows = repo.load_dataset(&scope)?;
            io_export::export_to_path(&rows, &out)?;
            info!("Exported {} records of {} to {}", rows.len(), scope, out);
            Ok(())
        }
    }
}
