use clap::{Parser, Subcommand};

/// Completion dashboards for the applicant surveys of each track and batch.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON configuration of the dashboards: tracks, batches, column names and labels.
    /// See the manual of the survey_merge crate for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory, optional) Where the datasets and the exclusions are stored. Overrides the directory
    /// of the configuration.
    #[clap(short, long, value_parser)]
    pub store: Option<String>,

    /// (YYYY-MM-DD, default today) The reference date for the age groups.
    #[clap(long, value_parser)]
    pub today: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Merges the survey export and the status export of a batch, in this order, and replaces its data.
    Upload {
        #[clap(long, value_parser)]
        track: String,
        #[clap(long, value_parser)]
        batch: String,
        /// Exactly two .xlsx or .csv files.
        #[clap(value_parser)]
        files: Vec<String>,
    },
    /// Removes an uploaded file from the list of a batch.
    RemoveFile {
        #[clap(long, value_parser)]
        track: String,
        #[clap(long, value_parser)]
        batch: String,
        #[clap(value_parser)]
        uid: String,
    },
    /// Excludes a response from the statistics, or includes it again.
    Exclude {
        #[clap(long, value_parser)]
        track: String,
        #[clap(long, value_parser)]
        batch: String,
        #[clap(value_parser)]
        id: String,
    },
    /// Prints the dashboard of a batch.
    Batch {
        #[clap(long, value_parser)]
        track: String,
        #[clap(long, value_parser)]
        batch: String,
        /// Also prints the table of the records.
        #[clap(long, takes_value = false)]
        with_rows: bool,
    },
    /// Prints the dashboard of a track, all its batches together.
    Track {
        #[clap(long, value_parser)]
        track: String,
    },
    /// Prints the completion of every track.
    Overview,
    /// Writes the merged data of a batch to an .xlsx (default) or .csv file.
    Export {
        #[clap(long, value_parser)]
        track: String,
        #[clap(long, value_parser)]
        batch: String,
        #[clap(short, long, value_parser)]
        out: String,
    },
}
