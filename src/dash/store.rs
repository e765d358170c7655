// Persisted state of the dashboards.

use std::collections::HashMap;
use std::fmt::Display;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dash::*;

/// A string key-value store, the equivalent of the browser local storage.
pub trait KvStore {
    fn get(&self, key: &str) -> DashResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> DashResult<()>;
    fn remove(&mut self, key: &str) -> DashResult<()>;
    /// Takes the exclusive lock named after `key`. Returns None when it is
    /// already held.
    fn try_lock(&self, key: &str) -> DashResult<Option<StoreLock>>;
}

/// An exclusive lock on a key of a store, released when dropped.
#[derive(Debug)]
pub struct StoreLock {
    path: Option<PathBuf>,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Some(p) = self.path.take() {
            if let Err(e) = fs::remove_file(&p) {
                warn!("Could not release the lock {:?}: {}", p, e);
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> DashResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> DashResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> DashResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    // A memory store is never shared outside of its owner.
    fn try_lock(&self, _key: &str) -> DashResult<Option<StoreLock>> {
        Ok(Some(StoreLock { path: None }))
    }
}

/// Stores every key as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: &Path) -> DirStore {
        DirStore {
            root: root.to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c => c,
            })
            .collect();
        self.root.join(format!("{}.json", file_name))
    }
}

impl KvStore for DirStore {
    fn get(&self, key: &str) -> DashResult<Option<String>> {
        let p = self.path_for(key);
        if !p.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&p).context(StorageIoSnafu { key })?;
        Ok(Some(contents))
    }

    fn set(&mut self, key: &str, value: &str) -> DashResult<()> {
        fs::create_dir_all(&self.root).context(StorageIoSnafu { key })?;
        let p = self.path_for(key);
        // Write then rename, so that a reader never sees half a file.
        let tmp = p.with_extension("json.tmp");
        fs::write(&tmp, value).context(StorageIoSnafu { key })?;
        fs::rename(&tmp, &p).context(StorageIoSnafu { key })?;
        debug!("DirStore::set: {:?} ({} bytes)", p, value.len());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> DashResult<()> {
        let p = self.path_for(key);
        if p.exists() {
            fs::remove_file(&p).context(StorageIoSnafu { key })?;
        }
        Ok(())
    }

    /// The lock is the file `<root>/<key>.lock`, shared by every process
    /// using the same directory.
    fn try_lock(&self, key: &str) -> DashResult<Option<StoreLock>> {
        fs::create_dir_all(&self.root).context(StorageIoSnafu { key })?;
        let p = self.path_for(key).with_extension("lock");
        match fs::OpenOptions::new().write(true).create_new(true).open(&p) {
            Ok(mut f) => {
                // The pid only helps finding who left a stale lock behind.
                if let Err(e) = writeln!(f, "{}", std::process::id()) {
                    debug!("DirStore::try_lock: {:?}: {}", p, e);
                }
                Ok(Some(StoreLock { path: Some(p) }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(
                    "{:?} exists: {} is being written by another process. Remove the file if that is not the case.",
                    p, key
                );
                Ok(None)
            }
            Err(e) => Err(e).context(StorageIoSnafu { key }),
        }
    }
}

/// A (track, batch) pair. Each scope has its own merged dataset.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Scope {
    pub track: String,
    pub batch: String,
}

impl Scope {
    pub fn new(track: &str, batch: &str) -> Scope {
        Scope {
            track: track.to_string(),
            batch: batch.to_string(),
        }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} batch {}", self.track, self.batch)
    }
}

/// Whether the excluded response ids are shared by all the batches.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ExclusionScope {
    #[default]
    Global,
    PerBatch,
}

/// An uploaded file, as listed on the batch page.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub uid: String,
    pub size: u64,
    pub track: String,
    pub batch: String,
}

impl FileMeta {
    pub fn belongs_to(&self, scope: &Scope) -> bool {
        self.track == scope.track && self.batch == scope.batch
    }
}

pub const EXCLUDED_IDS_KEY: &str = "excludedSurveyIds";
pub const FILE_LIST_KEY: &str = "fileList";

pub fn merged_data_key(scope: &Scope) -> String {
    format!("mergedData_{}_{}", scope.track, scope.batch)
}

/// Typed access to the persisted state, over any key-value store.
pub struct DashboardRepository<S: KvStore> {
    store: S,
    exclusion_scope: ExclusionScope,
}

impl<S: KvStore> DashboardRepository<S> {
    pub fn new(store: S, exclusion_scope: ExclusionScope) -> DashboardRepository<S> {
        DashboardRepository {
            store,
            exclusion_scope,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Locks the dataset of a scope against other writers, including other
    /// processes sharing the same store.
    pub fn lock_scope(&self, scope: &Scope) -> DashResult<StoreLock> {
        match self.store.try_lock(&merged_data_key(scope))? {
            Some(lock) => Ok(lock),
            None => UploadInProgressSnafu {
                track: scope.track.clone(),
                batch: scope.batch.clone(),
            }
            .fail(),
        }
    }

    pub fn exclusions_key(&self, scope: &Scope) -> String {
        match self.exclusion_scope {
            ExclusionScope::Global => EXCLUDED_IDS_KEY.to_string(),
            ExclusionScope::PerBatch => {
                format!("{}_{}_{}", EXCLUDED_IDS_KEY, scope.track, scope.batch)
            }
        }
    }

    // Corrupt values are reported and read as the default value.
    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> DashResult<T> {
        match self.store.get(key)? {
            None => Ok(T::default()),
            Some(s) => match serde_json::from_str::<T>(&s) {
                Ok(v) => Ok(v),
                Err(e) => {
                    warn!(
                        "Stored value {} could not be decoded, using an empty value instead: {}",
                        key, e
                    );
                    Ok(T::default())
                }
            },
        }
    }

    fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> DashResult<()> {
        let js = serde_json::to_string(value).context(StorageJsonSnafu { key })?;
        self.store.set(key, &js)
    }

    pub fn load_dataset(&self, scope: &Scope) -> DashResult<Vec<RowRecord>> {
        self.load_or_default(&merged_data_key(scope))
    }

    /// Replaces the whole dataset of the scope.
    pub fn save_dataset(&mut self, scope: &Scope, rows: &[RowRecord]) -> DashResult<()> {
        let key = merged_data_key(scope);
        info!("save_dataset: {} records to {}", rows.len(), key);
        self.save(&key, rows)
    }

    pub fn clear_dataset(&mut self, scope: &Scope) -> DashResult<()> {
        self.save_dataset(scope, &[])
    }

    pub fn load_exclusions(&self, scope: &Scope) -> DashResult<ExclusionSet> {
        self.load_or_default(&self.exclusions_key(scope))
    }

    pub fn save_exclusions(&mut self, scope: &Scope, exclusions: &ExclusionSet) -> DashResult<()> {
        let key = self.exclusions_key(scope);
        self.save(&key, exclusions)
    }

    /// Returns whether the id is now excluded.
    pub fn toggle_exclusion(&mut self, scope: &Scope, id: &str) -> DashResult<bool> {
        let mut exclusions = self.load_exclusions(scope)?;
        let excluded = exclusions.toggle(id).context(InvalidExclusionSnafu {})?;
        self.save_exclusions(scope, &exclusions)?;
        Ok(excluded)
    }

    /// The files of one scope, or of all of them.
    pub fn load_file_list(&self, scope: Option<&Scope>) -> DashResult<Vec<FileMeta>> {
        let all: Vec<FileMeta> = self.load_or_default(FILE_LIST_KEY)?;
        Ok(match scope {
            Some(s) => all.into_iter().filter(|f| f.belongs_to(s)).collect(),
            None => all,
        })
    }

    /// Replaces the files listed for a scope. Other scopes are untouched.
    pub fn replace_file_list(&mut self, scope: &Scope, files: &[FileMeta]) -> DashResult<()> {
        let mut all: Vec<FileMeta> = self
            .load_file_list(None)?
            .into_iter()
            .filter(|f| !f.belongs_to(scope))
            .collect();
        all.extend(files.iter().cloned());
        self.save(FILE_LIST_KEY, &all)
    }

    /// Removes one file from the list of the scope.
    ///
    /// When the last file of a scope is removed, its dataset is reset to empty.
    /// The exclusions are kept. Returns whether the dataset was reset.
    pub fn remove_file(&mut self, scope: &Scope, uid: &str) -> DashResult<bool> {
        let remaining: Vec<FileMeta> = self
            .load_file_list(Some(scope))?
            .into_iter()
            .filter(|f| f.uid != uid)
            .collect();
        self.replace_file_list(scope, &remaining)?;
        if remaining.is_empty() {
            self.clear_dataset(scope)?;
            return Ok(true);
        }
        Ok(false)
    }
}
