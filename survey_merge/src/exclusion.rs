use log::debug;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::config::*;

/// Response ids that staff marked as not counting in the summary statistics.
///
/// The records themselves stay in the dataset. Ids are kept in the order they
/// were added, and an id that matches no record is harmless.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSet {
    ids: IndexSet<String>,
}

impl ExclusionSet {
    pub fn new() -> ExclusionSet {
        ExclusionSet::default()
    }

    /// Adds the id if it is absent, removes it otherwise.
    ///
    /// Returns whether the id is excluded after the call.
    pub fn toggle(&mut self, id: &str) -> SurveyResult<bool> {
        if id.trim().is_empty() {
            return InvalidResponseIdSnafu { id }.fail();
        }
        let excluded = if self.ids.shift_remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        };
        debug!("toggle: {:?} excluded: {}", id, excluded);
        Ok(excluded)
    }

    pub fn is_excluded(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }
}

impl FromIterator<String> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        ExclusionSet {
            ids: iter.into_iter().collect(),
        }
    }
}
