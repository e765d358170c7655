use crate::dash::store::ExclusionScope;
use crate::dash::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TrackConfig {
    pub name: String,
    pub batches: Vec<String>,
}

/// The content of the JSON configuration file. Every key is optional.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardConfig {
    /// Directory of the persisted datasets and exclusions.
    pub store_dir: String,
    pub tracks: Vec<TrackConfig>,
    pub fields: FieldNames,
    pub labels: StatusLabels,
    pub categories: Vec<CategoryChart>,
    pub underage_policy: UnderagePolicy,
    pub exclusion_scope: ExclusionScope,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            store_dir: "dashboard-data".to_string(),
            tracks: vec![TrackConfig {
                name: "자율주행".to_string(),
                batches: vec!["1".to_string(), "2".to_string(), "3".to_string()],
            }],
            fields: FieldNames::default(),
            labels: StatusLabels::default(),
            categories: CategoryChart::default_charts(),
            underage_policy: UnderagePolicy::default(),
            exclusion_scope: ExclusionScope::default(),
        }
    }
}

impl DashboardConfig {
    pub fn aggregate_options(&self, reference_date: NaiveDate) -> AggregateOptions {
        AggregateOptions {
            reference_date,
            fields: self.fields.clone(),
            labels: self.labels.clone(),
            categories: self.categories.clone(),
            underage_policy: self.underage_policy,
        }
    }

    pub fn track(&self, name: &str) -> Option<&TrackConfig> {
        self.tracks.iter().find(|t| t.name == name)
    }

    pub fn track_names(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.name.clone()).collect()
    }
}

pub fn read_config(path: &str) -> DashResult<DashboardConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: DashboardConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    info!(
        "read_config: {} tracks, store directory {:?}",
        config.tracks.len(),
        config.store_dir
    );
    Ok(config)
}
