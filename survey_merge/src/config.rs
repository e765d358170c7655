// ********* Input data structures ***********

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// A row as produced by the spreadsheet readers: header name -> cell text.
///
/// Empty cells are not present in the map. The order of the keys is the
/// order of the columns in the source file.
pub type SourceRow = IndexMap<String, String>;

/// One row of the secondary (long format) export.
///
/// Many of these rows share the same response id, one per question title.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PivotSourceRecord {
    pub response_id: Option<String>,
    pub title: Option<String>,
    pub value: Option<String>,
}

impl PivotSourceRecord {
    pub fn from_row(row: &SourceRow, fields: &FieldNames) -> PivotSourceRecord {
        PivotSourceRecord {
            response_id: non_blank(row.get(&fields.response_id)),
            title: non_blank(row.get(&fields.pivot_title)),
            value: row.get(&fields.pivot_value).cloned(),
        }
    }
}

fn non_blank(s: Option<&String>) -> Option<String> {
    match s {
        Some(x) if !x.trim().is_empty() => Some(x.clone()),
        _ => None,
    }
}

/// A single applicant after the merge.
///
/// The response id and the normalized status are always present. All the
/// other columns of the primary export and the pivoted answers of the
/// secondary export are kept, in insertion order, in `fields`.
///
/// The serialized form is a flat JSON object: the extra fields first, then
/// `responseId` and `status`.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RowRecord {
    #[serde(flatten)]
    pub fields: IndexMap<String, Option<String>>,
    #[serde(rename = "responseId")]
    pub response_id: String,
    pub status: String,
}

pub const RESPONSE_ID_KEY: &str = "responseId";
pub const STATUS_KEY: &str = "status";

impl RowRecord {
    /// Looks up any field, including the two promoted ones.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            RESPONSE_ID_KEY => Some(self.response_id.as_str()),
            STATUS_KEY => Some(self.status.as_str()),
            _ => self.fields.get(key).and_then(|v| v.as_deref()),
        }
    }

    /// Column names in serialization order.
    pub fn keys(&self) -> Vec<String> {
        let mut res: Vec<String> = self.fields.keys().cloned().collect();
        res.push(RESPONSE_ID_KEY.to_string());
        res.push(STATUS_KEY.to_string());
        res
    }
}

/// The names of the columns that the merge and the aggregation rely on.
///
/// Every other column is carried through untouched.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldNames {
    /// Join key, in both exports.
    pub response_id: String,
    /// Raw recruitment status in the primary export.
    pub status: String,
    pub submitted_at: String,
    pub birth_date: String,
    /// Column of the secondary export holding the name of the projected field.
    pub pivot_title: String,
    /// Column of the secondary export holding the (possibly JSON encoded) answer.
    pub pivot_value: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        FieldNames {
            response_id: RESPONSE_ID_KEY.to_string(),
            status: "모집 상태".to_string(),
            submitted_at: "제출시간".to_string(),
            birth_date: "생년월일".to_string(),
            pivot_title: "title".to_string(),
            pivot_value: "value".to_string(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusLabels {
    pub complete: String,
    /// Used when the source status is blank.
    pub in_progress: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        StatusLabels {
            complete: "작성완료".to_string(),
            in_progress: "작성중".to_string(),
        }
    }
}

/// A distribution over a fixed list of labels, matched by substring.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CategoryChart {
    pub name: String,
    pub field: String,
    pub labels: Vec<String>,
}

impl CategoryChart {
    pub fn new(name: &str, field: &str, labels: &[&str]) -> CategoryChart {
        CategoryChart {
            name: name.to_string(),
            field: field.to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn default_charts() -> Vec<CategoryChart> {
        vec![
            CategoryChart::new(
                "currentStatus",
                "현재 신분",
                &["졸업 예정", "졸업", "퇴사자", "취준생", "재학생", "기타"],
            ),
            CategoryChart::new(
                "education",
                "최종학력",
                &["4년제", "3년제", "2년제", "대학원", "고등학교", "기타"],
            ),
            CategoryChart::new(
                "referralPath",
                "엘리스 트랙을 어떻게 알게 되셨나요? (*복수 선택 가능)",
                &["홈페이지", "구글", "지인", "블로그", "인스타그램", "광고", "기타"],
            ),
        ]
    }
}

// ********* Configuration **********

/// What to do with applicants younger than the first age bucket.
///
/// - FoldIntoOldest counts them in the `36+` bucket. This is how the
/// dashboards have always behaved, even if it is most likely an accident.
///
/// - SeparateBucket adds a leading `~18` bucket.
///
/// - Skip leaves them out of the distribution.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum UnderagePolicy {
    #[default]
    FoldIntoOldest,
    SeparateBucket,
    Skip,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AggregateOptions {
    /// "Today", for the age computation.
    pub reference_date: NaiveDate,
    pub fields: FieldNames,
    pub labels: StatusLabels,
    pub categories: Vec<CategoryChart>,
    pub underage_policy: UnderagePolicy,
}

impl AggregateOptions {
    pub fn new(reference_date: NaiveDate) -> AggregateOptions {
        AggregateOptions {
            reference_date,
            fields: FieldNames::default(),
            labels: StatusLabels::default(),
            categories: CategoryChart::default_charts(),
            underage_policy: UnderagePolicy::default(),
        }
    }
}

// ******** Output data structures *********

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total: u64,
    pub completed: u64,
    /// Percentage with one decimal. Zero when there is no applicant.
    pub rate: f64,
}

/// Chart-ready data: `labels[i]` is the name of the bucket counted in `values[i]`.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

impl ChartData {
    pub fn get(&self, label: &str) -> Option<u64> {
        self.labels
            .iter()
            .position(|l| l == label)
            .and_then(|idx| self.values.get(idx).cloned())
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub summary: Summary,
    pub submission_time: ChartData,
    pub age_group: ChartData,
    /// One entry per configured category chart, in configuration order.
    pub categories: IndexMap<String, ChartData>,
    pub daily_trend: ChartData,
}

// ******** Errors *********

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum SurveyError {
    #[snafu(display("a response id must not be empty (got {id:?})"))]
    InvalidResponseId { id: String },
}

pub type SurveyResult<T> = Result<T, SurveyError>;
