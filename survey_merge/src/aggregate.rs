use log::debug;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use std::collections::BTreeMap;

use crate::config::*;
use crate::exclusion::ExclusionSet;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

pub const AGE_BUCKETS: [&str; 4] = ["19-24", "25-29", "30-35", "36+"];
pub const UNDERAGE_BUCKET: &str = "~18";
const MINIMUM_AGE: i32 = 19;

/// Parses a submission time, as written by the survey tool or by a spreadsheet.
///
/// Timestamps with an offset are read as the wall clock of that offset.
/// Returns None for anything that cannot be understood.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// The year of a birth date that starts with 4 digits (`1995-03-02`, `19950302`, ...).
pub fn birth_year(s: &str) -> Option<i32> {
    let s = s.trim();
    let head = s.get(0..4)?;
    if head.chars().all(|c| c.is_ascii_digit()) {
        head.parse::<i32>().ok()
    } else {
        None
    }
}

/// The rows that take part in the summary statistics.
pub fn displayed<'a>(rows: &'a [RowRecord], exclusions: &ExclusionSet) -> Vec<&'a RowRecord> {
    rows.iter()
        .filter(|r| !exclusions.is_excluded(&r.response_id))
        .collect()
}

pub fn completion_rate(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = (completed as f64) / (total as f64) * 100.0;
    (pct * 10.0).round() / 10.0
}

pub fn summarize(rows: &[RowRecord], exclusions: &ExclusionSet, labels: &StatusLabels) -> Summary {
    let shown = displayed(rows, exclusions);
    let total = shown.len() as u64;
    let completed = shown.iter().filter(|r| r.status == labels.complete).count() as u64;
    Summary {
        total,
        completed,
        rate: completion_rate(completed, total),
    }
}

/// Submissions per hour of the day, always 24 buckets.
pub fn submission_time_distribution(rows: &[RowRecord], fields: &FieldNames) -> ChartData {
    let mut counts = [0u64; 24];
    let mut skipped = 0;
    for r in rows.iter() {
        match r.get(&fields.submitted_at).and_then(parse_timestamp) {
            Some(ts) => counts[ts.hour() as usize] += 1,
            None => skipped += 1,
        }
    }
    debug!(
        "submission_time_distribution: {} rows skipped (no usable timestamp)",
        skipped
    );
    ChartData {
        labels: (0..24).map(|h| format!("{}시", h)).collect(),
        values: counts.to_vec(),
    }
}

pub fn age_group_distribution(
    rows: &[RowRecord],
    fields: &FieldNames,
    reference_date: NaiveDate,
    policy: UnderagePolicy,
) -> ChartData {
    let mut labels: Vec<String> = Vec::new();
    if policy == UnderagePolicy::SeparateBucket {
        labels.push(UNDERAGE_BUCKET.to_string());
    }
    labels.extend(AGE_BUCKETS.iter().map(|s| s.to_string()));
    let mut counts: IndexMap<String, u64> = labels.iter().map(|l| (l.clone(), 0)).collect();

    let current_year = reference_date.year();
    for r in rows.iter() {
        let year = match r.get(&fields.birth_date).and_then(birth_year) {
            Some(y) => y,
            None => continue,
        };
        let age = current_year - year;
        let bucket = match age {
            a if a < MINIMUM_AGE => match policy {
                UnderagePolicy::FoldIntoOldest => AGE_BUCKETS[3],
                UnderagePolicy::SeparateBucket => UNDERAGE_BUCKET,
                UnderagePolicy::Skip => continue,
            },
            a if a <= 24 => AGE_BUCKETS[0],
            a if a <= 29 => AGE_BUCKETS[1],
            a if a <= 35 => AGE_BUCKETS[2],
            _ => AGE_BUCKETS[3],
        };
        if let Some(c) = counts.get_mut(bucket) {
            *c += 1;
        }
    }
    ChartData {
        labels,
        values: counts.values().cloned().collect(),
    }
}

/// Counts, for each label, the rows whose value contains it (ignoring case).
///
/// The buckets overlap: "구글, 블로그" counts for both "구글" and "블로그", and
/// "졸업 예정" also counts for "졸업".
pub fn category_distribution(rows: &[RowRecord], chart: &CategoryChart) -> ChartData {
    let needles: Vec<String> = chart.labels.iter().map(|l| l.to_lowercase()).collect();
    let mut counts = vec![0u64; needles.len()];
    for r in rows.iter() {
        let value = match r.get(&chart.field) {
            Some(v) => v.to_lowercase(),
            None => continue,
        };
        for (idx, needle) in needles.iter().enumerate() {
            if value.contains(needle.as_str()) {
                counts[idx] += 1;
            }
        }
    }
    ChartData {
        labels: chart.labels.clone(),
        values: counts,
    }
}

/// Submissions per calendar day, sorted by date.
pub fn daily_trend(rows: &[RowRecord], fields: &FieldNames) -> ChartData {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for r in rows.iter() {
        if let Some(ts) = r.get(&fields.submitted_at).and_then(parse_timestamp) {
            *counts.entry(ts.date()).or_insert(0) += 1;
        }
    }
    ChartData {
        labels: counts.keys().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
        values: counts.values().cloned().collect(),
    }
}

/// Computes everything a dashboard view displays.
///
/// The summary only counts the rows that are not excluded. The charts are
/// computed over all the rows of the dataset.
pub fn recompute(
    rows: &[RowRecord],
    exclusions: &ExclusionSet,
    options: &AggregateOptions,
) -> AggregateResult {
    debug!(
        "recompute: {} rows, {} excluded ids, reference date {}",
        rows.len(),
        exclusions.len(),
        options.reference_date
    );
    let categories: IndexMap<String, ChartData> = options
        .categories
        .iter()
        .map(|c| (c.name.clone(), category_distribution(rows, c)))
        .collect();
    AggregateResult {
        summary: summarize(rows, exclusions, &options.labels),
        submission_time: submission_time_distribution(rows, &options.fields),
        age_group: age_group_distribution(
            rows,
            &options.fields,
            options.reference_date,
            options.underage_policy,
        ),
        categories,
        daily_trend: daily_trend(rows, &options.fields),
    }
}
