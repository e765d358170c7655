use log::{debug, info};

use indexmap::IndexMap;
use serde_json::Value as JSValue;
use std::collections::HashMap;

use crate::config::*;

/// The secondary export turned into wide format: response id -> (title -> answer).
pub type Pivoted = HashMap<String, IndexMap<String, String>>;

/// Renders an answer of the secondary export as readable text.
///
/// The survey tool stores multiple choice answers as JSON. Arrays are joined
/// with `", "`, objects have their values joined with `" / "`. Anything that
/// is not valid JSON is returned as is.
pub fn flatten_value(raw: Option<&str>) -> String {
    let s = match raw {
        Some(s) if !s.is_empty() => s,
        _ => return "".to_string(),
    };
    match serde_json::from_str::<JSValue>(s) {
        Ok(JSValue::Array(elts)) => elts.iter().map(element_text).collect::<Vec<_>>().join(", "),
        Ok(JSValue::Object(m)) => m.values().map(element_text).collect::<Vec<_>>().join(" / "),
        Ok(JSValue::String(x)) => x,
        Ok(JSValue::Null) => s.to_string(),
        Ok(x) => x.to_string(),
        Err(_) => s.to_string(),
    }
}

fn element_text(v: &JSValue) -> String {
    match v {
        JSValue::String(s) => s.clone(),
        JSValue::Null => "".to_string(),
        x => x.to_string(),
    }
}

pub fn normalize_status(raw: Option<&str>, labels: &StatusLabels) -> String {
    match raw.map(|s| s.trim()) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => labels.in_progress.clone(),
    }
}

/// Groups the secondary export by response id.
///
/// Rows without a response id or without a title are dropped. If the same
/// title appears twice for one id, the last row wins.
pub fn pivot(secondary: &[SourceRow], fields: &FieldNames) -> Pivoted {
    let mut res: Pivoted = HashMap::new();
    let mut dropped = 0;
    for row in secondary.iter() {
        let psr = PivotSourceRecord::from_row(row, fields);
        let (id, title) = match (psr.response_id, psr.title) {
            (Some(id), Some(title)) => (id, title),
            (None, _) => {
                dropped += 1;
                continue;
            }
            (Some(id), None) => {
                res.entry(id).or_default();
                continue;
            }
        };
        let value = flatten_value(psr.value.as_deref());
        res.entry(id).or_default().insert(title, value);
    }
    debug!(
        "pivot: {} secondary rows -> {} response ids ({} rows without id)",
        secondary.len(),
        res.len(),
        dropped
    );
    res
}

/// Left join of the pivoted secondary export onto the primary export.
///
/// Exactly one record is produced per primary row, in the same order. A
/// primary row without a response id gets `row-<index>` instead. Pivoted
/// answers and the derived fields override primary columns with the same name.
pub fn merge(
    primary: &[SourceRow],
    secondary: &[SourceRow],
    fields: &FieldNames,
    labels: &StatusLabels,
) -> Vec<RowRecord> {
    let pivoted = pivot(secondary, fields);
    let empty: IndexMap<String, String> = IndexMap::new();
    let mut res: Vec<RowRecord> = Vec::with_capacity(primary.len());
    let mut matched = 0;
    for (idx, row) in primary.iter().enumerate() {
        let source_id = row
            .get(&fields.response_id)
            .filter(|s| !s.trim().is_empty());
        let answers = match source_id.and_then(|id| pivoted.get(id)) {
            Some(a) => {
                matched += 1;
                a
            }
            None => &empty,
        };
        let response_id = match source_id {
            Some(id) => id.clone(),
            None => format!("row-{}", idx),
        };

        let mut merged: IndexMap<String, Option<String>> = row
            .iter()
            .map(|(k, v)| (k.clone(), Some(v.clone())))
            .collect();
        for (title, value) in answers.iter() {
            merged.insert(title.clone(), Some(value.clone()));
        }
        // The promoted fields live outside of the map.
        merged.shift_remove(RESPONSE_ID_KEY);
        merged.shift_remove(STATUS_KEY);

        let status = normalize_status(row.get(&fields.status).map(|s| s.as_str()), labels);
        res.push(RowRecord {
            fields: merged,
            response_id,
            status,
        });
    }
    info!(
        "merge: {} primary rows, {} matched in the secondary export",
        res.len(),
        matched
    );
    res
}
