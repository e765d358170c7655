/*!
Merging and aggregation of applicant survey exports.

The survey tool produces two exports for a cohort:
- a primary export with one row per applicant,
- a secondary export in long format, with one row per (applicant, question).

[`merge::merge`] pivots the secondary export and left-joins it onto the
primary one. [`aggregate::recompute`] turns the merged records into summary
statistics and chart data, ignoring the response ids of an [`ExclusionSet`]
for the summary.

[`AggregateMemo`] is for long-lived callers that aggregate the same dataset
again and again, such as a page refreshed after every exclusion toggle. The
`surveydash` command line aggregates once per invocation and calls
[`recompute`] directly.

```
use chrono::NaiveDate;
use survey_merge::*;

let primary: Vec<SourceRow> = vec![[
    ("responseId", "1"),
    ("모집 상태", " 작성완료 "),
    ("제출시간", "2024-03-01T09:15:00"),
]
.iter()
.map(|(k, v)| (k.to_string(), v.to_string()))
.collect()];

let rows = merge(&primary, &[], &FieldNames::default(), &StatusLabels::default());
let options = AggregateOptions::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
let res = recompute(&rows, &ExclusionSet::new(), &options);
assert_eq!(res.summary.rate, 100.0);
assert_eq!(res.submission_time.values[9], 1);
```
*/
mod config;

pub mod aggregate;
pub mod exclusion;
pub mod manual;
pub mod memo;
pub mod merge;

pub use crate::aggregate::recompute;
pub use crate::config::*;
pub use crate::exclusion::ExclusionSet;
pub use crate::memo::AggregateMemo;
pub use crate::merge::merge;
