/*!

This is the long-form manual for `survey_merge` and `surveydash`.

## Input files

An upload is always a pair of files, in this order:
1. the survey export, one row per applicant,
2. the status export, one row per applicant and per question.

Both may be Excel (`.xlsx`) or CSV (`.csv`) files. Only the first worksheet
of an Excel file is read. The first row holds the column names.

### Survey export

The columns used by the dashboards are (names can be changed in the
configuration file, see below):
* `responseId` the id of the response. When it is missing, the record gets
  the id `row-<n>` where `<n>` is the position of the row, starting at 0.
* `모집 상태` the recruitment status. Blank statuses become `작성중`.
* `제출시간` the submission time.
* `생년월일` the birth date, starting with the year.

All the other columns are kept as they are.

### Status export

Three columns are read: `responseId`, `title` and `value`. Each row adds the
column `title` with the content `value` to the applicant `responseId`.
Values encoded in JSON are made readable:
* `["A","B"]` becomes `A, B`
* `{"k1":"v1","k2":"v2"}` becomes `v1 / v2`

Rows without a response id are ignored.

## Configuration

`surveydash --config dashboard.json` reads a JSON file. All the keys are
optional:

```json
{
  "storeDir": "dashboard-data",
  "tracks": [{ "name": "자율주행", "batches": ["1", "2", "3"] }],
  "fields": {
    "responseId": "surveyResponseId",
    "pivotValue": "MAX(questionResponse)"
  },
  "labels": { "complete": "작성완료", "inProgress": "작성중" },
  "underagePolicy": "foldIntoOldest",
  "exclusionScope": "global"
}
```

`underagePolicy` controls the applicants younger than 19:
* `foldIntoOldest` counts them in `36+` (historical behaviour)
* `separateBucket` adds a `~18` bucket
* `skip` leaves them out

`exclusionScope` is either `global` (one exclusion list for all the
cohorts) or `perBatch`.

## Statistics

* summary: number of applicants, number with the complete status, and the
  completion rate with one decimal. Excluded response ids are not counted.
* charts (all records, including the excluded ones): submissions per hour,
  age groups, the category charts, submissions per day.

*/
