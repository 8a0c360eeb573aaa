//! # Query Module
//!
//! The native query and aggregation vocabulary understood by the reference
//! drivers, plus the record matching they share.
//!
//! Filters are example records: a record matches when every `(path, value)`
//! of the example is found at the same dotted path. A null example value
//! matches an absent field.

use crate::primitives::offsets;
use crate::{Record, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// =============================================================================
// MATCHING
// =============================================================================

/// Read the value at a dotted `path`.
#[must_use]
pub fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Check whether `record` matches the `example` filter.
#[must_use]
pub fn matches(record: &Record, example: &Record) -> bool {
    example.iter().all(|(path, expected)| match lookup(record, path) {
        Some(actual) => actual == expected,
        None => expected.is_null(),
    })
}

/// Total order over JSON values used for sorting.
///
/// Null < booleans < numbers < strings < arrays < objects.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Distinct values found at `path`, in first-seen order.
#[must_use]
pub fn distinct(records: &[Record], path: &str) -> Vec<Value> {
    let mut seen: Vec<Value> = Vec::new();
    for value in records.iter().filter_map(|record| lookup(record, path)) {
        if !seen.contains(value) {
            seen.push(value.clone());
        }
    }
    seen
}

// =============================================================================
// SORTING AND PROJECTION
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// A sort criterion on a dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: Order,
}

impl Sort {
    #[must_use]
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Ascending,
        }
    }

    #[must_use]
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: Order::Descending,
        }
    }
}

fn sort_records(records: &mut [Record], criteria: &[Sort]) {
    records.sort_by(|a, b| {
        for criterion in criteria {
            let left = lookup(a, &criterion.field).unwrap_or(&Value::Null);
            let right = lookup(b, &criterion.field).unwrap_or(&Value::Null);
            let ordering = match criterion.order {
                Order::Ascending => compare_values(left, right),
                Order::Descending => compare_values(right, left),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Keep only `fields` (top-level) and the record key.
fn project(record: Record, fields: &[String]) -> Record {
    record
        .into_iter()
        .filter(|(name, _)| name == offsets::KEY || fields.iter().any(|f| f == name))
        .collect()
}

// =============================================================================
// NATIVE QUERY
// =============================================================================

/// The native query understood by the reference drivers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filter: Record,
    pub sort: Vec<Sort>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub projection: Option<Vec<String>>,
}

impl Query {
    /// Create a query matching every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a query with the given example filter.
    #[must_use]
    pub fn with_filter(filter: Record) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sort_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    #[must_use]
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn project<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Apply sort, skip, limit and projection to records that already passed
    /// the filter.
    #[must_use]
    pub fn apply(&self, mut records: Vec<Record>) -> Vec<Record> {
        if !self.sort.is_empty() {
            sort_records(&mut records, &self.sort);
        }
        let limit = self.limit.unwrap_or(usize::MAX);
        records
            .into_iter()
            .skip(self.skip)
            .take(limit)
            .map(|record| match &self.projection {
                Some(fields) => project(record, fields),
                None => record,
            })
            .collect()
    }
}

// =============================================================================
// AGGREGATION PIPELINE
// =============================================================================

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    /// Keep records matching the example.
    Match(Record),
    /// Keep only the listed top-level fields.
    Project(Vec<String>),
    /// Order records.
    Sort(Vec<Sort>),
    Skip(usize),
    Limit(usize),
    /// Count records per distinct value of `by`; emits `{by: value, count: n}`.
    Group { by: String, count: String },
    /// Emit one record per element of the array at the path.
    Unwind(String),
}

/// An ordered list of aggregation stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    #[must_use]
    pub fn then(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage over `records`.
    #[must_use]
    pub fn run(&self, records: Vec<Record>) -> Vec<Record> {
        self.stages
            .iter()
            .fold(records, |records, stage| run_stage(stage, records))
    }
}

impl FromIterator<Stage> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

fn run_stage(stage: &Stage, mut records: Vec<Record>) -> Vec<Record> {
    match stage {
        Stage::Match(example) => records
            .into_iter()
            .filter(|record| matches(record, example))
            .collect(),
        Stage::Project(fields) => records
            .into_iter()
            .map(|record| project(record, fields))
            .collect(),
        Stage::Sort(criteria) => {
            sort_records(&mut records, criteria);
            records
        }
        Stage::Skip(n) => records.into_iter().skip(*n).collect(),
        Stage::Limit(n) => records.into_iter().take(*n).collect(),
        Stage::Group { by, count } => {
            let mut groups: Vec<(Value, u64)> = Vec::new();
            for record in &records {
                let value = lookup(record, by).cloned().unwrap_or(Value::Null);
                match groups.iter_mut().find(|(seen, _)| *seen == value) {
                    Some((_, n)) => *n = n.saturating_add(1),
                    None => groups.push((value, 1)),
                }
            }
            groups
                .into_iter()
                .map(|(value, n)| {
                    let mut group = Record::new();
                    group.insert(by.clone(), value);
                    group.insert(count.clone(), Value::from(n));
                    group
                })
                .collect()
        }
        Stage::Unwind(path) => records
            .into_iter()
            .flat_map(|record| match record.get(path.as_str()) {
                Some(Value::Array(items)) => items
                    .clone()
                    .into_iter()
                    .map(|item| {
                        let mut unwound = record.clone();
                        unwound.insert(path.clone(), item);
                        unwound
                    })
                    .collect::<Vec<_>>(),
                Some(Value::Null) | None => Vec::new(),
                Some(_) => vec![record],
            })
            .collect(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("object")
    }

    fn sample() -> Vec<Record> {
        vec![
            record(json!({"_key": "1", "type": "int", "n": 3, "tags": ["a", "b"]})),
            record(json!({"_key": "2", "type": "string", "n": 1, "meta": {"lang": "en"}})),
            record(json!({"_key": "3", "type": "int", "n": 2})),
        ]
    }

    #[test]
    fn lookup_follows_dotted_paths() {
        let records = sample();
        assert_eq!(lookup(&records[1], "meta.lang"), Some(&json!("en")));
        assert_eq!(lookup(&records[0], "tags.1"), Some(&json!("b")));
        assert_eq!(lookup(&records[0], "meta.lang"), None);
    }

    #[test]
    fn matches_by_example() {
        let records = sample();
        let filter = record(json!({"type": "int"}));
        let keys: Vec<_> = records
            .iter()
            .filter(|r| matches(r, &filter))
            .map(|r| r["_key"].clone())
            .collect();
        assert_eq!(keys, vec![json!("1"), json!("3")]);
    }

    #[test]
    fn null_example_matches_absent_field() {
        let records = sample();
        let filter = record(json!({"meta": null}));
        assert_eq!(records.iter().filter(|r| matches(r, &filter)).count(), 2);
    }

    #[test]
    fn query_sorts_skips_limits_and_projects() {
        let query = Query::new()
            .sort_by(Sort::descending("n"))
            .skip(1)
            .limit(1)
            .project(["n"]);
        let result = query.apply(sample());
        assert_eq!(result, vec![record(json!({"_key": "3", "n": 2}))]);
    }

    #[test]
    fn pipeline_groups_counts() {
        let pipeline = Pipeline::new()
            .then(Stage::Group {
                by: "type".to_string(),
                count: "count".to_string(),
            })
            .then(Stage::Sort(vec![Sort::descending("count")]));
        let result = pipeline.run(sample());
        assert_eq!(result[0], record(json!({"type": "int", "count": 2})));
        assert_eq!(result[1], record(json!({"type": "string", "count": 1})));
    }

    #[test]
    fn pipeline_unwinds_arrays() {
        let pipeline: Pipeline = [
            Stage::Unwind("tags".to_string()),
            Stage::Project(vec!["tags".to_string()]),
        ]
        .into_iter()
        .collect();
        let result = pipeline.run(sample());
        assert_eq!(
            result,
            vec![
                record(json!({"_key": "1", "tags": "a"})),
                record(json!({"_key": "1", "tags": "b"})),
            ]
        );
    }

    #[test]
    fn distinct_preserves_first_seen_order() {
        assert_eq!(distinct(&sample(), "type"), vec![json!("int"), json!("string")]);
    }

    #[test]
    fn values_compare_across_types() {
        assert!(compare_values(&Value::Null, &json!(false)).is_lt());
        assert!(compare_values(&json!(2), &json!(10)).is_lt());
        assert!(compare_values(&json!(1.5), &json!(1)).is_gt());
        assert!(compare_values(&json!("b"), &json!("a")).is_gt());
    }
}
