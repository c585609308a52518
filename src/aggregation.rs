// 📊 Aggregation Engine - Metric rows → per-party totals
//
// Fill-then-reduce: a missing metric value counts as 0 before summing.
// Derived metrics are ratios over the reduced values; a zero denominator
// yields 0.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// ROWS & SPECS
// ============================================================================

/// One source record, keyed by its (canonical) party label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRow {
    /// Group key
    pub party_label: String,

    /// Numeric metrics; None = missing
    pub numeric_metrics: BTreeMap<String, Option<f64>>,

    /// String attributes for count-distinct reducers
    pub tags: BTreeMap<String, String>,
}

impl MetricRow {
    pub fn new(party_label: &str) -> Self {
        MetricRow {
            party_label: party_label.to_string(),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, field: &str, value: Option<f64>) -> Self {
        self.numeric_metrics.insert(field.to_string(), value);
        self
    }

    pub fn with_tag(mut self, field: &str, value: &str) -> Self {
        self.tags.insert(field.to_string(), value.to_string());
        self
    }

    fn metric(&self, field: &str) -> f64 {
        self.numeric_metrics
            .get(field)
            .copied()
            .flatten()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reducer {
    /// Sum of a numeric field, missing = 0
    Sum,

    /// Number of rows in the group
    Count,

    /// Number of distinct non-empty values of a tag
    CountDistinct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub output: String,
    pub field: String,
    pub reducer: Reducer,
}

impl MetricSpec {
    pub fn sum(output: &str, field: &str) -> Self {
        MetricSpec {
            output: output.to_string(),
            field: field.to_string(),
            reducer: Reducer::Sum,
        }
    }

    pub fn count(output: &str) -> Self {
        MetricSpec {
            output: output.to_string(),
            field: String::new(),
            reducer: Reducer::Count,
        }
    }

    pub fn count_distinct(output: &str, tag: &str) -> Self {
        MetricSpec {
            output: output.to_string(),
            field: tag.to_string(),
            reducer: Reducer::CountDistinct,
        }
    }
}

/// Post-aggregation ratio of two reduced values
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetric {
    pub output: String,
    pub numerator: String,
    pub denominator: String,
}

impl DerivedMetric {
    pub fn ratio(output: &str, numerator: &str, denominator: &str) -> Self {
        DerivedMetric {
            output: output.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
        }
    }
}

/// Division where a zero denominator yields zero
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

// ============================================================================
// AGGREGATED OUTPUT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPartyMetrics {
    pub party: String,
    pub sums: BTreeMap<String, f64>,
    pub derived: BTreeMap<String, f64>,
}

impl AggregatedPartyMetrics {
    /// Reduced or derived value by name, 0 when absent
    pub fn value(&self, name: &str) -> f64 {
        self.sums
            .get(name)
            .or_else(|| self.derived.get(name))
            .copied()
            .unwrap_or(0.0)
    }
}

// ============================================================================
// AGGREGATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    specs: Vec<MetricSpec>,
    derived: Vec<DerivedMetric>,
    sort_key: Option<String>,
}

#[derive(Default)]
struct GroupAccumulator {
    rows: usize,
    sums: BTreeMap<String, f64>,
    distinct: BTreeMap<String, BTreeSet<String>>,
}

impl AggregationEngine {
    pub fn new(specs: Vec<MetricSpec>) -> Self {
        AggregationEngine {
            specs,
            derived: Vec::new(),
            sort_key: None,
        }
    }

    pub fn with_derived(mut self, derived: Vec<DerivedMetric>) -> Self {
        self.derived = derived;
        self
    }

    /// Sort output by this reduced or derived value, descending
    pub fn sort_by(mut self, key: &str) -> Self {
        self.sort_key = Some(key.to_string());
        self
    }

    /// Group rows by party label and reduce every configured metric
    ///
    /// One output row per party. Ties on the sort key (or no sort key) are
    /// ordered by party ascending.
    pub fn aggregate(&self, rows: &[MetricRow]) -> Vec<AggregatedPartyMetrics> {
        let mut groups: BTreeMap<&str, GroupAccumulator> = BTreeMap::new();

        for row in rows {
            let group = groups.entry(row.party_label.as_str()).or_default();
            group.rows += 1;

            for spec in &self.specs {
                match spec.reducer {
                    Reducer::Sum => {
                        *group.sums.entry(spec.output.clone()).or_insert(0.0) +=
                            row.metric(&spec.field);
                    }
                    Reducer::Count => {}
                    Reducer::CountDistinct => {
                        let values = group.distinct.entry(spec.output.clone()).or_default();
                        if let Some(value) = row.tags.get(&spec.field) {
                            if !value.is_empty() {
                                values.insert(value.clone());
                            }
                        }
                    }
                }
            }
        }

        let mut aggregated: Vec<AggregatedPartyMetrics> = groups
            .into_iter()
            .map(|(party, group)| self.finish(party, group))
            .collect();

        if let Some(key) = &self.sort_key {
            aggregated.sort_by(|a, b| descending_by(key, a, b));
        }

        aggregated
    }

    fn finish(&self, party: &str, group: GroupAccumulator) -> AggregatedPartyMetrics {
        let mut sums = BTreeMap::new();
        for spec in &self.specs {
            let value = match spec.reducer {
                Reducer::Sum => group.sums.get(&spec.output).copied().unwrap_or(0.0),
                Reducer::Count => group.rows as f64,
                Reducer::CountDistinct => group
                    .distinct
                    .get(&spec.output)
                    .map(|values| values.len() as f64)
                    .unwrap_or(0.0),
            };
            sums.insert(spec.output.clone(), value);
        }

        let mut metrics = AggregatedPartyMetrics {
            party: party.to_string(),
            sums,
            derived: BTreeMap::new(),
        };

        for derived in &self.derived {
            let value = safe_ratio(
                metrics.value(&derived.numerator),
                metrics.value(&derived.denominator),
            );
            metrics.derived.insert(derived.output.clone(), value);
        }

        metrics
    }
}

/// Compare two aggregates by a value, descending, then party ascending
fn descending_by(key: &str, a: &AggregatedPartyMetrics, b: &AggregatedPartyMetrics) -> Ordering {
    b.value(key)
        .total_cmp(&a.value(key))
        .then_with(|| a.party.cmp(&b.party))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_engine() -> AggregationEngine {
        AggregationEngine::new(vec![
            MetricSpec::count("posts"),
            MetricSpec::sum("views", "playcount"),
            MetricSpec::sum("shares", "sharecount"),
            MetricSpec::count_distinct("politicians", "politician"),
        ])
        .with_derived(vec![DerivedMetric::ratio("views_per_post", "views", "posts")])
        .sort_by("views")
    }

    fn create_test_row(party: &str, politician: &str, views: Option<f64>, shares: Option<f64>) -> MetricRow {
        MetricRow::new(party)
            .with_metric("playcount", views)
            .with_metric("sharecount", shares)
            .with_tag("politician", politician)
    }

    #[test]
    fn test_sum_count_and_distinct() {
        let engine = create_test_engine();
        let rows = vec![
            create_test_row("LEGA", "Matteo Salvini", Some(100.0), Some(1.0)),
            create_test_row("LEGA", "Matteo Salvini", Some(50.0), Some(2.0)),
            create_test_row("LEGA", "Luca Zaia", Some(10.0), Some(0.0)),
        ];

        let result = engine.aggregate(&rows);
        assert_eq!(result.len(), 1);
        let lega = &result[0];
        assert_eq!(lega.party, "LEGA");
        assert_eq!(lega.value("posts"), 3.0);
        assert_eq!(lega.value("views"), 160.0);
        assert_eq!(lega.value("shares"), 3.0);
        assert_eq!(lega.value("politicians"), 2.0);
        assert!((lega.value("views_per_post") - 160.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_value_contributes_zero() {
        let engine = create_test_engine();
        let rows = vec![
            create_test_row("PD", "Enrico Letta", Some(10.0), None),
            create_test_row("PD", "Enrico Letta", Some(5.0), Some(4.0)),
            // No sharecount key at all
            MetricRow::new("PD").with_metric("playcount", Some(1.0)),
        ];

        let result = engine.aggregate(&rows);
        assert_eq!(result[0].value("shares"), 4.0);
        assert_eq!(result[0].value("posts"), 3.0);
        assert_eq!(result[0].value("views"), 16.0);
    }

    #[test]
    fn test_zero_denominator_yields_zero() {
        let engine = AggregationEngine::new(vec![MetricSpec::sum("likes", "likes"), MetricSpec::sum("views", "views")])
            .with_derived(vec![DerivedMetric::ratio("likes_per_view", "likes", "views")]);
        let rows = vec![MetricRow::new("VITA").with_metric("likes", Some(7.0))];

        let result = engine.aggregate(&rows);
        assert_eq!(result[0].value("likes_per_view"), 0.0);
        assert_eq!(safe_ratio(1.0, 0.0), 0.0);
        assert_eq!(safe_ratio(1.0, 4.0), 0.25);
    }

    #[test]
    fn test_output_sorted_descending_with_party_tie_break() {
        let engine = create_test_engine();
        let rows = vec![
            create_test_row("B", "x", Some(10.0), None),
            create_test_row("C", "y", Some(30.0), None),
            create_test_row("A", "z", Some(10.0), None),
        ];

        let parties: Vec<String> = engine.aggregate(&rows).into_iter().map(|r| r.party).collect();
        assert_eq!(parties, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_result_independent_of_row_order() {
        let engine = create_test_engine();
        let rows = vec![
            create_test_row("LEGA", "a", Some(1.0), Some(3.0)),
            create_test_row("PD", "b", Some(2.0), None),
            create_test_row("LEGA", "c", None, Some(5.0)),
            create_test_row("PD", "b", Some(8.0), Some(1.0)),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        assert_eq!(engine.aggregate(&rows), engine.aggregate(&reversed));
    }

    #[test]
    fn test_empty_input() {
        assert!(create_test_engine().aggregate(&[]).is_empty());
    }

    #[test]
    fn test_empty_tags_not_counted_as_distinct() {
        let engine = create_test_engine();
        let rows = vec![
            create_test_row("AZIONE", "", Some(1.0), None),
            create_test_row("AZIONE", "Carlo Calenda", Some(1.0), None),
        ];
        assert_eq!(engine.aggregate(&rows)[0].value("politicians"), 1.0);
    }
}
