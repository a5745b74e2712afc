//! Running subtotals for the page-break table

use crate::config::{SubtotalMode, TableColumnConfig};
use crate::format::value_as_number;
use crate::record::Record;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtotalAccumulator {
    totals: BTreeMap<String, f64>,
}

impl SubtotalAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one row's value for `column` into its running total.
    ///
    /// Sum mode adds numeric values, treats blank or null values as zero and
    /// counts any other text as one. Columns without a subtotal mode are ignored.
    pub fn accumulate(&mut self, column: &TableColumnConfig, row: &Record) {
        let Some(mode) = column.subtotal else {
            return;
        };
        let total = self.totals.entry(column.field.field_key.clone()).or_insert(0.0);
        *total += match mode {
            SubtotalMode::Sum => sum_increment(row.field(&column.field.field_key)),
            SubtotalMode::Count => 1.0,
        };
    }

    /// Running total for a column, zero if it never accumulated
    pub fn total(&self, field_key: &str) -> f64 {
        self.totals.get(field_key).copied().unwrap_or(0.0)
    }
}

fn sum_increment(value: Option<&Value>) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::String(s)) if s.trim().is_empty() => 0.0,
        other => value_as_number(other).unwrap_or(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldPlacement;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn column(key: &str, mode: Option<SubtotalMode>) -> TableColumnConfig {
        TableColumnConfig {
            field: FieldPlacement::new(key, 0.0, 0.0, 10.0),
            subtotal: mode,
        }
    }

    #[test]
    fn test_sum_counts_non_numeric_as_one() {
        let amount = column("amount", Some(SubtotalMode::Sum));
        let mut acc = SubtotalAccumulator::new();
        for value in [json!(100), json!("250.5"), json!("n/a")] {
            acc.accumulate(&amount, &Record::new().with("amount", value));
        }
        assert_eq!(acc.total("amount"), 351.5);
    }

    #[test]
    fn test_sum_treats_blank_and_null_as_zero() {
        let amount = column("amount", Some(SubtotalMode::Sum));
        let mut acc = SubtotalAccumulator::new();
        let rows = [
            json!({"type": "NUMBER", "value": "1000"}),
            json!({"type": "NUMBER", "value": ""}),
            json!({"type": "NUMBER", "value": null}),
            json!("   "),
        ];
        for value in rows {
            acc.accumulate(&amount, &Record::new().with("amount", value));
        }
        acc.accumulate(&amount, &Record::new());
        assert_eq!(acc.total("amount"), 1000.0);
    }

    #[test]
    fn test_count_ignores_values() {
        let item = column("item", Some(SubtotalMode::Count));
        let mut acc = SubtotalAccumulator::new();
        acc.accumulate(&item, &Record::new().with("item", 500));
        acc.accumulate(&item, &Record::new());
        assert_eq!(acc.total("item"), 2.0);
    }

    #[test]
    fn test_columns_without_mode_are_skipped() {
        let note = column("note", None);
        let mut acc = SubtotalAccumulator::new();
        acc.accumulate(&note, &Record::new().with("note", 5));
        assert_eq!(acc, SubtotalAccumulator::new());
        assert_eq!(acc.total("note"), 0.0);
    }

    #[test]
    fn test_host_field_shape_is_unwrapped() {
        let amount = column("amount", Some(SubtotalMode::Sum));
        let mut acc = SubtotalAccumulator::new();
        let row = Record::new().with("amount", json!({"type": "NUMBER", "value": "12"}));
        acc.accumulate(&amount, &row);
        assert_eq!(acc.total("amount"), 12.0);
    }

    proptest! {
        #[test]
        fn prop_sum_and_count(values in prop::collection::vec(
            prop_oneof![
                (-10_000i64..10_000).prop_map(|n| Some(json!(n))),
                Just(Some(json!("-"))),
                Just(Some(json!(""))),
                Just(None),
            ],
            0..60,
        )) {
            let sum = column("amount", Some(SubtotalMode::Sum));
            let count = column("amount", Some(SubtotalMode::Count));
            let mut sums = SubtotalAccumulator::new();
            let mut counts = SubtotalAccumulator::new();

            for value in &values {
                let row = match value {
                    Some(v) => Record::new().with("amount", v.clone()),
                    None => Record::new().with("amount", Value::Null),
                };
                sums.accumulate(&sum, &row);
                counts.accumulate(&count, &row);
            }

            let expected: f64 = values
                .iter()
                .map(|v| match v.as_ref().and_then(Value::as_f64) {
                    Some(n) => n,
                    None if v.as_ref().and_then(Value::as_str) == Some("-") => 1.0,
                    None => 0.0,
                })
                .sum();
            prop_assert_eq!(sums.total("amount"), expected);
            prop_assert_eq!(counts.total("amount"), values.len() as f64);
        }
    }
}
