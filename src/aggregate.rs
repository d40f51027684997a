//! Group-by aggregation of a loaded table.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{DxError, DxResult};

/// Name of the partition-size column produced by `Count`.
pub const SIZE_COLUMN: &str = "size";

/// Statistic computed per group for every numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AggregationMethod {
    #[default]
    Count,
    Sum,
    Mean,
    #[serde(rename = "Standard Deviation", alias = "StandardDeviation")]
    StandardDeviation,
    Variance,
    Min,
    Max,
}

impl AggregationMethod {
    /// All methods in the order they are offered to the user.
    pub const ALL: [AggregationMethod; 7] = [
        AggregationMethod::Count,
        AggregationMethod::Sum,
        AggregationMethod::Mean,
        AggregationMethod::StandardDeviation,
        AggregationMethod::Variance,
        AggregationMethod::Min,
        AggregationMethod::Max,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AggregationMethod::Count => "Count",
            AggregationMethod::Sum => "Sum",
            AggregationMethod::Mean => "Mean",
            AggregationMethod::StandardDeviation => "Standard Deviation",
            AggregationMethod::Variance => "Variance",
            AggregationMethod::Min => "Min",
            AggregationMethod::Max => "Max",
        }
    }

    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|m| m.label()).collect()
    }

    fn expr(self, column: &str) -> Expr {
        let c = col(column);
        match self {
            AggregationMethod::Count => len(),
            AggregationMethod::Sum => c.sum(),
            AggregationMethod::Mean => c.mean(),
            AggregationMethod::StandardDeviation => c.std(1),
            AggregationMethod::Variance => c.var(1),
            AggregationMethod::Min => c.min(),
            AggregationMethod::Max => c.max(),
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AggregationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "count" | "size" => Ok(AggregationMethod::Count),
            "sum" => Ok(AggregationMethod::Sum),
            "mean" | "avg" | "average" => Ok(AggregationMethod::Mean),
            "standarddeviation" | "std" | "stddev" => Ok(AggregationMethod::StandardDeviation),
            "variance" | "var" => Ok(AggregationMethod::Variance),
            "min" => Ok(AggregationMethod::Min),
            "max" => Ok(AggregationMethod::Max),
            _ => Err(format!("Unknown aggregation method: {}", s)),
        }
    }
}

/// Aggregate `table` by `group_by` using `method`.
///
/// With no group-by columns or no method the table is returned unchanged. Groups keep the
/// order of their first appearance. Non-numeric columns outside the grouping are dropped;
/// `Count` replaces all value columns with a single `size` column.
pub fn aggregate(
    table: &DataFrame,
    group_by: &[String],
    method: Option<AggregationMethod>,
) -> DxResult<DataFrame> {
    let Some(method) = method else {
        return Ok(table.clone());
    };
    if group_by.is_empty() {
        return Ok(table.clone());
    }

    let schema = table.schema();
    if let Some(missing) = group_by.iter().find(|c| !schema.contains(c.as_str())) {
        return Err(DxError::InvalidGroupByColumn(missing.clone()));
    }

    let keys: Vec<Expr> = group_by.iter().map(|c| col(c.as_str())).collect();
    let aggs: Vec<Expr> = match method {
        AggregationMethod::Count => vec![method.expr(SIZE_COLUMN).alias(SIZE_COLUMN)],
        _ => schema
            .iter()
            .filter(|(name, dtype)| {
                dtype.is_numeric() && !group_by.iter().any(|g| g.as_str() == name.as_str())
            })
            .map(|(name, _)| method.expr(name.as_str()))
            .collect(),
    };
    debug!(
        "aggregating {} rows by {:?} with {}",
        table.height(),
        group_by,
        method
    );

    Ok(table
        .clone()
        .lazy()
        .group_by_stable(keys)
        .agg(aggs)
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales() -> DataFrame {
        df!(
            "Category" => &["A", "B", "A", "C", "B", "A"],
            "Region" => &["N", "N", "S", "S", "N", "N"],
            "Amount" => &[10.0, 5.0, 2.5, 1.0, 4.0, 3.5],
            "Qty" => &[1i64, 2, 3, 4, 5, 6]
        )
        .unwrap()
    }

    fn strings(col: &Column) -> Vec<String> {
        col.str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn labels_in_declaration_order() {
        assert_eq!(
            AggregationMethod::labels(),
            vec![
                "Count",
                "Sum",
                "Mean",
                "Standard Deviation",
                "Variance",
                "Min",
                "Max"
            ]
        );
    }

    #[test]
    fn parse_method_names() {
        for m in AggregationMethod::ALL {
            assert_eq!(AggregationMethod::from_str(m.label()).unwrap(), m);
        }
        assert_eq!(
            AggregationMethod::from_str("std").unwrap(),
            AggregationMethod::StandardDeviation
        );
        assert_eq!(
            AggregationMethod::from_str("standard deviation").unwrap(),
            AggregationMethod::StandardDeviation
        );
        assert!(AggregationMethod::from_str("median").is_err());
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&AggregationMethod::StandardDeviation).unwrap();
        assert_eq!(json, "\"Standard Deviation\"");
        let m: AggregationMethod = serde_json::from_str("\"Variance\"").unwrap();
        assert_eq!(m, AggregationMethod::Variance);
    }

    #[test]
    fn passthrough_without_grouping_or_method() {
        let df = sales();
        let same = aggregate(&df, &[], Some(AggregationMethod::Sum)).unwrap();
        assert!(same.equals_missing(&df));
        let same = aggregate(&df, &["Category".to_string()], None).unwrap();
        assert!(same.equals_missing(&df));
    }

    #[test]
    fn count_yields_size_per_group() {
        let out = aggregate(
            &sales(),
            &["Category".to_string()],
            Some(AggregationMethod::Count),
        )
        .unwrap();
        let names: Vec<String> = out.schema().iter_names().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["Category", "size"]);
        assert_eq!(strings(out.column("Category").unwrap()), vec!["A", "B", "C"]);
        let sizes = out
            .column("size")
            .unwrap()
            .cast(&DataType::Int64)
            .unwrap();
        let sizes: Vec<i64> = sizes.i64().unwrap().into_no_null_iter().collect();
        assert_eq!(sizes, vec![3, 2, 1]);
    }

    #[test]
    fn sum_drops_text_columns() {
        let out = aggregate(
            &sales(),
            &["Category".to_string()],
            Some(AggregationMethod::Sum),
        )
        .unwrap();
        let names: Vec<String> = out.schema().iter_names().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["Category", "Amount", "Qty"]);
        let amounts: Vec<f64> = out
            .column("Amount")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(amounts, vec![16.0, 9.0, 1.0]);
    }

    #[test]
    fn std_uses_sample_statistic() {
        let out = aggregate(
            &sales(),
            &["Category".to_string()],
            Some(AggregationMethod::StandardDeviation),
        )
        .unwrap();
        let qty = out
            .column("Qty")
            .unwrap()
            .cast(&DataType::Float64)
            .unwrap();
        let qty = qty.f64().unwrap();
        // Category A has Qty 1, 3, 6: sample std = sqrt(6.333..)
        let a = qty.get(0).unwrap();
        assert!((a - (19.0_f64 / 3.0).sqrt()).abs() < 1e-9, "got {}", a);
        // single-row group has no sample std
        assert!(qty.get(2).is_none());
    }

    #[test]
    fn multi_column_grouping() {
        let out = aggregate(
            &sales(),
            &["Category".to_string(), "Region".to_string()],
            Some(AggregationMethod::Max),
        )
        .unwrap();
        assert_eq!(out.height(), 4);
        assert_eq!(strings(out.column("Region").unwrap()), vec!["N", "N", "S", "S"]);
    }

    #[test]
    fn missing_group_column_fails() {
        let err = aggregate(
            &sales(),
            &["Nope".to_string()],
            Some(AggregationMethod::Mean),
        )
        .unwrap_err();
        assert!(matches!(err, DxError::InvalidGroupByColumn(c) if c == "Nope"));
    }
}
