//! Column kinds shown to the table widget and used for chart eligibility.

use polars::prelude::*;
use serde::Serialize;

/// Semantic column type, independent of the concrete polars dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Numeric,
    Datetime,
    Any,
}

impl ColumnKind {
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Date | DataType::Datetime(_, _) => ColumnKind::Datetime,
            DataType::String => ColumnKind::Text,
            d if d.is_numeric() => ColumnKind::Numeric,
            _ => ColumnKind::Any,
        }
    }

    /// Numeric and untyped columns can be charted.
    pub fn is_chartable(self) -> bool {
        matches!(self, ColumnKind::Numeric | ColumnKind::Any)
    }
}

/// Column name and kind, as sent to the table widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

/// Recomputes the kind of every column of `df`.
pub fn column_specs(df: &DataFrame) -> Vec<ColumnSpec> {
    df.schema()
        .iter()
        .map(|(name, dtype)| ColumnSpec {
            name: name.to_string(),
            kind: ColumnKind::from_dtype(dtype),
        })
        .collect()
}

/// Column names of `df` as owned strings, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.schema().iter_names().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_dtypes() {
        assert_eq!(ColumnKind::from_dtype(&DataType::String), ColumnKind::Text);
        assert_eq!(ColumnKind::from_dtype(&DataType::Int64), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_dtype(&DataType::Float32), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_dtype(&DataType::UInt32), ColumnKind::Numeric);
        assert_eq!(ColumnKind::from_dtype(&DataType::Date), ColumnKind::Datetime);
        assert_eq!(
            ColumnKind::from_dtype(&DataType::Datetime(TimeUnit::Microseconds, None)),
            ColumnKind::Datetime
        );
        assert_eq!(ColumnKind::from_dtype(&DataType::Boolean), ColumnKind::Any);
    }

    #[test]
    fn column_specs_in_order() {
        let df = df!(
            "Category" => &["a", "b"],
            "Amount" => &[1.5_f64, 2.0],
            "Flag" => &[true, false]
        )
        .unwrap();
        let specs = column_specs(&df);
        let names: Vec<&str> = specs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Category", "Amount", "Flag"]);
        assert_eq!(specs[0].kind, ColumnKind::Text);
        assert_eq!(specs[1].kind, ColumnKind::Numeric);
        assert!(specs[2].kind.is_chartable());
        assert!(!ColumnKind::Datetime.is_chartable());
    }
}
