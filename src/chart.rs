//! Bar chart projection of the displayed rows.

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::aggregate::{AggregationMethod, SIZE_COLUMN};
use crate::config::{ChartTheme, MAX_PLOT_BARS};
use crate::error::DxResult;
use crate::table::ColumnKind;

/// Separator between group-by names in a composite x column.
pub const COMPOSITE_NAME_SEPARATOR: &str = "___";

/// Separator between group-by values in a composite x label.
pub const COMPOSITE_LABEL_SEPARATOR: &str = "--";

const TICK_FONT_MAX: f64 = 16.0;
const TICK_FONT_MIN: f64 = 12.0;

/// One bar chart: a numeric column plotted against the group-by labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub x_column: String,
    pub y_column: String,
    pub x_labels: Vec<String>,
    pub y_values: Vec<Option<f64>>,
    pub colors: Vec<String>,
    pub tick_font_size: f64,
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Tick label size shrinks from 16 to 12 as the bar count approaches the slider maximum.
pub fn tick_font_size(rows: usize, max_bars: usize) -> f64 {
    let t = rows.min(max_bars) as f64 / MAX_PLOT_BARS as f64;
    lerp(TICK_FONT_MAX, TICK_FONT_MIN, t.min(1.0))
}

/// Build one chart per chartable column of `displayed`.
///
/// Returns no charts when `max_bars` is 0, nothing is grouped, or no method is set. Only the
/// first `max_bars` rows are plotted, in their displayed order.
pub fn project(
    displayed: &DataFrame,
    group_by: &[String],
    method: Option<AggregationMethod>,
    max_bars: usize,
    selection: &[usize],
    theme: &ChartTheme,
) -> DxResult<Vec<ChartSpec>> {
    if max_bars == 0 || group_by.is_empty() || method.is_none() {
        return Ok(Vec::new());
    }

    let schema = displayed.schema();
    if let Some(missing) = group_by.iter().find(|g| !schema.contains(g.as_str())) {
        debug!("no charts: group column {} not displayed", missing);
        return Ok(Vec::new());
    }

    let n = displayed.height().min(max_bars);
    let rows = displayed.slice(0, n);
    let x_column = group_by.join(COMPOSITE_NAME_SEPARATOR);
    let x_labels = x_labels(&rows, group_by)?;
    let colors: Vec<String> = (0..n)
        .map(|i| {
            if selection.contains(&i) {
                theme.accent_color.clone()
            } else {
                theme.bar_color.clone()
            }
        })
        .collect();
    let tick_font_size = tick_font_size(displayed.height(), max_bars);

    let mut charts = Vec::new();
    for (name, dtype) in schema.iter() {
        let name = name.as_str();
        if group_by.iter().any(|g| g == name) {
            continue;
        }
        let synthetic = name == SIZE_COLUMN || name == "count";
        if !synthetic && !ColumnKind::from_dtype(dtype).is_chartable() {
            continue;
        }
        let Some(y_values) = y_values(&rows, name) else {
            debug!("column {} cannot be plotted as numbers", name);
            continue;
        };
        charts.push(ChartSpec {
            title: name.to_string(),
            x_column: x_column.clone(),
            y_column: name.to_string(),
            x_labels: x_labels.clone(),
            y_values,
            colors: colors.clone(),
            tick_font_size,
        });
    }
    Ok(charts)
}

fn x_labels(rows: &DataFrame, group_by: &[String]) -> DxResult<Vec<String>> {
    let mut parts: Vec<Vec<String>> = Vec::with_capacity(group_by.len());
    for name in group_by {
        let text = rows.column(name)?.cast(&DataType::String)?;
        parts.push(
            text.str()?
                .into_iter()
                .map(|v| v.unwrap_or_default().to_string())
                .collect(),
        );
    }
    Ok((0..rows.height())
        .map(|i| {
            parts
                .iter()
                .map(|p| p[i].as_str())
                .collect::<Vec<_>>()
                .join(COMPOSITE_LABEL_SEPARATOR)
        })
        .collect())
}

fn y_values(rows: &DataFrame, name: &str) -> Option<Vec<Option<f64>>> {
    let values = rows.column(name).ok()?.cast(&DataType::Float64).ok()?;
    let values = values.f64().ok()?;
    Some(values.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouped() -> DataFrame {
        df!(
            "Category" => &["A", "B", "C"],
            "Region" => &["N", "S", "N"],
            "Amount" => &[16.0, 9.0, 1.0],
            "Label" => &["x", "y", "z"]
        )
        .unwrap()
    }

    fn category() -> Vec<String> {
        vec!["Category".to_string()]
    }

    #[test]
    fn nothing_without_grouping_or_bars() {
        let theme = ChartTheme::default();
        let df = grouped();
        let m = Some(AggregationMethod::Sum);
        assert!(project(&df, &[], m, 10, &[], &theme).unwrap().is_empty());
        assert!(project(&df, &category(), m, 0, &[], &theme)
            .unwrap()
            .is_empty());
        assert!(project(&df, &category(), None, 10, &[], &theme)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn one_chart_per_numeric_column() {
        let theme = ChartTheme::default();
        let charts = project(
            &grouped(),
            &category(),
            Some(AggregationMethod::Sum),
            10,
            &[1],
            &theme,
        )
        .unwrap();
        assert_eq!(charts.len(), 1);
        let chart = &charts[0];
        assert_eq!(chart.title, "Amount");
        assert_eq!(chart.x_column, "Category");
        assert_eq!(chart.x_labels, vec!["A", "B", "C"]);
        assert_eq!(chart.y_values, vec![Some(16.0), Some(9.0), Some(1.0)]);
        assert_eq!(
            chart.colors,
            vec!["#0074D9", "#7FDBFF", "#0074D9"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn composite_axis_for_several_group_columns() {
        let theme = ChartTheme::default();
        let group_by = vec!["Category".to_string(), "Region".to_string()];
        let charts = project(
            &grouped(),
            &group_by,
            Some(AggregationMethod::Max),
            2,
            &[],
            &theme,
        )
        .unwrap();
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].x_column, "Category___Region");
        assert_eq!(charts[0].x_labels, vec!["A--N", "B--S"]);
        assert_eq!(charts[0].y_values.len(), 2);
    }

    #[test]
    fn size_column_is_charted() {
        let df = df!(
            "Category" => &["A", "B"],
            "size" => &[3u32, 2]
        )
        .unwrap();
        let charts = project(
            &df,
            &category(),
            Some(AggregationMethod::Count),
            10,
            &[],
            &ChartTheme::default(),
        )
        .unwrap();
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].y_column, "size");
        assert_eq!(charts[0].y_values, vec![Some(3.0), Some(2.0)]);
    }

    #[test]
    fn tick_font_interpolates() {
        assert_eq!(tick_font_size(0, 10), 16.0);
        assert_eq!(tick_font_size(100, 50), 12.0);
        assert!((tick_font_size(25, 50) - 14.0).abs() < 1e-9);
        assert!((tick_font_size(3, 10) - 15.76).abs() < 1e-9);
    }
}
