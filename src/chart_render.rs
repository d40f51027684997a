//! SVG rendering of bar charts with plotters.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use plotters::prelude::*;

use crate::chart::ChartSpec;
use crate::config::{parse_hex, ChartTheme};

fn rgb(hex: &str) -> Result<RGBColor> {
    let (r, g, b) = parse_hex(hex)?;
    Ok(RGBColor(r, g, b))
}

/// Value range for the y axis. Always includes zero so bars grow from the baseline.
fn y_range(values: &[Option<f64>]) -> (f64, f64) {
    let finite = values.iter().flatten().copied().filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if (hi - lo).abs() < f64::EPSILON {
        return (lo, lo + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (if lo < 0.0 { lo - pad } else { lo }, if hi > 0.0 { hi + pad } else { hi })
}

fn format_axis_label(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1e-3..1e5).contains(&a) {
        format!("{:.2e}", v)
    } else {
        let s = format!("{:.2}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn category_label(labels: &[String], v: &SegmentValue<usize>) -> String {
    match v {
        SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

/// Draw `spec` as an SVG document of the given size.
///
/// The background is left transparent; titles, labels and axes use the theme font and color.
pub fn render_svg(spec: &ChartSpec, theme: &ChartTheme, (width, height): (u32, u32)) -> Result<String> {
    if spec.x_labels.is_empty() {
        return Err(eyre!("No bars to draw"));
    }

    let font_color = rgb(&theme.font_color)?;
    let fallback = rgb(&theme.bar_color)?;
    let bar_colors: Vec<RGBColor> = spec
        .colors
        .iter()
        .map(|c| rgb(c))
        .collect::<Result<_>>()?;

    let n = spec.x_labels.len();
    let (y_min, y_max) = y_range(&spec.y_values);
    let family = theme.font_family.as_str();

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();

        let title_style = (family, theme.font_size as f64)
            .into_font()
            .color(&font_color);
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption(spec.title.as_str(), title_style)
            .x_label_area_size(60)
            .y_label_area_size(70)
            .build_cartesian_2d((0..n).into_segmented(), y_min..y_max)?;

        let labels = spec.x_labels.clone();
        let x_formatter = move |v: &SegmentValue<usize>| category_label(&labels, v);
        let y_formatter = |v: &f64| format_axis_label(*v);
        let tick_style = (family, spec.tick_font_size).into_font().color(&font_color);
        let axis_label_style = (family, 14.0).into_font().color(&font_color);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&x_formatter)
            .y_label_formatter(&y_formatter)
            .x_label_style(tick_style)
            .y_label_style(axis_label_style.clone())
            .axis_desc_style(axis_label_style)
            .axis_style(font_color)
            .light_line_style(font_color.mix(0.1))
            .bold_line_style(font_color.mix(0.2))
            .x_desc(spec.x_column.as_str())
            .y_desc(spec.y_column.as_str())
            .draw()?;

        chart.draw_series(spec.y_values.iter().enumerate().filter_map(|(i, value)| {
            let y = (*value)?;
            let color = bar_colors.get(i).copied().unwrap_or(fallback);
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), y)],
                color.filled(),
            );
            bar.set_margin(0, 0, 4, 4);
            Some(bar)
        }))?;

        root.present()?;
    }
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ChartSpec {
        ChartSpec {
            title: "Amount".to_string(),
            x_column: "Category".to_string(),
            y_column: "Amount".to_string(),
            x_labels: vec!["A".to_string(), "B".to_string()],
            y_values: vec![Some(16.0), None],
            colors: vec!["#0074D9".to_string(), "#7FDBFF".to_string()],
            tick_font_size: 15.0,
        }
    }

    #[test]
    fn y_range_contains_zero() {
        assert_eq!(y_range(&[]), (0.0, 1.0));
        let (lo, hi) = y_range(&[Some(10.0), Some(20.0)]);
        assert_eq!(lo, 0.0);
        assert!(hi > 20.0);
        let (lo, hi) = y_range(&[Some(-5.0), None]);
        assert!(lo < -5.0);
        assert_eq!(hi, 0.0);
    }

    #[test]
    fn axis_labels() {
        assert_eq!(format_axis_label(0.0), "0");
        assert_eq!(format_axis_label(2.5), "2.5");
        assert_eq!(format_axis_label(100.0), "100");
        assert_eq!(format_axis_label(1.5e7), "1.50e7");
    }

    #[test]
    fn category_labels_at_segment_centres() {
        let labels = vec!["A".to_string(), "B".to_string()];
        assert_eq!(category_label(&labels, &SegmentValue::CenterOf(1)), "B");
        assert_eq!(category_label(&labels, &SegmentValue::Exact(1)), "");
        assert_eq!(category_label(&labels, &SegmentValue::CenterOf(5)), "");
    }

    #[test]
    fn rejects_empty_chart_and_bad_colors() {
        let theme = ChartTheme::default();
        let mut empty = spec();
        empty.x_labels.clear();
        assert!(render_svg(&empty, &theme, (400, 300)).is_err());

        let mut bad = spec();
        bad.colors[0] = "blue".to_string();
        assert!(render_svg(&bad, &theme, (400, 300)).is_err());
    }

    #[test]
    fn renders_svg_document() {
        // Text layout needs a system font; skip the content checks when none is installed
        if let Ok(svg) = render_svg(&spec(), &ChartTheme::default(), (400, 300)) {
            assert!(svg.contains("<svg"));
            assert!(svg.contains("Amount"));
            assert!(svg.contains("#7FDBFF") || svg.contains("#7fdbff") || svg.contains("0074D9"));
        }
    }
}
