//! SVG Chart Generator for Training Curves
//!
//! Renders train/validation metric curves as standalone SVG files.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::training::TrainingHistory;
use crate::utils::error::Result;

const CHART_WIDTH: f64 = 800.0;
const CHART_HEIGHT: f64 = 500.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 80.0;
const MARGIN_LEFT: f64 = 80.0;

pub const COLOR_TRAIN: &str = "#3498db";
pub const COLOR_VALIDATION: &str = "#e74c3c";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_AXIS: &str = "#2c3e50";
const COLOR_TEXT: &str = "#2c3e50";

/// A data point for a line chart
#[derive(Debug, Clone, Copy)]
pub struct DataPoint {
    pub x: f64,
    pub y: f64,
}

/// A named data series
#[derive(Debug, Clone)]
pub struct DataSeries {
    pub name: String,
    pub points: Vec<DataPoint>,
    pub color: String,
}

impl DataSeries {
    /// Build a series from per-epoch values; x is the 1-based epoch number
    pub fn from_epochs(name: &str, values: &[f64], color: &str) -> Self {
        Self {
            name: name.to_string(),
            points: values
                .iter()
                .enumerate()
                .map(|(i, &y)| DataPoint {
                    x: (i + 1) as f64,
                    y,
                })
                .collect(),
            color: color.to_string(),
        }
    }
}

/// How the y axis is scaled and labelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YAxis {
    /// Values in [0, 1] rendered as 0-100%
    Percent,
    /// From zero to the data maximum
    Auto,
}

impl YAxis {
    fn range(self, data_max: f64) -> (f64, f64) {
        match self {
            YAxis::Percent => (0.0, 1.0_f64.max(data_max)),
            YAxis::Auto => {
                let max = if data_max.is_finite() && data_max > 0.0 {
                    data_max * 1.1
                } else {
                    1.0
                };
                (0.0, max)
            }
        }
    }

    fn tick(self, value: f64) -> String {
        match self {
            YAxis::Percent => format!("{:.0}%", value * 100.0),
            YAxis::Auto => format!("{:.2}", value),
        }
    }
}

/// Render a line chart to an SVG string
pub fn render_line_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    axis: YAxis,
    series: &[DataSeries],
) -> String {
    let plot_width = CHART_WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = CHART_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let (x_min, x_max, y_max) = find_ranges(series);
    let (y_min, y_max) = axis.range(y_max);
    // a single epoch still gets a visible x span
    let x_span = if x_max > x_min { x_max - x_min } else { 1.0 };
    let y_span = y_max - y_min;

    let to_x = |x: f64| MARGIN_LEFT + ((x - x_min) / x_span) * plot_width;
    let to_y = |y: f64| MARGIN_TOP + plot_height - ((y - y_min) / y_span) * plot_height;

    let mut svg = String::new();

    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}" width="{}" height="{}">"#,
        CHART_WIDTH, CHART_HEIGHT, CHART_WIDTH, CHART_HEIGHT
    );
    let _ = write!(
        svg,
        r#"<rect width="{}" height="{}" fill="white"/>"#,
        CHART_WIDTH, CHART_HEIGHT
    );
    let _ = write!(
        svg,
        r#"<text x="{}" y="35" text-anchor="middle" font-family="Arial, sans-serif" font-size="18" font-weight="bold" fill="{}">{}</text>"#,
        CHART_WIDTH / 2.0,
        COLOR_TEXT,
        escape_xml(title)
    );

    // Grid lines with y ticks
    for i in 0..=5 {
        let frac = i as f64 / 5.0;
        let y = MARGIN_TOP + plot_height - frac * plot_height;
        let value = y_min + frac * y_span;

        let _ = write!(
            svg,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="1"/>"#,
            MARGIN_LEFT,
            y,
            MARGIN_LEFT + plot_width,
            y,
            COLOR_GRID
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            MARGIN_LEFT - 10.0,
            y + 4.0,
            COLOR_TEXT,
            axis.tick(value)
        );
    }

    // Axes
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        MARGIN_LEFT + plot_width,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );
    let _ = write!(
        svg,
        r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="{}" stroke-width="2"/>"#,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_height,
        COLOR_AXIS
    );

    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}">{}</text>"#,
        MARGIN_LEFT + plot_width / 2.0,
        CHART_HEIGHT - 20.0,
        COLOR_TEXT,
        escape_xml(x_label)
    );
    let _ = write!(
        svg,
        r#"<text x="20" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="14" fill="{}" transform="rotate(-90 20 {})">{}</text>"#,
        CHART_HEIGHT / 2.0,
        COLOR_TEXT,
        CHART_HEIGHT / 2.0,
        escape_xml(y_label)
    );

    for series_data in series.iter().filter(|s| !s.points.is_empty()) {
        let path = series_data
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let cmd = if i == 0 { "M" } else { "L" };
                format!("{} {:.2} {:.2}", cmd, to_x(p.x), to_y(p.y))
            })
            .collect::<Vec<_>>()
            .join(" ");

        let _ = write!(
            svg,
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            path, series_data.color
        );

        for point in &series_data.points {
            let _ = write!(
                svg,
                r#"<circle cx="{:.2}" cy="{:.2}" r="3" fill="{}"/>"#,
                to_x(point.x),
                to_y(point.y),
                series_data.color
            );
        }
    }

    // X-axis ticks: at most ~10 epoch labels
    if let Some(first) = series.iter().find(|s| !s.points.is_empty()) {
        let step = (first.points.len() / 10).max(1);
        for point in first.points.iter().step_by(step) {
            let _ = write!(
                svg,
                r#"<text x="{:.2}" y="{}" text-anchor="middle" font-family="Arial, sans-serif" font-size="11" fill="{}">{:.0}</text>"#,
                to_x(point.x),
                MARGIN_TOP + plot_height + 20.0,
                COLOR_TEXT,
                point.x
            );
        }
    }

    // Legend
    let mut legend_y = MARGIN_TOP + 10.0;
    for series_data in series {
        let _ = write!(
            svg,
            r#"<rect x="{}" y="{}" width="15" height="15" fill="{}"/>"#,
            CHART_WIDTH - MARGIN_RIGHT - 140.0,
            legend_y,
            series_data.color
        );
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-family="Arial, sans-serif" font-size="12" fill="{}">{}</text>"#,
            CHART_WIDTH - MARGIN_RIGHT - 120.0,
            legend_y + 12.0,
            COLOR_TEXT,
            escape_xml(&series_data.name)
        );
        legend_y += 25.0;
    }

    svg.push_str("</svg>");
    svg
}

/// Write the accuracy and loss curves of a training run.
///
/// Returns the paths of `accuracy.svg` and `loss.svg` inside `output_dir`.
pub fn plot_history(history: &TrainingHistory, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(output_dir)?;

    let accuracy = render_line_chart(
        "Training and validation accuracy",
        "Epoch",
        "Accuracy",
        YAxis::Percent,
        &[
            DataSeries::from_epochs("Training", &history.accuracy(), COLOR_TRAIN),
            DataSeries::from_epochs("Validation", &history.val_accuracy(), COLOR_VALIDATION),
        ],
    );
    let loss = render_line_chart(
        "Training and validation loss",
        "Epoch",
        "Loss",
        YAxis::Auto,
        &[
            DataSeries::from_epochs("Training", &history.loss(), COLOR_TRAIN),
            DataSeries::from_epochs("Validation", &history.val_loss(), COLOR_VALIDATION),
        ],
    );

    let accuracy_path = output_dir.join("accuracy.svg");
    let loss_path = output_dir.join("loss.svg");
    fs::write(&accuracy_path, accuracy)?;
    fs::write(&loss_path, loss)?;

    tracing::info!(
        "Saved training curves to {:?} and {:?}",
        accuracy_path,
        loss_path
    );

    Ok((accuracy_path, loss_path))
}

/// (x_min, x_max, y_max) over all points
fn find_ranges(series: &[DataSeries]) -> (f64, f64, f64) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_max = f64::NEG_INFINITY;

    for p in series.iter().flat_map(|s| s.points.iter()) {
        x_min = x_min.min(p.x);
        x_max = x_max.max(p.x);
        y_max = y_max.max(p.y);
    }

    if !x_min.is_finite() {
        return (0.0, 1.0, 0.0);
    }

    (x_min, x_max, y_max)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_chart_contains_series() {
        let series = vec![
            DataSeries::from_epochs("Training", &[0.2, 0.5, 0.7], COLOR_TRAIN),
            DataSeries::from_epochs("Validation", &[0.1, 0.4, 0.6], COLOR_VALIDATION),
        ];

        let svg = render_line_chart("Acc", "Epoch", "Accuracy", YAxis::Percent, &series);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains("100%"));
    }

    #[test]
    fn test_single_epoch_has_no_nan() {
        let series = vec![DataSeries::from_epochs("Training", &[1.3], COLOR_TRAIN)];
        let svg = render_line_chart("Loss", "Epoch", "Loss", YAxis::Auto, &series);
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b & c"), "a&lt;b &amp; c");
    }

    #[test]
    fn test_plot_history_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = TrainingHistory::default();
        history.record(3.1, 0.05, 3.0, 0.08);

        let (acc, loss) = plot_history(&history, dir.path()).unwrap();
        assert!(acc.exists());
        assert!(loss.exists());
    }
}
