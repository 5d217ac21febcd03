//! Plain-text performance report.

use std::path::Path;

use chrono::NaiveDate;
use cyclewatch_common::error::CyclewatchResult;
use cyclewatch_processing_core::summary::ZoneSummary;

/// File name of the rendered report in an output directory.
pub const PERFORMANCE_REPORT_FILE: &str = "performance_report.txt";

const HEADERS: [&str; 7] = [
    "Zone",
    "Average",
    "Shortest",
    "Longest",
    "Target",
    "Achievement",
    "Status",
];

fn seconds(value: f64) -> String {
    format!("{value:.1}s")
}

fn row_cells(summary: &ZoneSummary) -> [String; 7] {
    [
        summary.zone_name.clone(),
        seconds(summary.average_seconds),
        seconds(summary.shortest_seconds),
        seconds(summary.longest_seconds),
        summary.target_seconds.map(seconds).unwrap_or_else(|| "-".to_string()),
        summary
            .achievement_percent
            .map(|p| format!("{p:.1}%"))
            .unwrap_or_else(|| "-".to_string()),
        summary
            .status
            .map(|s| s.symbol().to_string())
            .unwrap_or_else(|| "-".to_string()),
    ]
}

/// Render the summary table. Returns `None` when there is nothing to report.
pub fn render_performance_report(summaries: &[ZoneSummary], date: NaiveDate) -> Option<String> {
    if summaries.is_empty() {
        return None;
    }

    let rows: Vec<[String; 7]> = summaries.iter().map(row_cells).collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| {
                let pad = width.saturating_sub(cell.chars().count());
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let header_cells: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    let header = format_line(&header_cells);
    let rule = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut out = String::new();
    out.push_str("Assembly Performance Report\n");
    out.push_str(&date.format("%Y-%m-%d").to_string());
    out.push_str("\n\n");
    out.push_str(&header);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    for row in &rows {
        out.push_str(&format_line(row));
        out.push('\n');
    }
    Some(out)
}

/// Render and write the report. Returns false (and writes nothing) when
/// there is no data.
pub fn write_performance_report(
    path: &Path,
    summaries: &[ZoneSummary],
    date: NaiveDate,
) -> CyclewatchResult<bool> {
    let Some(text) = render_performance_report(summaries, date) else {
        tracing::warn!("No valid cycles, performance report not written");
        return Ok(false);
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    tracing::info!(path = %path.display(), zones = summaries.len(), "Performance report written");
    Ok(true)
}
