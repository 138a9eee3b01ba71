//! Final report output.

use anyhow::Result;
use bulkmail_core::DispatchReport;
use console::style;

/// Human-readable summary, one failure per line.
pub fn summary(report: &DispatchReport) -> String {
    let mut lines = vec![format!(
        "{} {} of {} messages in {}s",
        style("Sent").green().bold(),
        report.succeeded,
        report.total,
        report.elapsed.as_secs()
    )];

    if report.failed > 0 {
        lines.push(format!("{} {}", style("Failed:").red().bold(), report.failed));
        lines.extend(report.failures.iter().map(|failure| {
            format!(
                "  {} {}",
                style(&failure.recipient).yellow(),
                style(&failure.reason).dim()
            )
        }));
    }

    if report.cancelled {
        lines.push(format!(
            "{} {} recipient(s) were not contacted",
            style("Cancelled:").yellow().bold(),
            report.unsent
        ));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Machine-readable report.
pub fn json(report: &DispatchReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
