//! Run summary reporting.

use console::style;

use crate::download::RunSummary;

/// Print the end-of-run summary: counts, every failed index, and the
/// reason for any halt.
pub fn print_run_summary(summary: &RunSummary) {
    println!();
    println!("{}", style("═".repeat(50)).dim());
    println!("{}", style("Run Summary:").bold());
    println!("  Succeeded: {}", style(summary.succeeded).green());
    println!("  Skipped:   {} (already on disk)", summary.skipped);
    println!(
        "  Failed:    {}",
        if summary.failed_indices.is_empty() {
            style(0.to_string()).green()
        } else {
            style(summary.failed_indices.len().to_string()).red()
        }
    );

    if !summary.failed_indices.is_empty() {
        let indices: Vec<String> = summary
            .failed_indices
            .iter()
            .map(|index| index.to_string())
            .collect();
        println!("  Failed indices: {}", indices.join(", "));
    }

    if let Some(reason) = &summary.halted {
        println!("  Halted:    {}", style(reason).red());
    }
    println!("{}", style("═".repeat(50)).dim());
}
