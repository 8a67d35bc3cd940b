//! Result rows and the end-of-run summary.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use bsp_kmeans::{RunSummary, Vector};

/// Writes one `identity<TAB>coords` line per point.
pub fn write_rows<W: Write>(mut w: W, rows: &[(String, Vector)]) -> Result<()> {
    for (identity, point) in rows {
        writeln!(w, "{}\t{}", identity, point)?;
    }
    w.flush()?;
    Ok(())
}

/// Human-readable summary: the verdict, then one line per cluster from the
/// last broadcast table.
pub fn render(summary: &RunSummary) -> String {
    let mut out = String::new();
    if summary.converged {
        let _ = writeln!(out, "Clusters converged in round {}", summary.rounds);
    } else {
        let _ = writeln!(
            out,
            "Clusters did not converge, reached the maximum number of iterations ({})",
            summary.rounds
        );
    }
    // Populations are broadcast counts. A cluster reseeded in the final round
    // shows size=1 but its worker holds no rows.
    let _ = writeln!(out, "Clusters as of the last broadcast round:");
    for cluster in &summary.clusters {
        let _ = writeln!(out, "  {}", cluster);
    }
    out
}

pub fn render_json(summary: &RunSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}
