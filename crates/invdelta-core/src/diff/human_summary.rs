//! Human-readable run report.

use crate::model::SnapshotSummary;

/// Render a plain-text table of per-family counts for one run.
///
/// Informational only; the structured summaries remain the source of truth.
pub fn render_human_summary(summaries: &[SnapshotSummary]) -> String {
    let mut out = String::new();

    let snapshot = summaries
        .first()
        .map(|s| s.snapshot_id.as_str())
        .unwrap_or("-");
    out.push_str(&format!("## Indexing Summary ({snapshot})\n\n"));

    if summaries.is_empty() {
        out.push_str("_No families indexed._\n");
        return out;
    }

    out.push_str(&format!(
        "{:<14} {:>8} {:>6} {:>9} {:>10} {:>8} {:>9} {:>7} {:>7}  {}\n",
        "FAMILY", "TOTAL", "NEW", "MODIFIED", "UNCHANGED", "DELETED", "RESTORED", "WRITES",
        "FAILED", "STATUS"
    ));

    let mut total_entities = 0u64;
    let mut total_writes = 0u64;
    for s in summaries {
        let status = if !s.success {
            "FAILED"
        } else if s.is_degraded() {
            "DEGRADED"
        } else {
            "OK"
        };
        out.push_str(&format!(
            "{:<14} {:>8} {:>6} {:>9} {:>10} {:>8} {:>9} {:>7} {:>7}  {}\n",
            s.entity_type,
            s.total_entities,
            s.new_count,
            s.modified_count,
            s.unchanged_count,
            s.deleted_count,
            s.restored_count,
            s.write_count,
            s.failed_write_count,
            status
        ));
        if let Some(err) = &s.error {
            out.push_str(&format!("  error: {err}\n"));
        }
        if s.success {
            total_entities += s.total_entities;
            total_writes += s.write_count;
        }
    }

    let reduction = if total_entities == 0 {
        0.0
    } else {
        total_entities.saturating_sub(total_writes) as f64 * 100.0 / total_entities as f64
    };

    out.push('\n');
    out.push_str(&format!("TOTAL WRITES: {total_writes} of {total_entities} entities\n"));
    out.push_str(&format!("WRITE REDUCTION: {reduction:.1}%\n"));
    if summaries.iter().any(|s| !s.delta_detection_enabled) {
        out.push_str("_Delta detection disabled for at least one family (full refresh)._\n");
    }
    out
}
