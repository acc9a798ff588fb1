//! `ldb refine` — compute and print a new assignment.

use std::fmt::Write;
use std::path::Path;

use ldb_core::{LdbConfig, SnapshotFile};
use ldb_refiner::{Rebalance, Refiner};
use tracing::info;

pub fn run(config: &LdbConfig, snapshot: &Path, format: &str) -> anyhow::Result<()> {
    let file = SnapshotFile::from_file(snapshot)?;
    info!(path = %snapshot.display(), "snapshot loaded");

    let refiner = Refiner::new(config.refiner.clone());
    let result = refiner
        .rebalance(&file.snapshot, &file.prior, file.correction.as_ref())
        .unwrap_or_else(|err| super::abort(err));

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print!("{}", render_text(&result)),
        other => anyhow::bail!("unknown format: {other} (expected text or json)"),
    }
    Ok(())
}

pub fn render_text(result: &Rebalance) -> String {
    let summary = &result.summary;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{:>4}  {:>5}  {:>5}  {:>12}  {:>12}  {:>7}",
        "pe", "speed", "avail", "rate before", "rate after", "objects"
    );
    for (before, after) in summary.before.iter().zip(&summary.after) {
        let _ = writeln!(
            out,
            "{:>4}  {:>5}  {:>5}  {:>12.3}  {:>12.3}  {:>7}",
            after.processor,
            after.speed,
            if after.available { "yes" } else { "no" },
            before.rate,
            after.rate,
            after.objects,
        );
    }

    if !result.migrations.is_empty() {
        let _ = writeln!(out, "\nmigrations:");
        for m in &result.migrations {
            let _ = writeln!(out, "  {} ({}): {} -> {}", m.handle, m.object, m.from, m.to);
        }
    }

    let _ = writeln!(
        out,
        "\nmoved {} objects, max rate {:.3} -> {:.3}, overload {:.3} after {} trials{}",
        result.moves,
        summary.max_rate_before,
        summary.max_rate_after,
        summary.overload,
        summary.trials,
        if summary.converged { "" } else { " (did not converge)" },
    );
    out
}
