//! `ldb inspect` — show the model the refiner starts from.

use std::path::Path;

use ldb_core::{LdbConfig, SnapshotFile};
use ldb_refiner::{Model, Refiner};

pub fn run(config: &LdbConfig, snapshot: &Path) -> anyhow::Result<()> {
    let file = SnapshotFile::from_file(snapshot)?;
    let refiner = Refiner::new(config.refiner.clone());
    let (model, evacuated) = refiner
        .prepare(&file.snapshot, &file.prior, file.correction.as_ref())
        .unwrap_or_else(|err| super::abort(err));

    print!("{}", render(&model, evacuated));
    Ok(())
}

fn render(model: &Model, evacuated: usize) -> String {
    let mut out = format!(
        "{:>4}  {:>5}  {:>5}  {:>10}  {:>10}  {:>10}  {:>7}\n",
        "pe", "speed", "avail", "background", "load", "share", "objects"
    );
    for p in model.processors() {
        out.push_str(&format!(
            "{:>4}  {:>5}  {:>5}  {:>10.3}  {:>10.3}  {:>10.3}  {:>7}\n",
            p.id,
            p.speed,
            if p.available { "yes" } else { "no" },
            p.background_load,
            p.total_load(),
            if p.available { model.fair_share(p.id) } else { 0.0 },
            p.members().len(),
        ));
    }

    let (max_pe, max_rate) = model.max_rate().unwrap_or((model.first_available(), 0.0));
    out.push_str(&format!(
        "\naverage load {:.3}, total {:.3}, max rate {:.3} on pe {}, evacuated {}\n",
        model.average_load(),
        model.total_instantaneous(),
        max_rate,
        max_pe,
        evacuated,
    ));
    out
}
