//! Entry point — one rebalancing decision per call.

use ldb_core::{LoadCorrection, RefinerConfig, Snapshot};
use tracing::info;

use crate::error::RefineResult;
use crate::model::Model;
use crate::report::{LoadSummary, Migration, Rebalance};
use crate::search::multi_refine;

/// Greedy refinement rebalancer.
///
/// Holds configuration only; every call builds and drops its own model, so
/// a `Refiner` may be reused across decision points.
#[derive(Debug, Clone, Default)]
pub struct Refiner {
    config: RefinerConfig,
}

impl Refiner {
    pub fn new(config: RefinerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RefinerConfig {
        &self.config
    }

    /// Build the model, place objects on their prior processors and empty
    /// unavailable processors. Returns the model and the number of
    /// evacuated objects.
    pub fn prepare(
        &self,
        snapshot: &Snapshot,
        prior: &[i64],
        correction: Option<&LoadCorrection>,
    ) -> RefineResult<(Model, usize)> {
        let mut model = Model::build(snapshot, prior, correction, self.config.remap_seed)?;
        let evacuated = model.evacuate();
        Ok((model, evacuated))
    }

    /// Compute a new assignment for every object in `snapshot`.
    ///
    /// `prior[i]` is the raw processor index object `i` currently runs on.
    /// Errors are the fatal conditions of a rebalancing decision; nothing
    /// is partially applied when one is returned.
    pub fn rebalance(
        &self,
        snapshot: &Snapshot,
        prior: &[i64],
        correction: Option<&LoadCorrection>,
    ) -> RefineResult<Rebalance> {
        let (mut model, evacuated) = self.prepare(snapshot, prior, correction)?;

        let before = model.loads();
        let max_rate_before = model.max_rate().map_or(0.0, |(_, rate)| rate);

        let search = multi_refine(&mut model, &self.config);

        let after = model.loads();
        let max_rate_after = model.max_rate().map_or(0.0, |(_, rate)| rate);

        let assignment = model.assignment();
        let migrations: Vec<Migration> = assignment
            .iter()
            .zip(prior)
            .enumerate()
            .filter(|&(_, (&to, &from))| i64::try_from(to).ok() != Some(from))
            .map(|(object, (&to, &from))| Migration {
                object,
                handle: model.object(object).handle.clone(),
                from,
                to,
            })
            .collect();

        info!(
            processors = snapshot.num_processors(),
            objects = snapshot.num_objects(),
            average_load = model.average_load(),
            max_rate_before,
            max_rate_after,
            overload = search.overload,
            trials = search.trials,
            moves = migrations.len(),
            "refiner finished"
        );

        Ok(Rebalance {
            assignment,
            moves: migrations.len(),
            migrations,
            summary: LoadSummary {
                before,
                after,
                average_load: model.average_load(),
                max_rate_before,
                max_rate_after,
                evacuated,
                overload: search.overload,
                trials: search.trials,
                converged: search.converged,
            },
        })
    }
}
