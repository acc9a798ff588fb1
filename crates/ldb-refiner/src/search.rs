//! Overload search — bisection over the acceptable overload factor.
//!
//! The tightest factor that still lets a refinement pass converge gives the
//! best balance without forcing moves that cannot pay off. Factors are
//! tested on an integer grid, `factor(step) = step * overload_step +
//! overload_start`, between "no slack" (step 0) and the currently observed
//! overload ratio.
//!
//! Each trial runs on the state left by the previous one. Moves made by a
//! failed trial stay in place for the next trial; only when the final trial
//! fails is the assignment recorded after the last converging trial put
//! back.

use ldb_core::RefinerConfig;
use tracing::{debug, error};

use crate::model::Model;
use crate::refine::refine;

/// Outcome of the whole search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchReport {
    /// Factor of the last converging trial, or of the widest trial when
    /// none converged.
    pub overload: f64,
    /// `false` when even the widest factor failed.
    pub converged: bool,
    pub trials: usize,
    /// Moves made across all trials, restored ones included.
    pub moves: usize,
}

struct Trials<'a> {
    model: &'a mut Model,
    config: &'a RefinerConfig,
    count: usize,
    moves: usize,
}

impl Trials<'_> {
    fn run(&mut self, step: i64) -> bool {
        let overload = self.config.factor(step);
        let pass = refine(self.model, overload);
        self.count += 1;
        self.moves += pass.moves;
        debug!(step, overload, converged = pass.converged, moves = pass.moves, "overload trial");
        pass.converged
    }
}

/// Observed overload of the processor with the highest rate, relative to
/// its fair share.
fn current_overload(model: &Model, config: &RefinerConfig) -> f64 {
    let Some((max_pe, _)) = model.max_rate() else {
        return config.overload_start;
    };
    let share = model.fair_share(max_pe);
    if share > 0.0 {
        model.processor(max_pe).total_load() / share
    } else {
        config.overload_start
    }
}

pub fn multi_refine(model: &mut Model, config: &RefinerConfig) -> SearchReport {
    let observed = current_overload(model, config);

    let mut min_step: i64 = 0;
    let mut max_step =
        (((observed - config.overload_start) / config.overload_step + 1.0) as i64).max(min_step);
    debug!(
        observed,
        min = config.factor(min_step),
        max = config.factor(max_step),
        "overload search range"
    );

    let mut trials = Trials {
        model,
        config,
        count: 0,
        moves: 0,
    };

    if trials.run(min_step) {
        return SearchReport {
            overload: config.factor(min_step),
            converged: true,
            trials: trials.count,
            moves: trials.moves,
        };
    }

    if !trials.run(max_step) {
        error!(
            overload = config.factor(max_step),
            "could not refine at max overload"
        );
        return SearchReport {
            overload: config.factor(max_step),
            converged: false,
            trials: trials.count,
            moves: trials.moves,
        };
    }

    let mut best = trials.model.assignment();
    let mut last_converged = true;
    while max_step - min_step > 1 {
        let step = (max_step + min_step) / 2;
        debug!(step, min_step, max_step, "bisecting overload");
        if trials.run(step) {
            max_step = step;
            best = trials.model.assignment();
            last_converged = true;
        } else {
            min_step = step;
            last_converged = false;
        }
    }

    if !last_converged {
        trials.model.restore(&best);
    }

    SearchReport {
        overload: config.factor(max_step),
        converged: true,
        trials: trials.count,
        moves: trials.moves,
    }
}
