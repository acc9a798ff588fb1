//! One greedy refinement pass at a fixed overload factor.
//!
//! Heavy processors are drained most-loaded first. For each donor the pass
//! picks the largest migratable object that fits under some light
//! processor's ceiling and moves it there. The pass converges when no heavy
//! processor remains and fails as soon as a donor has nothing that fits.
//!
//! Every move takes load from a processor above its ceiling and gives it to
//! one that stays below, so the number of moves in a pass is bounded.

use tracing::debug;

use crate::heap::LoadHeap;
use crate::member_set::MemberSet;
use crate::model::Model;

/// Result of a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub converged: bool,
    pub moves: usize,
}

/// Best (object, receiver) pair found for one donor.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    object: usize,
    receiver: usize,
    weight: f64,
}

/// Run one refinement pass. Moves are applied to `model` as they are made
/// and are kept even when the pass fails.
pub fn refine(model: &mut Model, overload: f64) -> PassReport {
    let num_procs = model.processors().len();
    let mut heavy = LoadHeap::with_capacity(num_procs);
    let mut light = MemberSet::new();

    for p in 0..num_procs {
        if model.is_heavy(p, overload) {
            heavy.insert(p, model.processor(p).total_load());
        } else if model.is_light(p, overload) {
            light.insert(p);
        }
    }
    debug!(overload, heavy = heavy.len(), light = light.len(), "refine pass started");

    let mut moves = 0;
    while let Some(donor) = heavy.extract_max() {
        let Some(best) = best_move(model, donor, &light, overload) else {
            debug!(donor, overload, moves, "no object fits any light processor");
            return PassReport {
                converged: false,
                moves,
            };
        };

        model.deassign(best.object, donor);
        model.assign(best.object, best.receiver);
        moves += 1;
        debug!(
            object = best.object,
            from = donor,
            to = best.receiver,
            weight = best.weight,
            "moved object"
        );

        if !model.is_light(best.receiver, overload) {
            light.remove(best.receiver);
        }
        if model.is_heavy(donor, overload) {
            heavy.insert(donor, model.processor(donor).total_load());
        } else if model.is_light(donor, overload) {
            light.insert(donor);
        }
    }

    PassReport {
        converged: true,
        moves,
    }
}

/// Scan light processors and donor objects in ascending index order and
/// keep the strictly heaviest object that fits. Zero-cost objects never
/// qualify.
fn best_move(model: &Model, donor: usize, light: &MemberSet, overload: f64) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    let donor_objects = model.processor(donor).members();

    for receiver in light.iter() {
        let target = model.processor(receiver);
        let ceiling = model.threshold(receiver, overload);
        let speed = f64::from(target.speed);

        for object in donor_objects.iter() {
            let o = model.object(object);
            if !o.migratable {
                continue;
            }
            if target.total_load() + o.cost * speed >= ceiling {
                continue;
            }
            let weight = model.weighted_cost(object);
            if weight > best.map_or(0.0, |b| b.weight) {
                best = Some(Candidate {
                    object,
                    receiver,
                    weight,
                });
            }
        }
    }

    best
}
