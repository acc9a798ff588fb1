//! Processor/object model of one rebalancing invocation.
//!
//! The model is built fresh from a [`Snapshot`] on every call and dropped
//! when the call returns. Processors own their membership sets; objects only
//! record the index of the processor they sit on.
//!
//! Loads are kept in speed-weighted units: an object of cost `c` contributes
//! `c * speed` to the processor holding it, and background load contributes
//! `background * speed`. Dividing by speed gives the processor *rate*, the
//! quantity compared across heterogeneous processors.

use ldb_core::{LoadCorrection, Snapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::error::{RefineError, RefineResult};
use crate::member_set::{Cursor, MemberSet};
use crate::report::ProcessorLoad;

/// Normalized speed of the fastest processor in a snapshot.
pub const FULL_SPEED: u32 = 100;

#[derive(Debug, Clone)]
pub struct ProcessorRecord {
    pub id: usize,
    /// Normalized speed in `1..=FULL_SPEED`.
    pub speed: u32,
    pub background_load: f64,
    pub available: bool,
    assigned_load: f64,
    total_load: f64,
    members: MemberSet,
}

impl ProcessorRecord {
    fn new(id: usize, speed: u32, background_load: f64, available: bool) -> Self {
        let mut record = Self {
            id,
            speed,
            background_load,
            available,
            assigned_load: 0.0,
            total_load: 0.0,
            members: MemberSet::new(),
        };
        record.update_total();
        record
    }

    fn update_total(&mut self) {
        self.total_load = self.assigned_load + self.background_load * self.speed_f64();
    }

    fn speed_f64(&self) -> f64 {
        f64::from(self.speed)
    }

    /// Sum of `cost * speed` over the objects currently on this processor.
    pub fn assigned_load(&self) -> f64 {
        self.assigned_load
    }

    pub fn total_load(&self) -> f64 {
        self.total_load
    }

    pub fn rate(&self) -> f64 {
        self.total_load / self.speed_f64()
    }

    pub fn members(&self) -> &MemberSet {
        &self.members
    }
}

#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub id: usize,
    pub handle: String,
    pub cost: f64,
    pub migratable: bool,
    /// Validated prior processor. Differs from the raw input only when an
    /// out-of-range index was remapped.
    pub prior: usize,
    current: Option<usize>,
}

impl ObjectRecord {
    /// `None` only while the object is between a deassign and an assign.
    pub fn current_processor(&self) -> Option<usize> {
        self.current
    }
}

#[derive(Debug, Clone)]
pub struct Model {
    processors: Vec<ProcessorRecord>,
    objects: Vec<ObjectRecord>,
    first_available: usize,
    available_count: usize,
    available_speed: u64,
    average_load: f64,
    total_instantaneous: f64,
}

impl Model {
    /// Build the model and place every object on its validated prior
    /// processor.
    ///
    /// `prior` holds the raw processor index reported for each object. On a
    /// complete snapshot an index outside `0..P` is fatal; on a partial one
    /// it is remapped to a processor drawn from a generator seeded with
    /// `remap_seed`.
    pub fn build(
        snapshot: &Snapshot,
        prior: &[i64],
        correction: Option<&LoadCorrection>,
        remap_seed: u64,
    ) -> RefineResult<Self> {
        let num_procs = snapshot.num_processors();
        if num_procs == 0 {
            return Err(RefineError::EmptySnapshot);
        }
        if prior.len() != snapshot.num_objects() {
            return Err(RefineError::ShapeMismatch {
                what: "prior assignment",
                expected: snapshot.num_objects(),
                actual: prior.len(),
            });
        }
        if let Some(c) = correction.filter(|c| c.idle_time.len() != num_procs) {
            return Err(RefineError::ShapeMismatch {
                what: "idle time",
                expected: num_procs,
                actual: c.idle_time.len(),
            });
        }

        let speeds = normalize_speeds(snapshot)?;

        let first_available = snapshot
            .processors
            .iter()
            .position(|p| p.available)
            .ok_or(RefineError::NoAvailableProcessor)?;

        let priors = validate_priors(snapshot, prior, remap_seed)?;

        let backgrounds: Vec<f64> = match correction {
            Some(c) => {
                let mut object_time = vec![0.0; num_procs];
                for (object, &p) in snapshot.objects.iter().zip(&priors) {
                    object_time[p] += object.wall_time;
                }
                (0..num_procs)
                    .map(|p| c.lb_time - object_time[p] - c.idle_time[p])
                    .collect()
            }
            None => snapshot.processors.iter().map(|p| p.background_time).collect(),
        };

        let processors: Vec<ProcessorRecord> = snapshot
            .processors
            .iter()
            .zip(speeds)
            .zip(backgrounds)
            .enumerate()
            .map(|(id, ((stats, speed), background))| {
                let background = if background < 0.0 {
                    warn!(processor = id, background, "negative background load clamped to zero");
                    0.0
                } else {
                    background
                };
                ProcessorRecord::new(id, speed, background, stats.available)
            })
            .collect();

        let objects: Vec<ObjectRecord> = snapshot
            .objects
            .iter()
            .zip(&priors)
            .enumerate()
            .map(|(id, (stats, &p))| ObjectRecord {
                id,
                handle: stats.handle.clone(),
                cost: stats.wall_time,
                migratable: stats.migratable,
                prior: p,
                current: None,
            })
            .collect();

        let available_count = processors.iter().filter(|p| p.available).count();
        let available_speed = processors
            .iter()
            .filter(|p| p.available)
            .map(|p| u64::from(p.speed))
            .sum();

        let mut model = Self {
            processors,
            objects,
            first_available,
            available_count,
            available_speed,
            average_load: 0.0,
            total_instantaneous: 0.0,
        };

        for (object, &p) in priors.iter().enumerate() {
            model.assign(object, p);
        }
        model.compute_average();

        debug!(
            processors = num_procs,
            available = available_count,
            objects = model.objects.len(),
            average_load = model.average_load,
            total = model.total_instantaneous,
            "model built"
        );

        Ok(model)
    }

    /// Place an unassigned object on `processor`.
    pub fn assign(&mut self, object: usize, processor: usize) {
        let obj = &mut self.objects[object];
        debug_assert!(obj.current.is_none(), "object {object} assigned twice");
        obj.current = Some(processor);
        let cost = obj.cost;

        let record = &mut self.processors[processor];
        record.members.insert(object);
        record.assigned_load += cost * record.speed_f64();
        record.update_total();
    }

    /// Take `object` off `processor`, leaving it unassigned.
    pub fn deassign(&mut self, object: usize, processor: usize) {
        let obj = &mut self.objects[object];
        debug_assert_eq!(obj.current, Some(processor), "object {object} not on {processor}");
        obj.current = None;
        let cost = obj.cost;

        let record = &mut self.processors[processor];
        record.members.remove(object);
        record.assigned_load -= cost * record.speed_f64();
        record.update_total();
    }

    /// Move an object to `to`, deassigning it from wherever it is first.
    pub fn move_object(&mut self, object: usize, to: usize) {
        if let Some(from) = self.objects[object].current {
            if from == to {
                return;
            }
            self.deassign(object, from);
        }
        self.assign(object, to);
    }

    /// Move every object off unavailable processors onto the lowest-indexed
    /// available one, migratable or not. Returns the number of objects moved.
    pub fn evacuate(&mut self) -> usize {
        if self.available_count == self.processors.len() {
            return 0;
        }
        let target = self.first_available;
        let mut moved = 0;

        for p in 0..self.processors.len() {
            if self.processors[p].available {
                continue;
            }
            let mut cursor = Cursor::default();
            while let Some(object) = self.processors[p].members.next(&mut cursor) {
                self.deassign(object, p);
                self.assign(object, target);
                moved += 1;
            }
        }

        if moved > 0 {
            debug!(moved, target, "evacuated unavailable processors");
        }
        moved
    }

    fn compute_average(&mut self) {
        let object_total: f64 = self
            .objects
            .iter()
            .map(|o| o.cost * self.processors[o.prior].speed_f64())
            .sum();
        let background_total: f64 = self
            .processors
            .iter()
            .filter(|p| p.available)
            .map(|p| p.background_load * p.speed_f64())
            .sum();

        self.total_instantaneous = object_total + background_total;
        self.average_load = self.total_instantaneous / self.available_count as f64;
    }

    /// Share of the total instantaneous load that `processor` would carry if
    /// load were spread in proportion to available speed.
    pub fn fair_share(&self, processor: usize) -> f64 {
        self.total_instantaneous * self.processors[processor].speed_f64()
            / self.available_speed as f64
    }

    /// Load ceiling of `processor` under the given overload factor.
    pub fn threshold(&self, processor: usize, overload: f64) -> f64 {
        overload * self.fair_share(processor)
    }

    /// Available and above its ceiling, or unavailable and still holding
    /// objects.
    pub fn is_heavy(&self, processor: usize, overload: f64) -> bool {
        let p = &self.processors[processor];
        if p.available {
            p.total_load > self.threshold(processor, overload)
        } else {
            !p.members.is_empty()
        }
    }

    pub fn is_light(&self, processor: usize, overload: f64) -> bool {
        let p = &self.processors[processor];
        p.available && p.total_load < self.threshold(processor, overload)
    }

    /// Available processor with the highest rate, lowest index on ties.
    pub fn max_rate(&self) -> Option<(usize, f64)> {
        self.processors
            .iter()
            .filter(|p| p.available)
            .fold(None, |best: Option<(usize, f64)>, p| match best {
                Some((_, rate)) if rate >= p.rate() => best,
                _ => Some((p.id, p.rate())),
            })
    }

    /// Cost of an object weighted by the speed of its prior processor. This
    /// is the size a move candidate is ranked by.
    pub fn weighted_cost(&self, object: usize) -> f64 {
        let o = &self.objects[object];
        o.cost * self.processors[o.prior].speed_f64()
    }

    /// Current processor of every object, by object position.
    pub fn assignment(&self) -> Vec<usize> {
        self.objects
            .iter()
            .map(|o| {
                debug_assert!(o.current.is_some(), "object {} unplaced", o.id);
                o.current.unwrap_or(o.prior)
            })
            .collect()
    }

    /// Move objects so that `assignment()` equals `target`.
    pub fn restore(&mut self, target: &[usize]) {
        for (object, &p) in target.iter().enumerate() {
            if self.objects[object].current != Some(p) {
                self.move_object(object, p);
            }
        }
    }

    pub fn loads(&self) -> Vec<ProcessorLoad> {
        self.processors
            .iter()
            .map(|p| ProcessorLoad {
                processor: p.id,
                speed: p.speed,
                available: p.available,
                background: p.background_load,
                load: p.total_load,
                rate: p.rate(),
                objects: p.members.len(),
            })
            .collect()
    }

    pub fn processors(&self) -> &[ProcessorRecord] {
        &self.processors
    }

    pub fn processor(&self, processor: usize) -> &ProcessorRecord {
        &self.processors[processor]
    }

    pub fn objects(&self) -> &[ObjectRecord] {
        &self.objects
    }

    pub fn object(&self, object: usize) -> &ObjectRecord {
        &self.objects[object]
    }

    pub fn first_available(&self) -> usize {
        self.first_available
    }

    pub fn average_load(&self) -> f64 {
        self.average_load
    }

    pub fn total_instantaneous(&self) -> f64 {
        self.total_instantaneous
    }
}

/// Scale raw speeds so the fastest processor reads [`FULL_SPEED`].
fn normalize_speeds(snapshot: &Snapshot) -> RefineResult<Vec<u32>> {
    if let Some(processor) = snapshot.processors.iter().position(|p| p.speed == 0) {
        return Err(RefineError::ZeroSpeed { processor });
    }
    let max = snapshot
        .processors
        .iter()
        .map(|p| u64::from(p.speed))
        .max()
        .unwrap_or(u64::from(FULL_SPEED));

    Ok(snapshot
        .processors
        .iter()
        .enumerate()
        .map(|(id, p)| {
            // Integer scaling; a processor over 100x slower than the fastest
            // still keeps speed 1.
            let speed = (u64::from(p.speed) * u64::from(FULL_SPEED) / max).max(1) as u32;
            debug!(processor = id, raw = p.speed, speed, "normalized processor speed");
            speed
        })
        .collect())
}

fn validate_priors(snapshot: &Snapshot, prior: &[i64], seed: u64) -> RefineResult<Vec<usize>> {
    let num_procs = snapshot.num_processors();
    let mut rng = StdRng::seed_from_u64(seed);

    prior
        .iter()
        .enumerate()
        .map(|(object, &raw)| match usize::try_from(raw) {
            Ok(p) if p < num_procs => Ok(p),
            _ if snapshot.complete => Err(RefineError::InvalidAssignmentIndex {
                object,
                processor: raw,
                processors: num_procs,
            }),
            _ => {
                let p = rng.gen_range(0..num_procs);
                warn!(object, raw, remapped = p, "prior processor outside snapshot, remapped");
                Ok(p)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldb_core::{ObjectStats, ProcessorStats};

    fn objects(costs: &[f64]) -> Vec<ObjectStats> {
        costs
            .iter()
            .enumerate()
            .map(|(i, &c)| ObjectStats::new(format!("obj-{i}"), c))
            .collect()
    }

    fn assert_conserved(model: &Model) {
        for p in model.processors() {
            let expected: f64 = p
                .members()
                .iter()
                .map(|o| model.object(o).cost * f64::from(p.speed))
                .sum();
            assert!(
                (p.assigned_load() - expected).abs() < 1e-9,
                "processor {} assigned load {} != {}",
                p.id,
                p.assigned_load(),
                expected
            );
        }
        for o in model.objects() {
            let holders = model
                .processors()
                .iter()
                .filter(|p| p.members().contains(o.id))
                .count();
            assert_eq!(holders, 1, "object {} held by {holders} processors", o.id);
        }
    }

    #[test]
    fn speeds_normalized_to_fastest() {
        let snapshot = Snapshot::new(
            vec![
                ProcessorStats::new(2000),
                ProcessorStats::new(1000),
                ProcessorStats::new(10),
            ],
            vec![],
        );
        let model = Model::build(&snapshot, &[], None, 0).unwrap();

        let speeds: Vec<u32> = model.processors().iter().map(|p| p.speed).collect();
        assert_eq!(speeds, vec![100, 50, 1]);
    }

    #[test]
    fn zero_speed_is_rejected() {
        let snapshot = Snapshot::new(vec![ProcessorStats::new(100), ProcessorStats::new(0)], vec![]);
        let err = Model::build(&snapshot, &[], None, 0).unwrap_err();
        assert_eq!(err, RefineError::ZeroSpeed { processor: 1 });
    }

    #[test]
    fn empty_snapshot_is_rejected() {
        let snapshot = Snapshot::new(vec![], vec![]);
        assert_eq!(
            Model::build(&snapshot, &[], None, 0).unwrap_err(),
            RefineError::EmptySnapshot
        );
    }

    #[test]
    fn no_available_processor_is_fatal() {
        let snapshot = Snapshot::new(
            vec![ProcessorStats::new(100).unavailable(), ProcessorStats::new(100).unavailable()],
            objects(&[1.0]),
        );
        assert_eq!(
            Model::build(&snapshot, &[0], None, 0).unwrap_err(),
            RefineError::NoAvailableProcessor
        );
    }

    #[test]
    fn prior_length_must_match() {
        let snapshot = Snapshot::new(vec![ProcessorStats::new(100)], objects(&[1.0, 2.0]));
        let err = Model::build(&snapshot, &[0], None, 0).unwrap_err();
        assert_eq!(
            err,
            RefineError::ShapeMismatch {
                what: "prior assignment",
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn out_of_range_prior_fatal_on_complete_snapshot() {
        let snapshot = Snapshot::new(vec![ProcessorStats::new(100)], objects(&[1.0, 1.0]));
        let err = Model::build(&snapshot, &[0, 3], None, 0).unwrap_err();
        assert_eq!(
            err,
            RefineError::InvalidAssignmentIndex {
                object: 1,
                processor: 3,
                processors: 1
            }
        );

        let err = Model::build(&snapshot, &[-1, 0], None, 0).unwrap_err();
        assert!(matches!(err, RefineError::InvalidAssignmentIndex { object: 0, .. }));
    }

    #[test]
    fn out_of_range_prior_remapped_on_partial_snapshot() {
        let snapshot = Snapshot::new(
            vec![ProcessorStats::new(100), ProcessorStats::new(100), ProcessorStats::new(100)],
            objects(&[1.0, 1.0, 1.0]),
        )
        .partial();

        let a = Model::build(&snapshot, &[0, 17, -4], None, 9).unwrap();
        let b = Model::build(&snapshot, &[0, 17, -4], None, 9).unwrap();

        assert_eq!(a.object(0).prior, 0);
        assert!(a.object(1).prior < 3);
        assert!(a.object(2).prior < 3);
        assert_eq!(a.assignment(), b.assignment(), "same seed must remap identically");
        assert_conserved(&a);
    }

    #[test]
    fn initial_placement_tracks_loads() {
        let snapshot = Snapshot::new(
            vec![
                ProcessorStats::new(100).with_background(1.0),
                ProcessorStats::new(50).with_background(2.0),
            ],
            objects(&[1.0, 2.0, 3.0]),
        );
        let model = Model::build(&snapshot, &[0, 1, 1], None, 0).unwrap();

        let p0 = model.processor(0);
        assert_eq!(p0.assigned_load(), 100.0);
        assert_eq!(p0.total_load(), 200.0);
        assert_eq!(p0.rate(), 2.0);

        let p1 = model.processor(1);
        assert_eq!(p1.speed, 50);
        assert_eq!(p1.assigned_load(), 250.0);
        assert_eq!(p1.total_load(), 350.0);
        assert_eq!(p1.rate(), 7.0);

        // (1*100 + 2*50 + 3*50) + (1*100 + 2*50) = 550 over 2 processors.
        assert_eq!(model.total_instantaneous(), 550.0);
        assert_eq!(model.average_load(), 275.0);
        assert_conserved(&model);
    }

    #[test]
    fn correction_replaces_background() {
        let snapshot = Snapshot::new(
            vec![
                ProcessorStats::new(100).with_background(50.0),
                ProcessorStats::new(100).with_background(50.0),
            ],
            objects(&[2.0, 3.0]),
        );
        let correction = LoadCorrection {
            lb_time: 10.0,
            idle_time: vec![1.0, 9.5],
        };
        let model = Model::build(&snapshot, &[0, 1], Some(&correction), 0).unwrap();

        assert_eq!(model.processor(0).background_load, 7.0);
        // 10 - 3 - 9.5 < 0 is clamped.
        assert_eq!(model.processor(1).background_load, 0.0);
    }

    #[test]
    fn correction_idle_length_must_match() {
        let snapshot = Snapshot::new(vec![ProcessorStats::new(100)], vec![]);
        let correction = LoadCorrection {
            lb_time: 1.0,
            idle_time: vec![],
        };
        let err = Model::build(&snapshot, &[], Some(&correction), 0).unwrap_err();
        assert!(matches!(err, RefineError::ShapeMismatch { what: "idle time", .. }));
    }

    #[test]
    fn unavailable_background_excluded_from_average() {
        let snapshot = Snapshot::new(
            vec![
                ProcessorStats::new(100).with_background(4.0),
                ProcessorStats::new(100).with_background(100.0).unavailable(),
            ],
            vec![],
        );
        let model = Model::build(&snapshot, &[], None, 0).unwrap();
        assert_eq!(model.total_instantaneous(), 400.0);
        assert_eq!(model.average_load(), 400.0);
        assert_eq!(model.fair_share(0), 400.0);
    }

    #[test]
    fn move_object_keeps_sums_consistent() {
        let snapshot = Snapshot::new(
            vec![ProcessorStats::new(100), ProcessorStats::new(25)],
            objects(&[1.5, 2.5]),
        );
        let mut model = Model::build(&snapshot, &[0, 0], None, 0).unwrap();

        model.move_object(1, 1);
        assert_eq!(model.object(1).current_processor(), Some(1));
        assert_eq!(model.processor(0).assigned_load(), 150.0);
        assert_eq!(model.processor(1).assigned_load(), 62.5);
        assert_conserved(&model);

        model.move_object(1, 1);
        assert_eq!(model.processor(1).members().len(), 1);

        model.move_object(1, 0);
        assert_eq!(model.processor(1).assigned_load(), 0.0);
        assert_conserved(&model);
    }

    #[test]
    fn evacuation_moves_everything_to_first_available() {
        let snapshot = Snapshot::new(
            vec![
                ProcessorStats::new(100).unavailable(),
                ProcessorStats::new(100),
                ProcessorStats::new(100).unavailable(),
                ProcessorStats::new(100),
            ],
            vec![
                ObjectStats::new("a", 1.0),
                ObjectStats::new("b", 1.0).pinned(),
                ObjectStats::new("c", 1.0),
                ObjectStats::new("d", 1.0),
            ],
        );
        let mut model = Model::build(&snapshot, &[0, 0, 2, 3], None, 0).unwrap();
        assert_eq!(model.first_available(), 1);

        assert_eq!(model.evacuate(), 3);
        assert!(model.processor(0).members().is_empty());
        assert!(model.processor(2).members().is_empty());
        assert_eq!(model.assignment(), vec![1, 1, 1, 3]);
        assert_conserved(&model);

        assert_eq!(model.evacuate(), 0, "second evacuation must be a no-op");
        assert_eq!(model.assignment(), vec![1, 1, 1, 3]);
    }

    #[test]
    fn heavy_and_light_relative_to_fair_share() {
        let snapshot = Snapshot::new(
            vec![ProcessorStats::new(100), ProcessorStats::new(100)],
            objects(&[3.0, 1.0]),
        );
        let model = Model::build(&snapshot, &[0, 1], None, 0).unwrap();
        // Fair share is 200 each; loads are 300 and 100.
        assert!(model.is_heavy(0, 1.001));
        assert!(!model.is_light(0, 1.001));
        assert!(model.is_light(1, 1.001));
        assert!(!model.is_heavy(0, 1.6));
        assert_eq!(model.max_rate(), Some((0, 3.0)));
    }

    #[test]
    fn unavailable_with_members_is_heavy() {
        let snapshot = Snapshot::new(
            vec![ProcessorStats::new(100), ProcessorStats::new(100).unavailable()],
            objects(&[1.0]),
        );
        let model = Model::build(&snapshot, &[1], None, 0).unwrap();
        assert!(model.is_heavy(1, 100.0));
        assert!(!model.is_light(1, 100.0));
    }

    #[test]
    fn restore_returns_to_recorded_assignment() {
        let snapshot = Snapshot::new(
            vec![ProcessorStats::new(100), ProcessorStats::new(100), ProcessorStats::new(100)],
            objects(&[1.0, 2.0, 3.0]),
        );
        let mut model = Model::build(&snapshot, &[0, 1, 2], None, 0).unwrap();
        let recorded = model.assignment();

        model.move_object(0, 2);
        model.move_object(2, 1);
        model.restore(&recorded);

        assert_eq!(model.assignment(), recorded);
        assert_conserved(&model);
    }
}
