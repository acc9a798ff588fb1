//! Boundary types exchanged with the surrounding load-balancing framework.
//!
//! A [`Snapshot`] is collected by the framework before every rebalancing
//! decision. The refiner reads it, never mutates it, and answers with a
//! new object-to-processor assignment.

use std::path::Path;

use serde::{Deserialize, Serialize};

fn default_speed() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

/// Measured statistics for one processor slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorStats {
    /// Wall time spent on work not attributable to any object.
    #[serde(default)]
    pub background_time: f64,
    /// Raw speed rating. Only ratios matter; the fastest processor in a
    /// snapshot is normalized to 100.
    #[serde(default = "default_speed")]
    pub speed: u32,
    /// Unavailable processors must be emptied before refinement.
    #[serde(default = "default_true")]
    pub available: bool,
}

impl ProcessorStats {
    /// An available processor with the given raw speed and no background load.
    pub fn new(speed: u32) -> Self {
        Self {
            background_time: 0.0,
            speed,
            available: true,
        }
    }

    pub fn with_background(mut self, background_time: f64) -> Self {
        self.background_time = background_time;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

/// Measured statistics for one migratable or pinned work unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStats {
    /// Opaque correlation id owned by the framework. Carried through, never
    /// interpreted.
    pub handle: String,
    /// Execution-time estimate.
    pub wall_time: f64,
    #[serde(default = "default_true")]
    pub migratable: bool,
}

impl ObjectStats {
    pub fn new(handle: impl Into<String>, wall_time: f64) -> Self {
        Self {
            handle: handle.into(),
            wall_time,
            migratable: true,
        }
    }

    /// Mark the object as non-migratable.
    pub fn pinned(mut self) -> Self {
        self.migratable = false;
        self
    }
}

/// Per-invocation statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub processors: Vec<ProcessorStats>,
    pub objects: Vec<ObjectStats>,
    /// Whether the snapshot covers the whole machine. Prior indices outside
    /// the processor range are fatal on a complete snapshot and remapped on
    /// a partial one.
    #[serde(default = "default_true")]
    pub complete: bool,
}

impl Snapshot {
    pub fn new(processors: Vec<ProcessorStats>, objects: Vec<ObjectStats>) -> Self {
        Self {
            processors,
            objects,
            complete: true,
        }
    }

    pub fn partial(mut self) -> Self {
        self.complete = false;
        self
    }

    pub fn num_processors(&self) -> usize {
        self.processors.len()
    }

    pub fn num_objects(&self) -> usize {
        self.objects.len()
    }
}

/// Framework-measured corrections applied to background load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadCorrection {
    /// Total measured time of the balancing period.
    pub lb_time: f64,
    /// Idle time per processor, indexed like `Snapshot::processors`.
    pub idle_time: Vec<f64>,
}

/// On-disk input accepted by the `ldb` driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub snapshot: Snapshot,
    /// Raw prior processor index per object, as reported by the framework.
    /// May lie outside the processor range.
    pub prior: Vec<i64>,
    #[serde(default)]
    pub correction: Option<LoadCorrection>,
}

impl SnapshotFile {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: SnapshotFile = serde_json::from_str(&content)?;
        Ok(file)
    }
}
