//! Result types returned to the load-balancing framework.

use serde::{Deserialize, Serialize};

/// Load of one processor at a point in the invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorLoad {
    pub processor: usize,
    pub speed: u32,
    pub available: bool,
    pub background: f64,
    /// Speed-weighted total load.
    pub load: f64,
    pub rate: f64,
    pub objects: usize,
}

/// An object whose processor changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub object: usize,
    pub handle: String,
    /// Raw prior index as supplied by the caller.
    pub from: i64,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// After initial placement and evacuation.
    pub before: Vec<ProcessorLoad>,
    pub after: Vec<ProcessorLoad>,
    pub average_load: f64,
    pub max_rate_before: f64,
    pub max_rate_after: f64,
    /// Objects forced off unavailable processors.
    pub evacuated: usize,
    pub overload: f64,
    pub trials: usize,
    pub converged: bool,
}

/// New assignment produced by one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rebalance {
    /// New processor per object position.
    pub assignment: Vec<usize>,
    pub moves: usize,
    pub migrations: Vec<Migration>,
    pub summary: LoadSummary,
}
