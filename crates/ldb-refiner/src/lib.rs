//! ldb-refiner — greedy refinement rebalancer for a parallel-object runtime.
//!
//! Given per-processor background load, per-object cost, heterogeneous
//! processor speeds and availability, the refiner computes a new
//! object-to-processor assignment that lowers the maximum speed-normalized
//! processor load while moving as few objects as it can.
//!
//! It does not decide when to rebalance and does not migrate anything
//! itself; the caller applies the returned assignment.
//!
//! # Components
//!
//! - **`heap`** / **`member_set`** — priority and membership structures
//! - **`model`** — processor/object records, model builder, assignment
//!   operations, evacuation of unavailable processors
//! - **`refine`** — one greedy pass at a fixed overload factor
//! - **`search`** — bisection over the overload factor
//! - **`refiner`** — the `Refiner` entry point
//!
//! ```text
//! Refiner::rebalance
//!   ├── Model::build     (normalize speeds, validate priors, place objects)
//!   ├── Model::evacuate  (empty unavailable processors)
//!   └── multi_refine
//!       └── refine × N   (heavy heap → best (object, light receiver) move)
//! ```

pub mod error;
pub mod heap;
pub mod member_set;
pub mod model;
pub mod refine;
pub mod refiner;
pub mod report;
pub mod search;

pub use error::{RefineError, RefineResult};
pub use model::{FULL_SPEED, Model, ObjectRecord, ProcessorRecord};
pub use refine::{PassReport, refine};
pub use refiner::Refiner;
pub use report::{LoadSummary, Migration, ProcessorLoad, Rebalance};
pub use search::{SearchReport, multi_refine};
