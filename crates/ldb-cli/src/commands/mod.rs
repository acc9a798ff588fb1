pub mod inspect;
pub mod refine;

use ldb_refiner::RefineError;
use tracing::error;

/// Exit status used when the refiner rejects a snapshot.
const FATAL_EXIT: i32 = 2;

/// Terminate the process on an unrecoverable rebalancing error.
fn abort(err: RefineError) -> ! {
    error!(error = %err, "LB panic: rebalancing aborted");
    eprintln!("ldb: {err}");
    std::process::exit(FATAL_EXIT)
}
