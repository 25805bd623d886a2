mod delta;
mod task;

pub use delta::{compute_delta, DeltaOptions};
pub use task::yield_now;
