//! Probing: per-site probe loops and their lifecycle.

pub mod prober;
pub mod result;
pub mod scheduler;

pub use prober::Prober;
pub use result::ProbeResult;
pub use scheduler::Scheduler;
