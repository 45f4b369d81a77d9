//! Background Tasks Module
//!
//! # Tasks
//! - Expiry sweep: removes expired cache entries at a fixed interval

mod sweep;

pub use sweep::{spawn_sweep_task, sweep_caches, SweepTarget};
