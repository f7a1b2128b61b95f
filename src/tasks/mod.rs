//! Background Tasks Module
//!
//! Contains background tasks owned by a cache for its whole lifetime.
//!
//! # Tasks
//! - TTL Sweep: Removes expired cache entries at configured intervals

mod sweep;

pub(crate) use sweep::{spawn_sweep_task, spawn_sweep_thread, SweepHandle, Sweepable};
