//! Background Tasks Module
//!
//! Contains background tasks for long-running janitor processes.
//!
//! # Tasks
//! - Purge: Reclaims expired cache entries at a configured interval

mod purge;

pub use purge::spawn_purge_task;
