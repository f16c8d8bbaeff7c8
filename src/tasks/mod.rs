//! Background Tasks Module
//!
//! Contains the tasks the cache spawns on the tokio runtime.
//!
//! # Tasks
//! - Entry expiry: Removes a single entry once its TTL has elapsed

mod expiry;

pub use expiry::spawn_expiry_task;
