//! Worker set and pool supervisor.
//!
//! ## Structure
//!
//! - [`manager`] - [`WorkerPool`], the supervisor that owns the lifecycle.
//! - `worker` - the loop each worker task runs.

pub mod manager;
mod worker;


pub use manager::WorkerPool;
