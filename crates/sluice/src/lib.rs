#![doc = include_str!("../README.md")]

mod barrier;
mod batch;
mod cancel;
mod config;
mod error;
mod job;
pub mod pool;
mod processor;
mod queue;
mod sink;
mod state;
mod stats;

pub use crate::batch::*;
pub use crate::cancel::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::job::*;
pub use crate::pool::WorkerPool;
pub use crate::processor::{Processor, WorkerContext};
pub use crate::sink::ResultStream;
pub use crate::state::PoolState;
pub use crate::stats::{PoolReport, StatsSnapshot};
