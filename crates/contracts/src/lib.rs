//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace:
//! dispatcher configuration, workload description and the unified error type.
//! Business crates depend on this crate, never the other way around.
//!
//! ## Routing Model
//! - A single source stream is fanned out to `count` output channels
//! - Every message lands on exactly one output, picked by a strategy
//! - `channel_buffer_cap == 0` means unbuffered (rendezvous) outputs

mod blueprint;
mod error;
mod strategy;

pub use blueprint::*;
pub use error::*;
pub use strategy::*;
