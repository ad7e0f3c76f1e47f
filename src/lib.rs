//! Progress and split tracking for athletes moving through an ordered
//! sequence of timed checkpoints. The engine validates completion pings,
//! derives splits between consecutive stations, and ranks the field from
//! the recorded facts; storage sits behind [`store::RecordStore`].

pub mod admin;
pub mod catalog;
pub mod clock;
pub mod engine;
pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod progress;
pub mod ranking;
pub mod splits;
pub mod store;

pub use engine::Engine;
pub use error::{EngineError, Result};
