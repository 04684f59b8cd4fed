//! # ebb-core
//! Foundation types, errors, and epoch/window arithmetic for the Ebb
//! expiring balance engine.

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
pub mod window;

pub use window::{EpochClock, WindowConfig};
