//! Data models for the alert engine

mod alert;
mod wire;

pub use alert::*;
pub use wire::*;
