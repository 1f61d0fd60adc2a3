//! Unified pose.frame.v1 schema
//!
//! This module defines the provider-agnostic input schema for pose frames.
//! Frames arrive either one per line (streaming) or as a JSON array (batch
//! replay).

mod adapter;
mod frame_event;

pub use adapter::*;
pub use frame_event::*;
