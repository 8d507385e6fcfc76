//! Shared test utilities for narrator integration tests.
//!
//! - `fakes`: scripted engines, an in-memory job store and a recording sink
//! - `harness`: a fully wired `Narrator` over those fakes

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
