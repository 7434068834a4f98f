//! learnearn-core: Quiz session state machine, scoring and reward engine.
//!
//! This crate defines the data model, the pure scoring engine, the session
//! state machine and the async engine that drives a session through its
//! fetch and grading steps. Backends live in `learnearn-providers`.

pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod retry;
pub mod scoring;
pub mod session;
pub mod traits;
