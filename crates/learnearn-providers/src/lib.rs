//! learnearn-providers: question sources, graders and the reward ledger.
//!
//! Implements the `QuestionSource`, `Grader` and `RewardSink` traits from
//! `learnearn-core` for the built-in catalog, catalog files, a remote quiz
//! API and an in-memory wallet ledger.

pub mod catalog;
pub mod config;
pub mod http;
pub mod ledger;
pub mod mock;

pub use catalog::CatalogSource;
pub use config::{create_backend, load_config, Backend, LearnEarnConfig, SourceConfig};
pub use http::HttpBackend;
pub use ledger::{Ledger, Transaction};
pub use learnearn_core::error::SourceError;
