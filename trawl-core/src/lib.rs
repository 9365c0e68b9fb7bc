pub mod aggregator;
pub mod checkers;
pub mod config;
pub mod error;
pub mod heuristics;
pub mod model;
pub mod registry;
pub mod reports;
pub mod similarity;
pub mod target;
pub mod validation;

pub use aggregator::{Aggregator, Policy, fold_verdict};
pub use config::Config;
pub use error::{CheckerError, TrawlError};
pub use model::{CheckLevel, Verdict, VerdictReport};
pub use registry::StaticRegistry;
pub use reports::MemoryReportStore;
