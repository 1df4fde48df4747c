pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod scheduler;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use models::{EnrichedItem, Snapshot};
pub use pipeline::RankingCycle;
pub use scheduler::{Scheduler, SchedulerState};
