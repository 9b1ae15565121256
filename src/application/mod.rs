// Application layer - the migration runner and the startup tiers built on it.

pub mod error;
mod runner;
pub mod startup;

pub use error::*;
pub use runner::*;
pub use startup::{StartupReport, TierOutcome, bootstrap};
