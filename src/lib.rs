pub mod config;
pub mod error;
pub mod fetch;
pub mod load;
pub mod outcome;
pub mod pipeline;
pub mod process;

pub use config::Config;
pub use outcome::{Outcome, SkipReason};
