pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod git;
pub mod hook;
pub mod overlay;
pub mod plan;
pub mod prompts;
pub mod review;
pub mod test_helpers;
