//! Keeps track of the time spent on websites and how productive it was.
//! The host runs next to the browser and records every focused tab, the cli reads what it saved
//! and prints summaries right in the terminal.
//!

pub mod classifier;
pub mod cli;
pub mod daemon;
pub mod fs;
pub mod utils;
