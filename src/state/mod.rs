//! Per-URL state during a crawl
//!
//! - `AttemptOutcome`: the classified result of one network attempt
//! - `UrlTask`: one input URL moving through retries and variations
//! - `UrlResult`: the terminal record emitted for every task

mod outcome;
mod result;
mod task;

pub use outcome::{AttemptOutcome, StatusClass};
pub use result::UrlResult;
pub use task::{Step, UrlTask};
