//! Logging setup plus the `tracing` macros every module logs through.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
