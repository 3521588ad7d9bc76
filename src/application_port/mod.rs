mod fetch_cache;
mod lock_service;
mod session_service;

pub use fetch_cache::*;
pub use lock_service::*;
pub use session_service::*;
