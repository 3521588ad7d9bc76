mod cookie_bound_store;
mod cookie_signer;
mod fetch_cache_impl;
mod lock_service_distributed;
mod lock_service_local;
mod oauth_client_fake;
mod record_store;
mod session_restorer;
mod session_service_impl;

pub use cookie_bound_store::*;
pub use cookie_signer::*;
pub use fetch_cache_impl::*;
pub use lock_service_distributed::*;
pub use lock_service_local::*;
pub use oauth_client_fake::*;
pub use record_store::*;
pub use session_restorer::*;
pub use session_service_impl::*;
