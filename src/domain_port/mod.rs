// store

mod key_value_store;

pub use key_value_store::*;

// collaborators

mod clock;
mod cookie_jar;
mod oauth_client;
mod upstream_fetcher;

pub use clock::*;
pub use cookie_jar::*;
pub use oauth_client::*;
pub use upstream_fetcher::*;
