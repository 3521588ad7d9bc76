mod reqwest_fetcher;
mod request_cookies;

pub use reqwest_fetcher::*;
pub use request_cookies::*;
