mod cookie;
mod fetch;
mod key;
mod session;
mod token;

pub use cookie::*;
pub use fetch::*;
pub use key::*;
pub use session::*;
pub use token::*;
