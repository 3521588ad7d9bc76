//! Settings are resolved once at startup and handed to `Server::try_new`.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
