//! CLI command implementations

pub mod config;
pub mod fetch;
pub mod list;
pub mod run;
pub mod status;

pub use config::execute as config;
pub use fetch::execute as fetch;
pub use list::execute as list;
pub use run::execute as run;
pub use status::execute as status;
