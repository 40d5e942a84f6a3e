//! Configuration: TOML file + `RONDO__` environment overrides + defaults.

mod load;
mod schema;

pub use load::{default_config_path, default_database_path, resolve_config_path};
pub use schema::*;

#[cfg(test)]
mod tests;
