//! Process settings.
//!
//! keel.toml carries the ambient defaults (cluster context, namespace,
//! history driver) and registrar tuning. It is read once at bootstrap and
//! turned into explicit values; nothing below this layer reads it again.

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use parser::{parse_settings_toml, parse_settings_toml_str, to_toml};
pub use schema::{ClusterSettings, KeelSettings, ReleaseSettings, RepositorySettings};
pub use store::SettingsStore;
