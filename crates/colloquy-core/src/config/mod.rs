//! Configuration system — schema, loading, and env var overrides.

pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config, save_config};
pub use schema::{AgentConfig, Config, ModelConfig};
