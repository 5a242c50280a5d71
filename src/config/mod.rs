pub mod parser;
pub mod types;

pub use types::*;
pub use parser::{apply_env_overrides, config_from_env, parse_config, validate_config};
