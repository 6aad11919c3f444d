// Trigrs Config API
// TOML key map documents and scripted event traces

pub mod parser;
pub mod trace;

pub use parser::{parse_key, Config, ConfigError};
pub use trace::{Trace, TraceInput, TraceStep};
