pub mod config;
pub mod error;
pub mod types;

pub use config::PilotConfig;
pub use error::{PilotError, Result};
pub use types::*;
