pub mod config;
pub mod error;
pub mod geo;
pub mod taxonomy;
pub mod types;

pub use config::{Config, CoreSettings};
pub use error::{ErrorKind, GunasoError, Result};
pub use types::*;
