pub mod config;
pub mod error;
pub mod events;
pub mod listener;
pub mod logging;
pub mod publisher;
pub mod sink;

pub use error::{Error, Result};
pub use status_model::{Status, StatusCatalog, StatusDefinition};
