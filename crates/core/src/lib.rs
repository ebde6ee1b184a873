pub mod config;
pub mod error;
pub mod types;

pub use config::{CompressCodec, Config};
pub use error::WorkerError;
pub use types::*;
