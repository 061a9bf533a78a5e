#![forbid(unsafe_code)]

pub mod attachments;
pub mod backup;
pub mod cli;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod phone;
pub mod synth;
pub mod utils;

pub use cli::app::Cli;
pub use error::{IntegrityError, PreconditionError};
