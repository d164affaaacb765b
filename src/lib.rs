pub mod cache;
pub mod config;
pub mod error;
pub mod excerpt;
pub mod header;
pub mod highlight;
pub mod pipeline;

pub use config::Config;
pub use error::{BlogconvError, Result};
pub use pipeline::{run, RunError, RunOptions, RunReport};
