//! Tracing subscriber setup shared by the workspace binaries.

mod subscriber;

pub use subscriber::{LogFormat, init_tracing};
pub use tracing::level_filters::LevelFilter;
