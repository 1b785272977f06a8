pub mod log;
pub mod runtime;

pub use runtime::{ToolOptions, ToolRuntime};
