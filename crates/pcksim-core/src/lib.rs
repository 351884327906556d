pub mod catalog;
pub mod config;
pub mod error;
pub mod grader;
pub mod history;
pub mod interpreter;
pub mod logger;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod router;

pub use config::*;
pub use error::*;
pub use grader::*;
pub use history::*;
pub use interpreter::*;
pub use logger::*;
pub use orchestrator::*;
pub use prompt::*;
pub use registry::*;
pub use router::*;
