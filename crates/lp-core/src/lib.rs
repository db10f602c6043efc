pub mod diagnostics;
pub mod error;
pub mod sema;
pub mod span;
pub mod syntax;

// Re-export commonly used items for convenience
pub use tracing;

pub use error::{Error, Result};
