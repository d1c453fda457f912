//! Main builder coordination - delegates to specialized modules

// Re-export the main Builder from workflow module and config from config module
pub use crate::config::BuildConfig;
pub use crate::workflow::Builder;
