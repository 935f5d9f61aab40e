pub mod config;
pub mod error;
pub mod fetch;
pub mod process;
pub mod reporter;
pub mod sanitize;
pub mod source;
pub mod transform;
pub mod uri;
