pub mod core;
pub mod permissions;

// Optional components
pub mod cli;
pub mod logging;
