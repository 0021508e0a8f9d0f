pub mod build;
pub mod manifest;
pub mod watch;
