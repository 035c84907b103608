pub mod access;
pub mod utils;

pub use access::run_command;
