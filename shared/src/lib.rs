pub mod errors;
pub mod interaction;
pub mod log;
