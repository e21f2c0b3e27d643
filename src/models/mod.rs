pub mod billing;
pub mod enhance;
pub mod job;
pub mod prediction;
