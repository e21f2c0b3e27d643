pub mod auth;
pub mod billing;
pub mod enhance;
pub mod ids;
pub mod poller;
pub mod replicate;
pub mod runner;
pub mod store;
