//! Ultra HD AI Camera
//!
//! Backend for a camera app that enhances captured photos with the clarity
//! upscaler on Replicate. Jobs are submitted without waiting for the model,
//! then polled to a terminal result either on Replicate directly or through
//! a local job store.

pub mod app_state;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
