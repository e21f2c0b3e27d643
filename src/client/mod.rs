//! Client side of the capture flow: talking to the enhance API, keeping
//! per-capture session state, and presenting the result.

pub mod api;
pub mod presenter;
pub mod session;
