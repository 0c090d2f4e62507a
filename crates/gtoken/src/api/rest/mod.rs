//! REST control API

pub mod handlers;
pub mod router;
pub mod state;
