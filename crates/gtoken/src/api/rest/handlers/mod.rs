//! API request handlers

mod lifecycle;

pub use lifecycle::*;
