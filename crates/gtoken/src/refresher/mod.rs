//! Token refresh loop

mod controller;

pub use controller::{Refresher, DEFAULT_MIN_REFRESH_INTERVAL};
