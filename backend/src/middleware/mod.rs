//! Request middleware.
//!
//! Purpose: define middleware for request lifecycle concerns: the per-request
//! trace identifier and silent access-token renewal.

pub mod silent_refresh;
pub mod trace;

pub use silent_refresh::SilentRefresh;
pub use trace::Trace;
