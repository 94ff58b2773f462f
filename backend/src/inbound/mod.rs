//! Inbound adapters that translate external requests into domain service
//! calls while keeping framework details at the edge.
//!
//! REST handlers live under [`http`]; the live notification and presence
//! socket lives under [`ws`]. Both read the same domain services.

pub mod http;
pub mod ws;
