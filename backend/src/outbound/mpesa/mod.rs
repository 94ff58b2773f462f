//! Safaricom Daraja outbound adapter.
//!
//! Provides a thin reqwest implementation of the `MpesaGateway` port: OAuth
//! client-credentials tokens plus the Lipa na M-Pesa Online (STK push) call.

mod client;
mod dto;

pub use client::{DarajaConfig, DarajaEnvironment, DarajaGateway};
