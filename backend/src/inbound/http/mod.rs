//! HTTP inbound adapter exposing the REST API under `/api/v1`.

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod cache_control;
pub mod cart;
pub mod catalogue;
pub mod error;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod routes;
pub mod schemas;
pub mod session;
pub mod session_config;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod validation;

pub use error::ApiResult;
