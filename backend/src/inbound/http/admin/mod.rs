//! Back-office endpoints under `/api/v1/admin`.
//!
//! Every handler requires a staff bearer token; account management
//! additionally requires an administrator. Handlers are grouped by the
//! domain service they drive.

pub mod catalogue;
pub mod discounts;
pub mod expenses;
pub mod orders;
pub mod reports;
pub mod stock;
pub mod users;

#[cfg(test)]
mod tests;
