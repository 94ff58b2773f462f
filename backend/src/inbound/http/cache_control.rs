//! Cache-control policies for HTTP handlers.

/// Responses carrying credentials must never be stored.
pub const NO_STORE: &str = "no-store";

/// Personal data may be cached by the browser only after revalidation.
pub const PRIVATE_NO_CACHE: &str = "private, no-cache, must-revalidate";

/// Header tuple for token-bearing responses.
pub const fn no_store_header() -> (&'static str, &'static str) {
    ("Cache-Control", NO_STORE)
}

/// Header tuple for per-user responses such as carts and orders.
pub const fn private_no_cache_header() -> (&'static str, &'static str) {
    ("Cache-Control", PRIVATE_NO_CACHE)
}
