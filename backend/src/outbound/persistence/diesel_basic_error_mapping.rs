//! Shared Diesel error mapping for the repository adapters.
//!
//! Every adapter funnels pool and query failures through these helpers so
//! connection problems surface as `Connection` (503) and everything else as
//! `Query` (500). Constraint violations are recognised by constraint name,
//! which PostgreSQL derives as `<table>_<column>_key` for unique columns and
//! `<table>_<column>_fkey` for references.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Map pool errors into a repository-specific connection error constructor.
pub fn map_basic_pool_error<E, C>(error: PoolError, connection: C) -> E
where
    C: FnOnce(String) -> E,
{
    let message = match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    };
    connection(message)
}

/// Map common Diesel error variants into query/connection constructors.
pub fn map_basic_diesel_error<E, Q, C>(error: DieselError, query: Q, connection: C) -> E
where
    Q: Fn(&'static str) -> E,
    C: Fn(&'static str) -> E,
{
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(
                ?kind,
                message = info.message(),
                constraint = info.constraint_name(),
                "diesel operation failed"
            );
        }
        other => debug!(error = %other, "diesel operation failed"),
    }

    match error {
        DieselError::NotFound => query("record not found"),
        DieselError::QueryBuilderError(_) => query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            connection("database connection error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            query("concurrent update conflict")
        }
        _ => query("database error"),
    }
}

fn violated_constraint(error: &DieselError, wanted: fn(&DatabaseErrorKind) -> bool) -> Option<&str> {
    match error {
        DieselError::DatabaseError(kind, info) if wanted(kind) => info.constraint_name(),
        _ => None,
    }
}

/// Name of the unique constraint a failed statement violated.
pub fn unique_violation(error: &DieselError) -> Option<&str> {
    violated_constraint(error, |kind| {
        matches!(kind, DatabaseErrorKind::UniqueViolation)
    })
}

/// Name of the foreign key a failed statement violated.
pub fn foreign_key_violation(error: &DieselError) -> Option<&str> {
    violated_constraint(error, |kind| {
        matches!(kind, DatabaseErrorKind::ForeignKeyViolation)
    })
}
