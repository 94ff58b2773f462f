//! PostgreSQL-backed `UserRepository`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use pagination::PageRequest;

use crate::domain::ports::{UserRepository, UserRepositoryError};
use crate::domain::{EmailAddress, Role, User, UserId};

use super::diesel_basic_error_mapping::{
    foreign_key_violation, map_basic_diesel_error, map_basic_pool_error, unique_violation,
};
use super::diesel_helpers::{affected, collect_rows, count_to_total};
use super::models::UserRow;
use super::pool::{DbPool, PoolError};
use super::schema::{orders, users};

/// Diesel implementation of the account store.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    /// Create a repository over the pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UserRepositoryError {
    map_basic_pool_error(error, UserRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> UserRepositoryError {
    map_basic_diesel_error(
        error,
        UserRepositoryError::query,
        UserRepositoryError::connection,
    )
}

fn map_write_error(error: diesel::result::Error, email: &EmailAddress) -> UserRepositoryError {
    match unique_violation(&error) {
        Some("users_email_key") => UserRepositoryError::duplicate_email(email.as_str()),
        _ => map_diesel_error(error),
    }
}

fn decode(row: UserRow) -> Result<User, UserRepositoryError> {
    User::try_from(row).map_err(UserRepositoryError::query)
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn create(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(users::table)
            .values(UserRow::from(user))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_write_error(err, &user.email))
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        users::table
            .find(id.as_uuid())
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(decode)
            .transpose()
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        users::table
            .filter(users::email.eq(email.as_str()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(decode)
            .transpose()
    }

    async fn find_by_verification_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        users::table
            .filter(users::verification_token_hash.eq(token_hash))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?
            .map(decode)
            .transpose()
    }

    async fn update(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(users::table.find(user.id.as_uuid()))
            .set(&UserRow::from(user))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| map_write_error(err, &user.email))
    }

    async fn list(
        &self,
        role: Option<Role>,
        page: PageRequest,
    ) -> Result<(Vec<User>, u64), UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let mut query = users::table.into_boxed();
        let mut count = users::table.into_boxed();
        if let Some(role) = role {
            query = query.filter(users::role.eq(role.as_str()));
            count = count.filter(users::role.eq(role.as_str()));
        }

        let total: i64 = count
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        let rows: Vec<UserRow> = query
            .order((users::created_at.desc(), users::id.desc()))
            .limit(page.limit())
            .offset(page.offset())
            .select(UserRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok((
            collect_rows(rows, UserRepositoryError::query)?,
            count_to_total(total),
        ))
    }

    async fn delete(&self, id: &UserId) -> Result<bool, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::delete(users::table.find(id.as_uuid()))
            .execute(&mut conn)
            .await
            .map(|affected| affected > 0)
            .map_err(|err| {
                if foreign_key_violation(&err).is_some() {
                    UserRepositoryError::in_use()
                } else {
                    map_diesel_error(err)
                }
            })
    }

    async fn staff_ids(&self) -> Result<Vec<UserId>, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let ids: Vec<uuid::Uuid> = users::table
            .filter(users::role.eq_any(vec![Role::Staff.as_str(), Role::Admin.as_str()]))
            .select(users::id)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(UserId::from_uuid).collect())
    }

    async fn delete_lapsed_unverified(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, UserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let with_orders = orders::table
            .filter(orders::user_id.is_not_null())
            .select(orders::user_id.assume_not_null());
        let deleted = diesel::delete(
            users::table
                .filter(users::is_verified.eq(false))
                .filter(users::role.eq(Role::Customer.as_str()))
                .filter(users::verification_expires_at.lt(now))
                .filter(users::id.ne_all(with_orders)),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(affected(deleted))
    }
}
