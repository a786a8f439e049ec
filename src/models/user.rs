// User model: identity, credit wallet, and policy tier

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::OptionalExtension;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::users;

/// Subscription tier controlling rate limits
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, diesel::AsExpression, diesel::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Free,
    Pro,
    Enterprise,
}

impl UserTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserTier::Free => "free",
            UserTier::Pro => "pro",
            UserTier::Enterprise => "enterprise",
        }
    }
}

impl FromStr for UserTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(UserTier::Free),
            "pro" => Ok(UserTier::Pro),
            "enterprise" => Ok(UserTier::Enterprise),
            _ => Err(format!("Invalid user tier: {}", s)),
        }
    }
}

impl<DB> diesel::deserialize::FromSql<diesel::sql_types::Text, DB> for UserTier
where
    DB: diesel::backend::Backend,
    String: diesel::deserialize::FromSql<diesel::sql_types::Text, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let value = String::from_sql(bytes)?;
        Self::from_str(&value).map_err(|e| e.into())
    }
}

impl<DB> diesel::serialize::ToSql<diesel::sql_types::Text, DB> for UserTier
where
    DB: diesel::backend::Backend,
    str: diesel::serialize::ToSql<diesel::sql_types::Text, DB>,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, DB>,
    ) -> diesel::serialize::Result {
        self.as_str().to_sql(out)
    }
}

/// User database model
#[derive(Debug, Clone, Serialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub tier: UserTier,
    pub credits: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub tier: UserTier,
    pub credits: i32,
    pub api_key: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("User already exists")]
    AlreadyExists,

    #[error("Insufficient credits")]
    InsufficientCredits,
}

impl User {
    /// Insert a new user. A unique-violation on the active-email index
    /// surfaces as AlreadyExists.
    pub async fn create(conn: &mut AsyncPgConnection, new_user: NewUser) -> Result<Self, UserError> {
        diesel::insert_into(users::table)
            .values(&new_user)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => UserError::AlreadyExists,
                _ => UserError::Database(e),
            })
    }

    /// Find an active user by id
    pub async fn find_active_by_id(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id).and(is_active.eq(true)))
            .first::<User>(conn)
            .await
            .map_err(not_found)
    }

    /// Find an active user by email
    pub async fn find_active_by_email(
        conn: &mut AsyncPgConnection,
        email_str: &str,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(email.eq(email_str).and(is_active.eq(true)))
            .first::<User>(conn)
            .await
            .map_err(not_found)
    }

    /// Find an active user by opaque API key
    pub async fn find_active_by_api_key(
        conn: &mut AsyncPgConnection,
        key: &str,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(api_key.eq(key).and(is_active.eq(true)))
            .first::<User>(conn)
            .await
            .map_err(not_found)
    }

    /// Debit credits atomically. The `credits >= amount` guard makes the
    /// check-and-decrement a single statement; zero rows affected means the
    /// wallet could not cover the debit. Returns the remaining balance.
    pub async fn decrement_credits(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
        amount: i32,
    ) -> Result<i32, UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id).and(credits.ge(amount))))
            .set((credits.eq(credits - amount), updated_at.eq(Utc::now())))
            .returning(credits)
            .get_result::<i32>(conn)
            .await
            .optional()?
            .ok_or(UserError::InsufficientCredits)
    }

    /// Record a successful login
    pub async fn update_last_login(
        conn: &mut AsyncPgConnection,
        user_id: Uuid,
    ) -> Result<(), UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set(last_login_at.eq(Some(Utc::now())))
            .execute(conn)
            .await?;
        Ok(())
    }
}

fn not_found(e: diesel::result::Error) -> UserError {
    match e {
        diesel::result::Error::NotFound => UserError::NotFound,
        _ => UserError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_roundtrip() {
        for tier in [UserTier::Free, UserTier::Pro, UserTier::Enterprise] {
            assert_eq!(UserTier::from_str(tier.as_str()).unwrap(), tier);
        }
        assert!(UserTier::from_str("platinum").is_err());
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.test".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            tier: UserTier::Free,
            credits: 10,
            api_key: Some("abc".to_string()),
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("password_hash"));
        assert!(json.contains("\"tier\":\"free\""));
    }
}
