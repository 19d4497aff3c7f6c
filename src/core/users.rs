//! User lookup, registration and balance queries.

use serde::Serialize;
use std::sync::Arc;

use crate::core::entitlement::{self, entitlement_of};
use crate::core::error::{AppError, AppResult};
use crate::storage::db::{self, DbPool};
use crate::storage::models::{Analysis, Payment, TelegramProfile, User};

/// How many analyses a user profile embeds
const RECENT_ANALYSES: i64 = 10;

/// A user together with their recent activity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub recent_analyses: Vec<Analysis>,
    pub payments: Vec<Payment>,
}

/// What the bot shows for /balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBalance {
    pub telegram_id: i64,
    pub free_attempts: i64,
    pub is_pro: bool,
    pub can_analyze: bool,
}

#[derive(Clone)]
pub struct UserService {
    pool: Arc<DbPool>,
    free_attempts: i64,
}

impl UserService {
    /// `free_attempts` is the quota every newly registered user starts with.
    pub fn new(pool: Arc<DbPool>, free_attempts: i64) -> Self {
        Self { pool, free_attempts }
    }

    /// Returns the user for a Telegram account, registering it on first contact.
    pub fn find_or_create_user(&self, profile: &TelegramProfile) -> AppResult<User> {
        let conn = db::get_connection(&self.pool)?;

        if let Some(user) = db::get_user_by_telegram_id(&conn, profile.telegram_id)? {
            let names_changed = user.username != profile.username
                || user.first_name != profile.first_name
                || user.last_name != profile.last_name;
            if !names_changed {
                return Ok(user);
            }
            db::update_user_names(&conn, user.id, profile)?;
            return db::get_user(&conn, user.id)?.ok_or_else(|| AppError::not_found("user", user.id));
        }

        if db::insert_user(&conn, profile, self.free_attempts)? > 0 {
            log::info!(
                "Registered user telegram_id={} with {} free attempts",
                profile.telegram_id,
                self.free_attempts
            );
        }

        db::get_user_by_telegram_id(&conn, profile.telegram_id)?
            .ok_or_else(|| AppError::not_found("user with telegram id", profile.telegram_id))
    }

    pub fn get_user(&self, user_id: i64) -> AppResult<User> {
        let conn = db::get_connection(&self.pool)?;
        db::get_user(&conn, user_id)?.ok_or_else(|| AppError::not_found("user", user_id))
    }

    /// The user with the 10 most recent analyses and every payment, newest first.
    pub fn find_by_id(&self, user_id: i64) -> AppResult<UserProfile> {
        let conn = db::get_connection(&self.pool)?;
        let user = db::get_user(&conn, user_id)?.ok_or_else(|| AppError::not_found("user", user_id))?;
        let recent_analyses = db::list_user_analyses(&conn, user_id, RECENT_ANALYSES, 0)?;
        let payments = db::list_user_payments(&conn, user_id)?;

        Ok(UserProfile {
            user,
            recent_analyses,
            payments,
        })
    }

    pub fn get_user_balance(&self, telegram_id: i64) -> AppResult<UserBalance> {
        let conn = db::get_connection(&self.pool)?;
        let user = db::get_user_by_telegram_id(&conn, telegram_id)?
            .ok_or_else(|| AppError::not_found("user with telegram id", telegram_id))?;

        Ok(UserBalance {
            telegram_id: user.telegram_id,
            free_attempts: user.free_attempts,
            is_pro: user.is_pro,
            can_analyze: entitlement_of(&user).can_analyze(),
        })
    }

    /// Idempotent; the first activation time is kept.
    pub fn activate_pro_subscription(&self, user_id: i64) -> AppResult<User> {
        let conn = db::get_connection(&self.pool)?;
        if db::get_user(&conn, user_id)?.is_none() {
            return Err(AppError::not_found("user", user_id));
        }
        entitlement::activate_pro(&conn, user_id)?;
        db::get_user(&conn, user_id)?.ok_or_else(|| AppError::not_found("user", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service(free_attempts: i64) -> (tempfile::TempDir, UserService) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(dir.path().join("users.sqlite").to_str().unwrap()).unwrap();
        (dir, UserService::new(Arc::new(pool), free_attempts))
    }

    fn profile(telegram_id: i64, username: &str) -> TelegramProfile {
        TelegramProfile {
            telegram_id,
            username: Some(username.to_string()),
            first_name: Some("Bob".to_string()),
            last_name: None,
        }
    }

    #[test]
    fn test_find_or_create_registers_once() {
        let (_dir, users) = service(3);
        let created = users.find_or_create_user(&profile(10, "bob")).unwrap();
        assert_eq!(created.free_attempts, 3);

        let again = users.find_or_create_user(&profile(10, "bob")).unwrap();
        assert_eq!(again.id, created.id);
    }

    #[test]
    fn test_find_or_create_refreshes_names() {
        let (_dir, users) = service(3);
        users.find_or_create_user(&profile(10, "bob")).unwrap();
        let renamed = users.find_or_create_user(&profile(10, "robert")).unwrap();
        assert_eq!(renamed.username.as_deref(), Some("robert"));
    }

    #[test]
    fn test_balance() {
        let (_dir, users) = service(0);
        let user = users.find_or_create_user(&profile(11, "eve")).unwrap();

        let balance = users.get_user_balance(11).unwrap();
        assert_eq!(
            balance,
            UserBalance {
                telegram_id: 11,
                free_attempts: 0,
                is_pro: false,
                can_analyze: false,
            }
        );

        users.activate_pro_subscription(user.id).unwrap();
        assert!(users.get_user_balance(11).unwrap().can_analyze);
        assert!(matches!(users.get_user_balance(12), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_activate_pro_is_idempotent() {
        let (_dir, users) = service(1);
        let user = users.find_or_create_user(&profile(5, "pro")).unwrap();
        let first = users.activate_pro_subscription(user.id).unwrap();
        let second = users.activate_pro_subscription(user.id).unwrap();
        assert!(second.is_pro);
        assert_eq!(first.pro_activated_at, second.pro_activated_at);
        assert!(matches!(users.activate_pro_subscription(404), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_profile_serializes_flat() {
        let (_dir, users) = service(5);
        let user = users.find_or_create_user(&profile(20, "flat")).unwrap();
        let value = serde_json::to_value(users.find_by_id(user.id).unwrap()).unwrap();
        assert_eq!(value["telegramId"], 20);
        assert_eq!(value["freeAttempts"], 5);
        assert!(value["recentAnalyses"].as_array().unwrap().is_empty());
        assert!(value["payments"].as_array().unwrap().is_empty());
        assert!(matches!(users.find_by_id(999), Err(AppError::NotFound(_))));
    }
}
