//! Usage metering: who may run an analysis, and what it costs them.
//!
//! Pro users are unlimited. Everyone else spends one free attempt per image
//! analysis. The decrement is a conditional UPDATE inside an IMMEDIATE
//! transaction, so concurrent requests can never push the counter below zero.

use rusqlite::{Connection, TransactionBehavior};

use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::storage::db::{self, DbPool};
use crate::storage::models::User;

/// What a user is currently allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    Pro,
    Free(i64),
    Exhausted,
}

impl Entitlement {
    pub fn can_analyze(self) -> bool {
        !matches!(self, Entitlement::Exhausted)
    }
}

/// Outcome of trying to spend one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageGrant {
    /// Pro user, nothing was spent
    Unlimited,
    /// One free attempt was spent; `remaining` is what is left after it
    FreeAttempt { remaining: i64 },
    Denied,
}

impl UsageGrant {
    pub fn is_granted(self) -> bool {
        !matches!(self, UsageGrant::Denied)
    }
}

pub fn entitlement_of(user: &User) -> Entitlement {
    if user.is_pro {
        Entitlement::Pro
    } else if user.free_attempts > 0 {
        Entitlement::Free(user.free_attempts)
    } else {
        Entitlement::Exhausted
    }
}

/// Spends one attempt for `user_id`, if the user has any.
pub fn consume_attempt(pool: &DbPool, user_id: i64) -> AppResult<UsageGrant> {
    let mut conn = db::get_connection(pool)?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let user = db::get_user(&tx, user_id)?.ok_or_else(|| AppError::not_found("user", user_id))?;

    let grant = if user.is_pro {
        UsageGrant::Unlimited
    } else if db::decrement_free_attempts(&tx, user_id)? == 0 {
        UsageGrant::Denied
    } else {
        let remaining = db::get_user(&tx, user_id)?
            .map(|u| u.free_attempts)
            .unwrap_or_default();
        UsageGrant::FreeAttempt { remaining }
    };

    tx.commit()?;

    match grant {
        UsageGrant::Unlimited => metrics::record_attempt("unlimited"),
        UsageGrant::FreeAttempt { remaining } => {
            metrics::record_attempt("consumed");
            log::info!("User {} spent a free attempt, {} left", user_id, remaining);
        }
        UsageGrant::Denied => {
            metrics::record_attempt("denied");
            log::info!("User {} has no free attempts left", user_id);
        }
    }

    Ok(grant)
}

/// Gives back an attempt taken by [`consume_attempt`]. Only free attempts are refunded.
pub fn refund_attempt(pool: &DbPool, user_id: i64, grant: UsageGrant) -> AppResult<()> {
    if let UsageGrant::FreeAttempt { .. } = grant {
        let conn = db::get_connection(pool)?;
        db::increment_free_attempts(&conn, user_id)?;
        metrics::record_attempt("refunded");
        log::info!("Refunded a free attempt to user {}", user_id);
    }
    Ok(())
}

/// Switches a user to Pro inside the caller's transaction.
///
/// Returns false when the user does not exist or is already Pro.
pub fn activate_pro(tx: &Connection, user_id: i64) -> AppResult<bool> {
    let updated = db::set_user_pro(tx, user_id)?;
    if updated > 0 {
        metrics::record_pro_activation();
        log::info!("Pro subscription activated for user {}", user_id);
    }
    Ok(updated > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::TelegramProfile;
    use pretty_assertions::assert_eq;

    fn setup(free_attempts: i64) -> (tempfile::TempDir, DbPool, i64) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(dir.path().join("t.sqlite").to_str().unwrap()).unwrap();
        let conn = db::get_connection(&pool).unwrap();
        let profile = TelegramProfile {
            telegram_id: 7,
            ..Default::default()
        };
        db::insert_user(&conn, &profile, free_attempts).unwrap();
        let id = db::get_user_by_telegram_id(&conn, 7).unwrap().unwrap().id;
        drop(conn);
        (dir, pool, id)
    }

    fn user(is_pro: bool, free_attempts: i64) -> User {
        User {
            id: 1,
            telegram_id: 1,
            username: None,
            first_name: None,
            last_name: None,
            free_attempts,
            is_pro,
            pro_activated_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_entitlement_of() {
        assert_eq!(entitlement_of(&user(true, 0)), Entitlement::Pro);
        assert_eq!(entitlement_of(&user(false, 3)), Entitlement::Free(3));
        assert_eq!(entitlement_of(&user(false, 0)), Entitlement::Exhausted);
        assert!(!Entitlement::Exhausted.can_analyze());
        assert!(Entitlement::Pro.can_analyze());
    }

    #[test]
    fn test_consume_until_denied() {
        let (_dir, pool, id) = setup(2);
        assert_eq!(consume_attempt(&pool, id).unwrap(), UsageGrant::FreeAttempt { remaining: 1 });
        assert_eq!(consume_attempt(&pool, id).unwrap(), UsageGrant::FreeAttempt { remaining: 0 });
        assert_eq!(consume_attempt(&pool, id).unwrap(), UsageGrant::Denied);

        let conn = db::get_connection(&pool).unwrap();
        assert_eq!(db::get_user(&conn, id).unwrap().unwrap().free_attempts, 0);
    }

    #[test]
    fn test_pro_is_unlimited_and_not_metered() {
        let (_dir, pool, id) = setup(1);
        {
            let conn = db::get_connection(&pool).unwrap();
            assert!(activate_pro(&conn, id).unwrap());
        }
        for _ in 0..3 {
            assert_eq!(consume_attempt(&pool, id).unwrap(), UsageGrant::Unlimited);
        }
        let conn = db::get_connection(&pool).unwrap();
        assert_eq!(db::get_user(&conn, id).unwrap().unwrap().free_attempts, 1);
    }

    #[test]
    fn test_refund_only_free_attempts() {
        let (_dir, pool, id) = setup(1);
        let grant = consume_attempt(&pool, id).unwrap();
        refund_attempt(&pool, id, grant).unwrap();
        refund_attempt(&pool, id, UsageGrant::Unlimited).unwrap();
        refund_attempt(&pool, id, UsageGrant::Denied).unwrap();

        let conn = db::get_connection(&pool).unwrap();
        assert_eq!(db::get_user(&conn, id).unwrap().unwrap().free_attempts, 1);
    }

    #[test]
    fn test_missing_user_is_not_found() {
        let (_dir, pool, _) = setup(1);
        assert!(matches!(consume_attempt(&pool, 999), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_activate_pro_reports_only_the_first_switch() {
        let (_dir, pool, id) = setup(1);
        let conn = db::get_connection(&pool).unwrap();
        assert!(activate_pro(&conn, id).unwrap());
        assert!(!activate_pro(&conn, id).unwrap());
        assert!(db::get_user(&conn, id).unwrap().unwrap().is_pro);
    }

    #[test]
    fn test_activate_pro_missing_user() {
        let (_dir, pool, _) = setup(1);
        let conn = db::get_connection(&pool).unwrap();
        assert!(!activate_pro(&conn, 999).unwrap());
    }
}
