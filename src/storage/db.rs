//! SQLite access: the connection pool and the queries every service shares.
//!
//! Query helpers take a plain `&Connection` so they work the same on a pooled
//! connection and inside a `Transaction`.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::core::error::AppResult;
use crate::storage::migrations;
use crate::storage::models::{
    Analysis, AnalysisStatus, AnalysisType, Payment, PaymentProvider, PaymentStatus, TelegramProfile, User,
};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and applies the
/// embedded migrations before returning.
///
/// # Example
///
/// ```no_run
/// use life_analyzer::storage::db;
///
/// let pool = db::create_pool("database.sqlite")?;
/// # Ok::<(), life_analyzer::core::error::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let mut conn = pool.get()?;
    migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection goes back to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> std::result::Result<DbConnection, r2d2::Error> {
    pool.get()
}

const USER_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, free_attempts, is_pro, \
                            pro_activated_at, created_at, updated_at";

const ANALYSIS_COLUMNS: &str =
    "id, user_id, kind, status, input_file_id, image_url, note, result_text, score, created_at, updated_at";

const PAYMENT_COLUMNS: &str =
    "id, user_id, amount, currency, provider, status, external_id, payment_url, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> Result<User> {
    Ok(User {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        free_attempts: row.get(5)?,
        is_pro: row.get(6)?,
        pro_activated_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn analysis_from_row(row: &Row<'_>) -> Result<Analysis> {
    Ok(Analysis {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        status: row.get(3)?,
        input_file_id: row.get(4)?,
        image_url: row.get(5)?,
        note: row.get(6)?,
        result_text: row.get(7)?,
        score: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn payment_from_row(row: &Row<'_>) -> Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        currency: row.get(3)?,
        provider: row.get(4)?,
        status: row.get(5)?,
        external_id: row.get(6)?,
        payment_url: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

// ==================== Users ====================

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        user_from_row,
    )
    .optional()
}

pub fn get_user_by_telegram_id(conn: &Connection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE telegram_id = ?1", USER_COLUMNS),
        params![telegram_id],
        user_from_row,
    )
    .optional()
}

/// Inserts a user with the given attempt quota.
///
/// `INSERT OR IGNORE` makes a concurrent first contact from the same Telegram
/// account resolve to one row; the caller re-reads by telegram_id.
pub fn insert_user(conn: &Connection, profile: &TelegramProfile, free_attempts: i64) -> Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO users (telegram_id, username, first_name, last_name, free_attempts)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            profile.telegram_id,
            profile.username,
            profile.first_name,
            profile.last_name,
            free_attempts
        ],
    )
}

pub fn update_user_names(conn: &Connection, user_id: i64, profile: &TelegramProfile) -> Result<usize> {
    conn.execute(
        "UPDATE users SET username = ?2, first_name = ?3, last_name = ?4, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
        params![user_id, profile.username, profile.first_name, profile.last_name],
    )
}

/// Flips the Pro flag. `pro_activated_at` keeps its first value.
pub fn set_user_pro(conn: &Connection, user_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE users
         SET is_pro = 1,
             pro_activated_at = COALESCE(pro_activated_at, CURRENT_TIMESTAMP),
             updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1 AND is_pro = 0",
        params![user_id],
    )
}

/// Takes one free attempt if any is left. Returns the number of rows changed (0 or 1).
pub fn decrement_free_attempts(conn: &Connection, user_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE users SET free_attempts = free_attempts - 1, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1 AND free_attempts > 0",
        params![user_id],
    )
}

pub fn increment_free_attempts(conn: &Connection, user_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE users SET free_attempts = free_attempts + 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![user_id],
    )
}

// ==================== Analyses ====================

/// Fields of an analysis known before the model has answered.
#[derive(Debug, Clone)]
pub struct NewAnalysis<'a> {
    pub user_id: i64,
    pub kind: AnalysisType,
    pub status: AnalysisStatus,
    pub input_file_id: &'a str,
    pub image_url: Option<&'a str>,
    pub note: Option<&'a str>,
    pub result_text: &'a str,
    pub score: Option<i64>,
}

pub fn insert_analysis(conn: &Connection, analysis: &NewAnalysis<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO analyses (user_id, kind, status, input_file_id, image_url, note, result_text, score)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            analysis.user_id,
            analysis.kind,
            analysis.status,
            analysis.input_file_id,
            analysis.image_url,
            analysis.note,
            analysis.result_text,
            analysis.score
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_analysis_result(
    conn: &Connection,
    analysis_id: i64,
    status: AnalysisStatus,
    result_text: &str,
    score: Option<i64>,
) -> Result<usize> {
    conn.execute(
        "UPDATE analyses SET status = ?2, result_text = ?3, score = ?4, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
        params![analysis_id, status, result_text, score],
    )
}

pub fn get_analysis(conn: &Connection, analysis_id: i64) -> Result<Option<Analysis>> {
    conn.query_row(
        &format!("SELECT {} FROM analyses WHERE id = ?1", ANALYSIS_COLUMNS),
        params![analysis_id],
        analysis_from_row,
    )
    .optional()
}

/// Newest first.
pub fn list_user_analyses(conn: &Connection, user_id: i64, limit: i64, offset: i64) -> Result<Vec<Analysis>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM analyses WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        ANALYSIS_COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id, limit, offset], analysis_from_row)?;
    rows.collect()
}

/// Aggregated analysis counters for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub pending: i64,
    pub by_type: BTreeMap<AnalysisType, i64>,
    /// Mean over analyses that carry a score
    pub average_score: Option<f64>,
    pub last_analysis_at: Option<String>,
}

pub fn analysis_stats(conn: &Connection, user_id: i64) -> Result<AnalysisStats> {
    let mut stats = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'COMPLETED'), 0),
                COALESCE(SUM(status = 'FAILED'), 0),
                COALESCE(SUM(status = 'PENDING'), 0),
                AVG(score),
                MAX(created_at)
         FROM analyses WHERE user_id = ?1",
        params![user_id],
        |row| {
            Ok(AnalysisStats {
                total: row.get(0)?,
                completed: row.get(1)?,
                failed: row.get(2)?,
                pending: row.get(3)?,
                by_type: BTreeMap::new(),
                average_score: row.get(4)?,
                last_analysis_at: row.get(5)?,
            })
        },
    )?;

    let mut stmt = conn.prepare("SELECT kind, COUNT(*) FROM analyses WHERE user_id = ?1 GROUP BY kind")?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((row.get::<_, AnalysisType>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (kind, count) = row?;
        stats.by_type.insert(kind, count);
    }

    Ok(stats)
}

// ==================== Payments ====================

pub fn insert_payment(
    conn: &Connection,
    user_id: i64,
    amount: f64,
    currency: &str,
    provider: PaymentProvider,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO payments (user_id, amount, currency, provider) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, amount, currency, provider],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_payment_url(conn: &Connection, payment_id: i64, payment_url: &str) -> Result<usize> {
    conn.execute(
        "UPDATE payments SET payment_url = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![payment_id, payment_url],
    )
}

/// Updates the status; `external_id` is only overwritten when one is given.
pub fn set_payment_status(
    conn: &Connection,
    payment_id: i64,
    status: PaymentStatus,
    external_id: Option<&str>,
) -> Result<usize> {
    conn.execute(
        "UPDATE payments
         SET status = ?2, external_id = COALESCE(?3, external_id), updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1",
        params![payment_id, status, external_id],
    )
}

pub fn get_payment(conn: &Connection, payment_id: i64) -> Result<Option<Payment>> {
    conn.query_row(
        &format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS),
        params![payment_id],
        payment_from_row,
    )
    .optional()
}

/// Newest first.
pub fn list_user_payments(conn: &Connection, user_id: i64) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payments WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
        PAYMENT_COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], payment_from_row)?;
    rows.collect()
}
