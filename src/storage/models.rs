//! Rows stored in SQLite and the enums they carry.
//!
//! Enum columns are stored as TEXT using the same spelling the JSON API uses.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Implements TEXT round-tripping for a strum enum.
macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_ref()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: strum::ParseError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

/// What the user asked the model to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString, AsRefStr, EnumIter)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AnalysisType {
    Merch,
    Food,
    Character,
    General,
}

/// Lifecycle of an analysis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Failed,
}

/// Payment status as reported by the provider webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Canceled,
}

/// Supported payment providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentProvider {
    Stripe,
    Yookassa,
}

sql_text_enum!(AnalysisType);
sql_text_enum!(AnalysisStatus);
sql_text_enum!(PaymentStatus);
sql_text_enum!(PaymentProvider);

/// A bot user together with the usage-metering columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Remaining free analyses; never negative
    pub free_attempts: i64,
    pub is_pro: bool,
    pub pro_activated_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Telegram identity of a user as seen in an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelegramProfile {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// One submitted image and its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: AnalysisType,
    pub status: AnalysisStatus,
    pub input_file_id: String,
    pub image_url: Option<String>,
    pub note: Option<String>,
    pub result_text: String,
    pub score: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// A payment attempt with one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub currency: String,
    pub provider: PaymentProvider,
    pub status: PaymentStatus,
    pub external_id: Option<String>,
    pub payment_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_type_parses_case_insensitively() {
        assert_eq!("food".parse::<AnalysisType>().unwrap(), AnalysisType::Food);
        assert_eq!("Character".parse::<AnalysisType>().unwrap(), AnalysisType::Character);
        assert!("selfie".parse::<AnalysisType>().is_err());
    }

    #[test]
    fn test_wire_spelling_matches_storage_spelling() {
        assert_eq!(serde_json::to_string(&AnalysisType::Merch).unwrap(), "\"MERCH\"");
        assert_eq!(AnalysisType::Merch.as_ref(), "MERCH");
        assert_eq!(serde_json::to_string(&PaymentStatus::Success).unwrap(), "\"SUCCESS\"");
        assert_eq!(PaymentStatus::Success.as_ref(), "SUCCESS");
        assert_eq!(serde_json::to_string(&PaymentProvider::Yookassa).unwrap(), "\"yookassa\"");
        assert_eq!(PaymentProvider::Yookassa.as_ref(), "yookassa");
    }

    #[test]
    fn test_analysis_serializes_kind_as_type() {
        let analysis = Analysis {
            id: 1,
            user_id: 2,
            kind: AnalysisType::Food,
            status: AnalysisStatus::Completed,
            input_file_id: "file".into(),
            image_url: None,
            note: None,
            result_text: "tasty".into(),
            score: Some(8),
            created_at: "2026-01-01 00:00:00".into(),
            updated_at: "2026-01-01 00:00:00".into(),
        };
        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value["type"], "FOOD");
        assert_eq!(value["inputFileId"], "file");
        assert_eq!(value["resultText"], "tasty");
    }
}
