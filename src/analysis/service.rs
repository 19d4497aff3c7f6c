//! Metered image analysis and queries over stored analyses.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;

use super::{AnalysisResult, VisionAnalyzer};
use crate::core::entitlement::{self, entitlement_of, UsageGrant};
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::storage::db::{self, AnalysisStats, DbPool, NewAnalysis};
use crate::storage::models::{Analysis, AnalysisStatus, AnalysisType};

/// Placeholder text of an analysis that has not been run yet
pub const PENDING_TEXT: &str = "Analysis pending...";

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Where the model reads the image from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Publicly reachable URL, stored with the analysis
    Url(String),
    /// Raw bytes, sent to the model as a `data:` URL and never stored
    Inline { mime: String, bytes: Vec<u8> },
}

impl ImageSource {
    /// URL handed to the vision model.
    pub fn model_url(&self) -> String {
        match self {
            ImageSource::Url(url) => url.clone(),
            ImageSource::Inline { mime, bytes } => format!("data:{};base64,{}", mime, BASE64.encode(bytes)),
        }
    }

    fn stored_url(&self) -> Option<&str> {
        match self {
            ImageSource::Url(url) => Some(url),
            ImageSource::Inline { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub user_id: i64,
    pub kind: AnalysisType,
    /// Telegram file id (or any client-side reference) of the image
    pub file_id: String,
    pub image: Option<ImageSource>,
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct AnalysisService {
    pool: Arc<DbPool>,
    analyzer: Arc<dyn VisionAnalyzer>,
}

impl AnalysisService {
    pub fn new(pool: Arc<DbPool>, analyzer: Arc<dyn VisionAnalyzer>) -> Self {
        Self { pool, analyzer }
    }

    pub fn analyzer_name(&self) -> &'static str {
        self.analyzer.name()
    }

    /// Stores an analysis and, when an image is given, runs it through the model.
    ///
    /// Running the model costs one attempt. A model failure is stored as a
    /// FAILED analysis and the attempt is given back.
    pub async fn submit(&self, request: AnalysisRequest) -> AppResult<Analysis> {
        let note = request.note.as_deref().map(str::trim).filter(|n| !n.is_empty());

        let Some(image) = request.image.as_ref() else {
            return self.store_pending(&request, note);
        };

        let grant = entitlement::consume_attempt(&self.pool, request.user_id)?;
        if grant == UsageGrant::Denied {
            return Err(AppError::AttemptsExhausted);
        }

        let analysis_id = {
            let conn = db::get_connection(&self.pool)?;
            let inserted = db::insert_analysis(
                &conn,
                &NewAnalysis {
                    user_id: request.user_id,
                    kind: request.kind,
                    status: AnalysisStatus::Pending,
                    input_file_id: &request.file_id,
                    image_url: image.stored_url(),
                    note,
                    result_text: PENDING_TEXT,
                    score: None,
                },
            );
            match inserted {
                Ok(id) => id,
                Err(e) => {
                    drop(conn);
                    entitlement::refund_attempt(&self.pool, request.user_id, grant)?;
                    return Err(e.into());
                }
            }
        };

        log::info!(
            "Running {} analysis {} for user {} via {}",
            request.kind,
            analysis_id,
            request.user_id,
            self.analyzer.name()
        );

        let job = RunningAnalysis {
            pool: Arc::clone(&self.pool),
            analysis_id,
            user_id: request.user_id,
            kind: request.kind,
            grant,
        };
        let analyzer = Arc::clone(&self.analyzer);
        let model_url = image.model_url();
        let note = note.map(str::to_string);

        // The model call and the write-back run detached, so a dropped caller
        // cannot leave the record PENDING with the attempt spent.
        let handle = tokio::spawn(async move {
            let outcome = analyzer.analyze(&model_url, job.kind, note.as_deref()).await;
            job.finish(outcome.map_err(|e| e.to_string()))
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(AppError::Anyhow(anyhow::anyhow!("analysis {} task failed: {}", analysis_id, e))),
        }
    }

    fn store_pending(&self, request: &AnalysisRequest, note: Option<&str>) -> AppResult<Analysis> {
        let conn = db::get_connection(&self.pool)?;
        if db::get_user(&conn, request.user_id)?.is_none() {
            return Err(AppError::not_found("user", request.user_id));
        }

        let id = db::insert_analysis(
            &conn,
            &NewAnalysis {
                user_id: request.user_id,
                kind: request.kind,
                status: AnalysisStatus::Pending,
                input_file_id: &request.file_id,
                image_url: None,
                note,
                result_text: PENDING_TEXT,
                score: None,
            },
        )?;
        metrics::record_analysis(request.kind.as_ref(), AnalysisStatus::Pending.as_ref());

        db::get_analysis(&conn, id)?.ok_or_else(|| AppError::not_found("analysis", id))
    }

    /// Read-only check whether the user could start an analysis right now.
    pub fn can_analyze(&self, user_id: i64) -> AppResult<bool> {
        let conn = db::get_connection(&self.pool)?;
        let user = db::get_user(&conn, user_id)?.ok_or_else(|| AppError::not_found("user", user_id))?;
        Ok(entitlement_of(&user).can_analyze())
    }

    pub fn get_analysis_by_id(&self, analysis_id: i64) -> AppResult<Analysis> {
        let conn = db::get_connection(&self.pool)?;
        db::get_analysis(&conn, analysis_id)?.ok_or_else(|| AppError::not_found("analysis", analysis_id))
    }

    /// Newest first. `limit` defaults to 10 and is clamped to 1..=100.
    pub fn get_user_analyses(&self, user_id: i64, limit: Option<i64>, offset: Option<i64>) -> AppResult<Vec<Analysis>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);

        let conn = db::get_connection(&self.pool)?;
        Ok(db::list_user_analyses(&conn, user_id, limit, offset)?)
    }

    pub fn get_user_analysis_stats(&self, user_id: i64) -> AppResult<AnalysisStats> {
        let conn = db::get_connection(&self.pool)?;
        if db::get_user(&conn, user_id)?.is_none() {
            return Err(AppError::not_found("user", user_id));
        }
        Ok(db::analysis_stats(&conn, user_id)?)
    }
}

/// An analysis whose attempt is already spent and whose row is PENDING.
struct RunningAnalysis {
    pool: Arc<DbPool>,
    analysis_id: i64,
    user_id: i64,
    kind: AnalysisType,
    grant: UsageGrant,
}

impl RunningAnalysis {
    /// Stores the model outcome. The attempt is refunded when the model failed
    /// or the result could not be written.
    fn finish(self, outcome: Result<AnalysisResult, String>) -> AppResult<Analysis> {
        let (status, text, score) = match outcome {
            Ok(result) => (AnalysisStatus::Completed, result.text, result.score),
            Err(e) => {
                log::error!("Analysis {} failed: {}", self.analysis_id, e);
                metrics::record_llm_failure();
                (AnalysisStatus::Failed, e, None)
            }
        };

        let stored = self.store(status, &text, score);
        if status == AnalysisStatus::Failed || stored.is_err() {
            if let Err(e) = &stored {
                log::error!("Failed to store result of analysis {}: {}", self.analysis_id, e);
            }
            entitlement::refund_attempt(&self.pool, self.user_id, self.grant)?;
        }
        if stored.is_ok() {
            metrics::record_analysis(self.kind.as_ref(), status.as_ref());
        }

        stored
    }

    fn store(&self, status: AnalysisStatus, text: &str, score: Option<i64>) -> AppResult<Analysis> {
        let conn = db::get_connection(&self.pool)?;
        db::update_analysis_result(&conn, self.analysis_id, status, text, score)?;
        db::get_analysis(&conn, self.analysis_id)?.ok_or_else(|| AppError::not_found("analysis", self.analysis_id))
    }
}
