//! Photo messages: caption parsing, metering pre-check and the analysis reply.

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{Message, PhotoSize};

use super::types::{profile_from_message, HandlerDeps, HandlerError};
use crate::analysis::{AnalysisRequest, ImageSource};
use crate::core::error::AppError;
use crate::storage::models::{Analysis, AnalysisStatus, AnalysisType};

/// Telegram rejects messages longer than 4096 characters
const MAX_REPLY_CHARS: usize = 4000;

const UPSELL_TEXT: &str = "Бесплатные попытки закончились 😔\n\
    Оформите Pro подписку, чтобы анализировать фото без ограничений: /pro";

pub(super) fn parse_mode(word: &str) -> Option<AnalysisType> {
    word.trim().parse().ok()
}

/// Splits a caption into the analysis mode and the user's note.
///
/// A first word naming a mode selects it and the rest is the note. Otherwise
/// the mode is GENERAL and the whole caption is the note.
pub fn parse_caption(caption: Option<&str>) -> (AnalysisType, Option<String>) {
    let caption = caption.map(str::trim).unwrap_or_default();
    let non_empty = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());

    let (first, rest) = caption.split_once(char::is_whitespace).unwrap_or((caption, ""));
    match parse_mode(first) {
        Some(kind) => (kind, non_empty(rest)),
        None => (AnalysisType::General, non_empty(caption)),
    }
}

fn largest_photo(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes
        .iter()
        .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
}

fn format_result(analysis: &Analysis) -> String {
    if analysis.status == AnalysisStatus::Failed {
        return "😔 Не удалось проанализировать фото. Попытка не списана, попробуйте ещё раз позже.".to_string();
    }

    let text: String = analysis.result_text.chars().take(MAX_REPLY_CHARS).collect();
    match analysis.score {
        Some(score) => format!("📊 Оценка: {}/10\n\n{}", score, text),
        None => text,
    }
}

pub(super) async fn handle_photo(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(photo) = msg.photo().and_then(largest_photo) else {
        return Ok(());
    };

    let user = deps.users.find_or_create_user(&profile_from_message(msg))?;
    let (kind, note) = parse_caption(msg.caption());

    if !deps.analysis.can_analyze(user.id)? {
        bot.send_message(msg.chat.id, UPSELL_TEXT).await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, format!("🔍 Анализирую фото (режим {})...", kind))
        .await?;

    let file = bot.get_file(photo.file.id.clone()).await?;
    let mut bytes = Vec::new();
    bot.download_file(&file.path, &mut bytes).await?;

    let submitted = deps
        .analysis
        .submit(AnalysisRequest {
            user_id: user.id,
            kind,
            file_id: photo.file.id.0.clone(),
            image: Some(ImageSource::Inline {
                mime: "image/jpeg".to_string(),
                bytes,
            }),
            note,
        })
        .await;

    let reply = match submitted {
        Ok(analysis) => format_result(&analysis),
        // Lost a race with another photo for the last attempt
        Err(AppError::AttemptsExhausted) => UPSELL_TEXT.to_string(),
        Err(e) => return Err(e.into()),
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use teloxide::types::{FileId, FileMeta, FileUniqueId};

    #[test]
    fn test_caption_with_mode() {
        assert_eq!(
            parse_caption(Some("food  homemade pasta ")),
            (AnalysisType::Food, Some("homemade pasta".to_string()))
        );
        assert_eq!(parse_caption(Some("MERCH")), (AnalysisType::Merch, None));
        assert_eq!(
            parse_caption(Some("Character\ncosplay")),
            (AnalysisType::Character, Some("cosplay".to_string()))
        );
    }

    #[test]
    fn test_caption_without_mode() {
        assert_eq!(
            parse_caption(Some("my new sneakers")),
            (AnalysisType::General, Some("my new sneakers".to_string()))
        );
        assert_eq!(parse_caption(None), (AnalysisType::General, None));
        assert_eq!(parse_caption(Some("   ")), (AnalysisType::General, None));
    }

    fn photo_size(id: &str, width: u32, height: u32) -> PhotoSize {
        PhotoSize {
            file: FileMeta {
                id: FileId(id.to_string()),
                unique_id: FileUniqueId(id.to_string()),
                size: width * height / 10,
            },
            width,
            height,
        }
    }

    #[test]
    fn test_largest_photo_by_area() {
        // Area decides, not list position
        let sizes = vec![
            photo_size("small", 90, 90),
            photo_size("wide", 1280, 200),
            photo_size("big", 800, 800),
            photo_size("medium", 320, 320),
        ];
        assert_eq!(largest_photo(&sizes).map(|p| p.file.id.0.as_str()), Some("big"));
        assert!(largest_photo(&[]).is_none());
    }

    fn analysis(status: AnalysisStatus, score: Option<i64>, text: &str) -> Analysis {
        Analysis {
            id: 1,
            user_id: 1,
            kind: AnalysisType::Food,
            status,
            input_file_id: "f".into(),
            image_url: None,
            note: None,
            result_text: text.into(),
            score,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_format_result() {
        assert_eq!(
            format_result(&analysis(AnalysisStatus::Completed, Some(8), "Tasty")),
            "📊 Оценка: 8/10\n\nTasty"
        );
        assert_eq!(format_result(&analysis(AnalysisStatus::Completed, None, "Tasty")), "Tasty");
        assert!(format_result(&analysis(AnalysisStatus::Failed, None, "HTTP 500")).contains("Попытка не списана"));

        let long = "x".repeat(MAX_REPLY_CHARS * 2);
        assert!(format_result(&analysis(AnalysisStatus::Completed, None, &long)).chars().count() <= MAX_REPLY_CHARS);
    }
}
