use once_cell::sync::Lazy;
use regex::Regex;

use super::AnalysisResult;
use crate::storage::models::AnalysisType;

static SCORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:SCORE|ОЦЕНКА):\s*(\d+)").expect("score regex"));

static ANALYSIS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)(?:ANALYSIS|АНАЛИЗ):\s*(.*)").expect("analysis regex"));

const ANSWER_FORMAT: &str = "Answer format: SCORE: <number> ANALYSIS: <detailed text>";

/// Builds the instruction sent alongside the image.
pub fn build_prompt(kind: AnalysisType, note: Option<&str>) -> String {
    let instruction = match kind {
        AnalysisType::Merch => {
            "Analyze this product. Rate its quality, design and sales potential on a scale from 0 to 10 \
             and give concrete recommendations for improvement."
        }
        AnalysisType::Food => {
            "Analyze this dish. Rate its presentation, appeal and plating on a scale from 0 to 10 \
             and give recommendations for improvement."
        }
        AnalysisType::Character => {
            "Analyze this character or person. Rate the style, charisma and overall impression \
             on a scale from 0 to 10 and give recommendations."
        }
        AnalysisType::General => {
            "Analyze this image. Give a detailed description and a rating on a scale from 0 to 10."
        }
    };

    match note.map(str::trim).filter(|n| !n.is_empty()) {
        Some(note) => format!(
            "Additional context from the user: \"{}\"\n\n{} {}",
            note, instruction, ANSWER_FORMAT
        ),
        None => format!("{} {}", instruction, ANSWER_FORMAT),
    }
}

/// Extracts the score and text from a model answer.
///
/// Scores outside 0..=10 are dropped. Without an analysis marker the whole
/// answer becomes the text.
pub fn parse_analysis_result(content: &str) -> AnalysisResult {
    let score = SCORE_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .filter(|score| (0..=10).contains(score));

    let text = ANALYSIS_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| content.to_string());

    AnalysisResult { text, score }
}
