use async_trait::async_trait;

use super::{AnalysisResult, LlmError};
use crate::storage::models::AnalysisType;

/// Something that can look at an image and score it.
///
/// `image_url` is either a public URL or a `data:` URL with the image inlined.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn analyze(&self, image_url: &str, kind: AnalysisType, note: Option<&str>)
        -> Result<AnalysisResult, LlmError>;

    /// Short label for logs
    fn name(&self) -> &'static str;
}

/// Canned answers, used when no model API key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockAnalyzer;

impl MockAnalyzer {
    pub fn result_for(kind: AnalysisType) -> AnalysisResult {
        let (text, score) = match kind {
            AnalysisType::Merch => (
                "Mock product analysis: a well-made item with good sales potential. \
                 Consider better packaging and a more detailed description.",
                7,
            ),
            AnalysisType::Food => (
                "Mock dish analysis: appetizing presentation with nice colors. \
                 The composition could be tighter and a side dish would add appeal.",
                8,
            ),
            AnalysisType::Character => (
                "Mock character analysis: an interesting style and a charismatic look. \
                 Work on posing and lighting.",
                6,
            ),
            AnalysisType::General => (
                "Mock general analysis: a good-quality image with solid composition. \
                 Lighting and detail leave room for improvement.",
                7,
            ),
        };

        AnalysisResult {
            text: text.to_string(),
            score: Some(score),
        }
    }
}

#[async_trait]
impl VisionAnalyzer for MockAnalyzer {
    async fn analyze(
        &self,
        _image_url: &str,
        kind: AnalysisType,
        _note: Option<&str>,
    ) -> Result<AnalysisResult, LlmError> {
        Ok(Self::result_for(kind))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_scores_per_kind() {
        let analyzer = MockAnalyzer;
        let expected = [
            (AnalysisType::Merch, 7),
            (AnalysisType::Food, 8),
            (AnalysisType::Character, 6),
            (AnalysisType::General, 7),
        ];
        for (kind, score) in expected {
            let result = analyzer.analyze("https://example.com/a.jpg", kind, None).await.unwrap();
            assert_eq!(result.score, Some(score));
            assert!(result.text.starts_with("Mock"));
        }
    }
}
