//! Entity extraction seam.
//!
//! Turning episode text into entities and facts is the job of an external
//! extraction service (typically LLM-backed). The graph memory only consumes
//! this trait; [`NoopExtractor`] stores episodes without extracting anything.

use async_trait::async_trait;

use crate::error::GraphMemResult;
use crate::types::{EntityType, EpisodeInput, Extraction};

/// Extracts entities and facts from an episode.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Extract from one episode. `entity_types` is empty unless custom
    /// entity extraction is enabled.
    async fn extract(
        &self,
        episode: &EpisodeInput,
        entity_types: &[EntityType],
    ) -> GraphMemResult<Extraction>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Extractor that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExtractor;

#[async_trait]
impl EntityExtractor for NoopExtractor {
    async fn extract(
        &self,
        _episode: &EpisodeInput,
        _entity_types: &[EntityType],
    ) -> GraphMemResult<Extraction> {
        Ok(Extraction::default())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_extractor_returns_nothing() {
        let episode = EpisodeInput::new("n", "Alice works at Acme", "g1");
        let extraction = NoopExtractor.extract(&episode, &[]).await.unwrap();
        assert!(extraction.is_empty());
        assert_eq!(NoopExtractor.name(), "noop");
    }
}
