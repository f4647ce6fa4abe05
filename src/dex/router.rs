// src/dex/router.rs
use super::{QuoteResult, SwapRequest, SwapVenue, VenueKind};
use crate::error::PipelineError;
use log::{info, warn};
use std::sync::Arc;

/// Tries the preferred venue once, then the other venue once.
pub struct SwapRouter {
    aggregator: Arc<dyn SwapVenue>,
    pool: Arc<dyn SwapVenue>,
}

impl SwapRouter {
    pub fn new(aggregator: Arc<dyn SwapVenue>, pool: Arc<dyn SwapVenue>) -> Self {
        Self { aggregator, pool }
    }

    fn venue(&self, kind: VenueKind) -> &Arc<dyn SwapVenue> {
        match kind {
            VenueKind::Aggregator => &self.aggregator,
            VenueKind::Pool => &self.pool,
        }
    }

    pub async fn swap(
        &self,
        request: &SwapRequest,
        preferred: VenueKind,
    ) -> Result<QuoteResult, PipelineError> {
        let preferred_err = match self.venue(preferred).quote_and_build(request).await {
            Ok(quote) => return Ok(quote),
            Err(e) => e,
        };
        let alternate = preferred.alternate();
        warn!(
            "[Router] {} venue failed ({}); falling back to {}",
            preferred, preferred_err, alternate
        );

        match self.venue(alternate).quote_and_build(request).await {
            Ok(quote) => {
                info!("[Router] Swap sourced from fallback venue {}", alternate);
                Ok(quote)
            }
            Err(alternate_err) => Err(PipelineError::AllVenuesFailed {
                preferred: preferred_err.to_string(),
                alternate: alternate_err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockVenue;
    use solana_sdk::pubkey::Pubkey;

    fn request() -> SwapRequest {
        SwapRequest::exact_in(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            1_000,
            50,
        )
    }

    #[tokio::test]
    async fn test_preferred_success_skips_alternate() {
        let aggregator = Arc::new(MockVenue::succeeding(VenueKind::Aggregator, 990));
        let pool = Arc::new(MockVenue::succeeding(VenueKind::Pool, 995));
        let router = SwapRouter::new(aggregator.clone(), pool.clone());

        let quote = router.swap(&request(), VenueKind::Aggregator).await.unwrap();

        assert_eq!(quote.venue, VenueKind::Aggregator);
        assert_eq!(aggregator.calls(), 1);
        assert_eq!(pool.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_sourced_from_alternate_only() {
        let aggregator = Arc::new(MockVenue::failing(VenueKind::Aggregator, "no route"));
        let pool = Arc::new(MockVenue::succeeding(VenueKind::Pool, 995));
        let router = SwapRouter::new(aggregator.clone(), pool.clone());

        let quote = router.swap(&request(), VenueKind::Aggregator).await.unwrap();

        assert_eq!(quote.venue, VenueKind::Pool);
        assert_eq!(quote.out_amount, 995);
        assert_eq!(aggregator.calls(), 1);
        assert_eq!(pool.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_failing_reports_both_reasons() {
        let aggregator = Arc::new(MockVenue::failing(VenueKind::Aggregator, "no route"));
        let pool = Arc::new(MockVenue::failing(VenueKind::Pool, "pool id required"));
        let router = SwapRouter::new(aggregator.clone(), pool.clone());

        let err = router.swap(&request(), VenueKind::Pool).await.unwrap_err();

        match err {
            PipelineError::AllVenuesFailed {
                preferred,
                alternate,
            } => {
                assert!(preferred.contains("pool id required"));
                assert!(alternate.contains("no route"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(aggregator.calls(), 1);
        assert_eq!(pool.calls(), 1);
    }
}
