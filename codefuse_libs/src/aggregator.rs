use crate::{
    api::{AggregateEnvelope, FetchResult},
    sources::{
        AggregatorConfig, ContestSource, HttpContestSource, Platform, RetryPolicy, SourceError,
    },
};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::time::{self, Instant};

/// A source together with the policy it is fetched under.
#[derive(Clone)]
pub struct SourceSlot {
    source: Arc<dyn ContestSource>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl SourceSlot {
    pub fn new(source: Arc<dyn ContestSource>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            source,
            timeout,
            retry,
        }
    }
}

/// Fans out to the three contest listings and joins their outcomes into one envelope.
#[derive(Clone)]
pub struct Aggregator {
    codeforces: SourceSlot,
    codechef: SourceSlot,
    leetcode: SourceSlot,
}

impl Aggregator {
    pub fn new(config: &AggregatorConfig) -> Result<Self, SourceError> {
        let slot = |platform: Platform| -> Result<SourceSlot, SourceError> {
            let source_config = config.source(platform);
            let source = HttpContestSource::new(platform, source_config, &config.user_agent)?;
            tracing::info!(
                "{} source: url={} timeout={}s retry={:?}",
                platform,
                source.url(),
                source_config.timeout.as_secs(),
                source_config.retry
            );
            Ok(SourceSlot::new(
                Arc::new(source),
                source_config.timeout,
                source_config.retry,
            ))
        };

        Ok(Self {
            codeforces: slot(Platform::Codeforces)?,
            codechef: slot(Platform::CodeChef)?,
            leetcode: slot(Platform::LeetCode)?,
        })
    }

    pub fn with_slots(codeforces: SourceSlot, codechef: SourceSlot, leetcode: SourceSlot) -> Self {
        Self {
            codeforces,
            codechef,
            leetcode,
        }
    }

    fn slot(&self, platform: Platform) -> &SourceSlot {
        match platform {
            Platform::Codeforces => &self.codeforces,
            Platform::CodeChef => &self.codechef,
            Platform::LeetCode => &self.leetcode,
        }
    }

    /// Fetch one source under its timeout and retry policy. Failures are folded into the result.
    pub async fn fetch_source(&self, platform: Platform) -> FetchResult {
        let slot = self.slot(platform);
        let start = Instant::now();
        let label = platform.to_string();

        let result = slot
            .retry
            .run(&label, |_| async move {
                match time::timeout(slot.timeout, slot.source.fetch()).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::TimeoutError(slot.timeout)),
                }
            })
            .await;

        let elapsed = Instant::now().duration_since(start).as_millis();
        match result {
            Ok(data) => {
                tracing::info!("{} fetched in {}ms", platform, elapsed);
                FetchResult::ok(data)
            }
            Err(e) => {
                tracing::error!("failed to fetch {} after {}ms: {:?}", platform, elapsed, e);
                FetchResult::failed(e)
            }
        }
    }

    /// Fetch every source concurrently. Returns after all three have settled.
    pub async fn aggregate(&self) -> AggregateEnvelope {
        let (codeforces, codechef, leetcode) = futures::join!(
            self.fetch_source(Platform::Codeforces),
            self.fetch_source(Platform::CodeChef),
            self.fetch_source(Platform::LeetCode),
        );

        let envelope = AggregateEnvelope::from_results(codeforces, codechef, leetcode, Utc::now());
        if !envelope.success {
            tracing::error!("every source failed: {}", envelope.failure_summary());
        }

        envelope
    }
}
