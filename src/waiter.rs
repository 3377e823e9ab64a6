use crate::browser::Session;
use crate::core::{BrowserTrait, TimeoutConfig};
use crate::resolver::ElementResolver;
use crate::selectors::Slot;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// How a [`CompletionWaiter::wait`] ended. None of these is an error: the
/// caller always goes on to extract whatever result the page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// An indicator was seen and then went away.
    Finished,
    /// No indicator showed up at all; the work may already be done.
    NeverObserved,
    /// An indicator was still present when its ceiling ran out.
    TimedOut,
}

/// Detects the end of asynchronous generation from transient DOM indicators.
#[derive(Debug, Clone)]
pub struct CompletionWaiter {
    resolver: ElementResolver,
    timeouts: TimeoutConfig,
}

impl CompletionWaiter {
    pub fn new(resolver: ElementResolver, timeouts: TimeoutConfig) -> Self {
        Self { resolver, timeouts }
    }

    /// Appear-then-disappear on the thinking indicator, falling back to the
    /// generic loading indicators, then one grace delay whatever happened.
    pub async fn wait<B: BrowserTrait>(&self, session: &Session<B>) -> Completion {
        let t = &self.timeouts;

        let outcome = if self
            .appears(session, Slot::ThinkingIndicator, ms(t.indicator_appear_ms))
            .await
        {
            debug!("thinking indicator visible");
            self.disappears(session, Slot::ThinkingIndicator, ms(t.completion_ceiling_ms))
                .await
        } else if self.resolver.any_visible(session, Slot::LoadingIndicator).await {
            debug!("no thinking indicator, following loading indicators");
            self.disappears(session, Slot::LoadingIndicator, ms(t.fallback_ceiling_ms))
                .await
        } else {
            Completion::NeverObserved
        };

        if outcome == Completion::TimedOut {
            info!("indicator still present at ceiling, continuing anyway");
        }

        tokio::time::sleep(ms(t.grace_ms)).await;
        outcome
    }

    /// Polls for any in-progress indicator up to `ceiling`, returning as soon
    /// as one shows. For actions whose completion happens out of band.
    pub async fn wait_for_start<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        ceiling: Duration,
    ) -> bool {
        let deadline = Instant::now() + ceiling;
        loop {
            if self.resolver.any_visible(session, Slot::ThinkingIndicator).await
                || self.resolver.any_visible(session, Slot::LoadingIndicator).await
            {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                debug!("no in-progress indicator seen");
                return false;
            }
            tokio::time::sleep(self.poll_interval().min(deadline - now)).await;
        }
    }

    async fn appears<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        slot: Slot,
        wait: Duration,
    ) -> bool {
        self.resolver.resolve_one(session, slot, wait).await.is_ok()
    }

    async fn disappears<B: BrowserTrait>(
        &self,
        session: &Session<B>,
        slot: Slot,
        ceiling: Duration,
    ) -> Completion {
        let deadline = Instant::now() + ceiling;
        loop {
            if !self.resolver.any_visible(session, slot).await {
                return Completion::Finished;
            }
            let now = Instant::now();
            if now >= deadline {
                return Completion::TimedOut;
            }
            tokio::time::sleep(self.poll_interval().min(deadline - now)).await;
        }
    }

    fn poll_interval(&self) -> Duration {
        ms(self.timeouts.poll_interval_ms)
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
