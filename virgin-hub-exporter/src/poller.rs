//! Periodic scrape loop.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;
use crate::source::SnapshotSource;
use crate::translator::{CycleReport, Translator};

/// Runs fetch + translate cycles back to back, pausing between them.
///
/// A cycle never overlaps the next one: the pause starts only once the
/// previous cycle has finished, so there is one fetch in flight and one
/// writer at a time.
pub struct ScrapePoller<S> {
    source: S,
    translator: Translator,
    interval: Duration,
}

impl<S: SnapshotSource> ScrapePoller<S> {
    /// Create a poller pausing `interval` between cycles.
    pub fn new(source: S, translator: Translator, interval: Duration) -> Self {
        Self {
            source,
            translator,
            interval,
        }
    }

    /// Run one cycle and record its outcome in the registry statistics.
    ///
    /// On error nothing has been written.
    pub async fn scrape_once(&self) -> Result<CycleReport, ScrapeError> {
        let started = Instant::now();
        let registry = self.translator.registry();

        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                registry.record_failure(started.elapsed());
                return Err(e);
            }
        };

        let report = self.translator.apply(&snapshot);
        let elapsed = started.elapsed();
        registry.record_success(elapsed, report.parse_errors, report.events_dropped);

        info!(
            keys = snapshot.len(),
            scalars = report.scalars_updated,
            events = report.events_recorded,
            parse_errors = report.parse_errors,
            ignored = report.ignored,
            elapsed_ms = elapsed.as_millis() as u64,
            "Scrape complete"
        );

        Ok(report)
    }

    /// Run until the shutdown signal fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            source = %self.source.describe(),
            interval_secs = self.interval.as_secs(),
            "Starting hub poller"
        );

        loop {
            debug!(source = %self.source.describe(), "Scraping hub status");

            if let Err(e) = self.scrape_once().await {
                warn!(
                    source = %self.source.describe(),
                    error = %e,
                    "Scrape failed, keeping previous values"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Hub poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetricRegistry;
    use crate::translator::RawSnapshot;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    const SNR_OID: &str = "1.3.6.1.4.1.4491.2.1.21.1.2.1.9.2.3.706";

    /// Replays queued results, then decode errors once exhausted.
    struct ScriptedSource {
        results: Mutex<VecDeque<Result<RawSnapshot, ScrapeError>>>,
        fetches: Mutex<u32>,
    }

    impl ScriptedSource {
        fn new(results: Vec<Result<RawSnapshot, ScrapeError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                fetches: Mutex::new(0),
            }
        }
    }

    impl SnapshotSource for ScriptedSource {
        async fn fetch(&self) -> Result<RawSnapshot, ScrapeError> {
            *self.fetches.lock() += 1;
            let next = self.results.lock().pop_front();
            next.unwrap_or_else(|| Err(decode_error()))
        }

        fn describe(&self) -> &str {
            "scripted"
        }
    }

    fn decode_error() -> ScrapeError {
        ScrapeError::Decode(serde_json::from_str::<RawSnapshot>("[]").unwrap_err())
    }

    fn snr(value: &str) -> RawSnapshot {
        [(SNR_OID.to_string(), value.to_string())].into_iter().collect()
    }

    fn translator() -> Translator {
        Translator::new(Arc::new(MetricRegistry::with_builtin(&[], None).unwrap()), "706")
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_previous_values() {
        let poller = ScrapePoller::new(
            ScriptedSource::new(vec![Ok(snr("38.5")), Err(decode_error())]),
            translator(),
            Duration::from_secs(30),
        );

        poller.scrape_once().await.unwrap();
        assert!(poller.scrape_once().await.is_err());

        let registry = poller.translator.registry();
        assert_eq!(registry.lookup(SNR_OID).unwrap().get(&["706"]), Some(38.5));

        let stats = registry.stats();
        assert_eq!(stats.scrapes_total, 2);
        assert_eq!(stats.scrape_failures_total, 1);
        assert!(!stats.last_scrape_success);
    }

    #[tokio::test]
    async fn test_parse_errors_counted() {
        let poller = ScrapePoller::new(
            ScriptedSource::new(vec![Ok(snr("garbage"))]),
            translator(),
            Duration::from_secs(30),
        );

        let report = poller.scrape_once().await.unwrap();
        assert_eq!(report.parse_errors, 1);
        assert_eq!(poller.translator.registry().stats().parse_errors_total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_pauses_between_cycles_and_stops() {
        let source = ScriptedSource::new(vec![Ok(snr("1")), Ok(snr("2")), Ok(snr("3"))]);
        let translator = translator();
        let registry = translator.registry().clone();
        let poller = ScrapePoller::new(source, translator, Duration::from_secs(30));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(rx));

        // First cycle runs immediately.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(registry.stats().scrapes_total, 1);

        // Second cycle after one interval.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(registry.stats().scrapes_total, 2);
        assert_eq!(registry.lookup(SNR_OID).unwrap().get(&["706"]), Some(2.0));

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(registry.stats().scrapes_total, 2);
    }
}
