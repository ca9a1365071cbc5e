//! Translation of a raw status snapshot into gauge updates.

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::oid::{OidClass, classify};
use crate::registry::{GaugeFamily, SharedRegistry, Upsert};

/// One fetched status snapshot: raw key → raw value.
pub type RawSnapshot = HashMap<String, String>;

/// Counts of what a single translation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Scalar series written (including parse-failure zeros).
    pub scalars_updated: u64,
    /// Event-log entries recorded.
    pub events_recorded: u64,
    /// Event-log entries rejected by the series cap.
    pub events_dropped: u64,
    /// Scalar values that failed to parse and were written as 0.
    pub parse_errors: u64,
    /// Keys that matched nothing.
    pub ignored: u64,
}

/// Writes snapshot values into the registry's series.
pub struct Translator {
    registry: SharedRegistry,
    channel: String,
}

impl Translator {
    /// Create a translator writing scalar series under `channel`.
    pub fn new(registry: SharedRegistry, channel: impl Into<String>) -> Self {
        Self {
            registry,
            channel: channel.into(),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Classify, convert and write every entry of a snapshot.
    pub fn apply(&self, snapshot: &RawSnapshot) -> CycleReport {
        let mut report = CycleReport::default();

        for (key, raw) in snapshot {
            match classify(&self.registry, key) {
                OidClass::Event { event_id } => {
                    let events = self.registry.event_family();
                    match write(events, &[event_id, raw.as_str()], 1.0) {
                        Some(Upsert::Dropped) => {
                            report.events_dropped += 1;
                            warn!(
                                event_id = %event_id,
                                description = %raw,
                                "Event series limit reached, dropping event"
                            );
                        }
                        Some(_) => {
                            report.events_recorded += 1;
                            trace!(event_id = %event_id, description = %raw, "Recorded DOCSIS event");
                        }
                        None => {}
                    }
                }
                OidClass::Scalar(family) => {
                    let value = match parse_gauge_value(raw) {
                        Ok(value) => value,
                        Err(e) => {
                            report.parse_errors += 1;
                            warn!(
                                oid = %key,
                                metric = %family.name(),
                                raw = %raw,
                                error = %e,
                                "Failed to parse value, exporting 0"
                            );
                            0.0
                        }
                    };

                    if write(family, &[self.channel.as_str()], value).is_some() {
                        report.scalars_updated += 1;
                        trace!(oid = %key, metric = %family.name(), value, "Updated metric");
                    }
                }
                OidClass::Unknown => {
                    report.ignored += 1;
                    trace!(oid = %key, "Ignoring untracked key");
                }
            }
        }

        report
    }
}

fn write(family: &GaugeFamily, labels: &[&str], value: f64) -> Option<Upsert> {
    match family.set(labels, value) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!(metric = %family.name(), error = %e, "Failed to write series");
            None
        }
    }
}

/// Parse a raw device value as a gauge reading.
pub fn parse_gauge_value(raw: &str) -> Result<f64, std::num::ParseFloatError> {
    raw.trim().parse::<f64>()
}
