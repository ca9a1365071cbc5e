//! OID → gauge family registry and per-family series state.
//!
//! The registry is assembled once at startup through [`RegistryBuilder`] and is
//! structurally immutable afterwards. Each [`GaugeFamily`] owns the mutable
//! series map for its label tuples; the poller is the only writer and the HTTP
//! handler reads concurrently.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::warn;

use crate::config::MetricMapping;
use crate::error::RegistryError;
use crate::exposition::{MetricKind, write_header, write_sample};
use crate::oid::EVENT_LOG_PREFIX;

/// Registry key of the DOCSIS event-log family. It is never matched by exact
/// lookup; event keys are routed by prefix.
pub const EVENT_FAMILY_KEY: &str = "docsis_events";

/// Label carried by every scalar family.
pub const CHANNEL_LABEL: &str = "channel";

/// Labels carried by the event-log family.
pub const EVENT_LABELS: [&str; 2] = ["event_id", "description"];

const SELF_PREFIX: &str = "virgin_exporter";

/// Exporter self-metrics, in render order. Their names are reserved.
const SELF_METRICS: [(&str, &str, MetricKind); 7] = [
    ("scrapes_total", "Scrape cycles attempted", MetricKind::Counter),
    (
        "scrape_failures_total",
        "Scrape cycles aborted by fetch or decode errors",
        MetricKind::Counter,
    ),
    (
        "parse_errors_total",
        "Values that failed numeric conversion and were exported as 0",
        MetricKind::Counter,
    ),
    (
        "events_dropped_total",
        "Event log entries dropped by the series cap",
        MetricKind::Counter,
    ),
    (
        "last_scrape_success",
        "Whether the last scrape cycle succeeded",
        MetricKind::Gauge,
    ),
    (
        "last_scrape_duration_seconds",
        "Duration of the last scrape cycle",
        MetricKind::Gauge,
    ),
    ("series_total", "Series currently exported", MetricKind::Gauge),
];

fn self_metric_name(suffix: &str) -> String {
    format!("{}_{}", SELF_PREFIX, suffix)
}

/// Built-in scalar OIDs for downstream/upstream channel 706.
const BUILTIN_SCALARS: &[(&str, &str, &str)] = &[
    (
        "1.3.6.1.4.1.4491.2.1.21.1.2.1.6.2.3.706",
        "virgin_downstream_frequency_hz",
        "Downstream frequency in Hz",
    ),
    (
        "1.3.6.1.4.1.4491.2.1.21.1.2.1.7.2.3.706",
        "virgin_downstream_symbol_rate",
        "Downstream symbol rate",
    ),
    (
        "1.3.6.1.4.1.4491.2.1.21.1.2.1.8.2.3.706",
        "virgin_downstream_t3_timeouts",
        "T3 timeouts",
    ),
    (
        "1.3.6.1.4.1.4491.2.1.21.1.2.1.9.2.3.706",
        "virgin_downstream_snr_db",
        "Downstream SNR in dB",
    ),
    (
        "1.3.6.1.4.1.4491.2.1.21.1.2.1.4.2.3.706",
        "virgin_upstream_power_dbmv",
        "Upstream power level in dBmV",
    ),
];

/// Static description of one trackable quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Device key (literal OID or [`EVENT_FAMILY_KEY`]).
    pub oid: String,
    /// Prometheus metric name.
    pub name: String,
    /// Help text.
    pub help: String,
    /// Ordered label names, fixed at registration.
    pub label_names: Vec<String>,
}

impl MetricDescriptor {
    /// Descriptor for a scalar OID labelled by channel.
    pub fn scalar(oid: impl Into<String>, name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            name: name.into(),
            help: help.into(),
            label_names: vec![CHANNEL_LABEL.to_string()],
        }
    }

    /// Descriptor for the DOCSIS event-log family.
    pub fn docsis_events() -> Self {
        Self {
            oid: EVENT_FAMILY_KEY.to_string(),
            name: "virgin_docsis_event".to_string(),
            help: "DOCSIS event log entries".to_string(),
            label_names: EVENT_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Result of a series upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First observation of this label tuple.
    Created,
    /// Existing series overwritten.
    Updated,
    /// New tuple rejected because the family is at its series cap.
    Dropped,
}

/// A gauge family: descriptor plus the latest value per label tuple.
#[derive(Debug)]
pub struct GaugeFamily {
    descriptor: MetricDescriptor,
    series: RwLock<HashMap<Vec<String>, f64>>,
    max_series: Option<usize>,
}

impl GaugeFamily {
    /// Create an empty family.
    pub fn new(descriptor: MetricDescriptor) -> Self {
        Self {
            descriptor,
            series: RwLock::new(HashMap::new()),
            max_series: None,
        }
    }

    /// Cap the number of distinct label tuples.
    pub fn with_max_series(mut self, max_series: Option<usize>) -> Self {
        self.max_series = max_series;
        self
    }

    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Set the value for a label tuple, creating the series on first write.
    pub fn set(&self, label_values: &[&str], value: f64) -> Result<Upsert, RegistryError> {
        self.check_arity(label_values)?;
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();

        let mut series = self.series.write();
        if let Some(slot) = series.get_mut(&key) {
            *slot = value;
            return Ok(Upsert::Updated);
        }

        if let Some(max) = self.max_series
            && series.len() >= max
        {
            return Ok(Upsert::Dropped);
        }

        series.insert(key, value);
        Ok(Upsert::Created)
    }

    /// Current value for a label tuple.
    pub fn get(&self, label_values: &[&str]) -> Option<f64> {
        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        self.series.read().get(&key).copied()
    }

    /// Number of label tuples observed so far.
    pub fn series_count(&self) -> usize {
        self.series.read().len()
    }

    /// Render the family, sorted by label values.
    pub fn render<W: Write>(&self, out: &mut W) {
        write_header(out, &self.descriptor.name, &self.descriptor.help, MetricKind::Gauge);

        let series = self.series.read();
        let mut entries: Vec<_> = series.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for (values, value) in entries {
            let labels: Vec<(&str, &str)> = self
                .descriptor
                .label_names
                .iter()
                .map(String::as_str)
                .zip(values.iter().map(String::as_str))
                .collect();
            write_sample(out, &self.descriptor.name, &labels, *value);
        }
    }

    fn check_arity(&self, label_values: &[&str]) -> Result<(), RegistryError> {
        let expected = self.descriptor.label_names.len();
        if label_values.len() != expected {
            return Err(RegistryError::LabelArity {
                name: self.descriptor.name.clone(),
                expected,
                actual: label_values.len(),
            });
        }
        Ok(())
    }
}

/// Scrape statistics exposed as exporter self-metrics.
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    /// Scrape cycles attempted.
    pub scrapes_total: u64,
    /// Cycles aborted by a fetch or decode failure.
    pub scrape_failures_total: u64,
    /// Values that failed numeric conversion and were written as 0.
    pub parse_errors_total: u64,
    /// Event tuples rejected by the series cap.
    pub events_dropped_total: u64,
    /// Whether the most recent cycle succeeded.
    pub last_scrape_success: bool,
    /// Duration of the most recent cycle.
    pub last_scrape_duration: Duration,
}

impl ScrapeStats {
    /// Whether at least one cycle has completed successfully.
    pub fn has_succeeded(&self) -> bool {
        self.scrapes_total > self.scrape_failures_total
    }
}

/// Builder that enforces unique OIDs and metric names.
pub struct RegistryBuilder {
    scalars: Vec<GaugeFamily>,
    by_oid: HashMap<String, usize>,
    names: HashSet<String>,
    events: MetricDescriptor,
    max_event_series: Option<usize>,
}

impl RegistryBuilder {
    fn new() -> Self {
        let events = MetricDescriptor::docsis_events();
        let mut names = HashSet::new();
        names.insert(events.name.clone());
        names.extend(SELF_METRICS.iter().map(|(suffix, _, _)| self_metric_name(suffix)));

        Self {
            scalars: Vec::new(),
            by_oid: HashMap::new(),
            names,
            events,
            max_event_series: None,
        }
    }

    /// Register a scalar descriptor. Duplicates are rejected, never shadowed.
    pub fn register(mut self, descriptor: MetricDescriptor) -> Result<Self, RegistryError> {
        if descriptor.oid == EVENT_FAMILY_KEY || descriptor.oid.starts_with(EVENT_LOG_PREFIX) {
            return Err(RegistryError::DuplicateOid {
                oid: descriptor.oid,
                existing: self.events.name.clone(),
            });
        }

        if let Some(&index) = self.by_oid.get(&descriptor.oid) {
            return Err(RegistryError::DuplicateOid {
                oid: descriptor.oid,
                existing: self.scalars[index].name().to_string(),
            });
        }

        if !self.names.insert(descriptor.name.clone()) {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }

        self.by_oid
            .insert(descriptor.oid.clone(), self.scalars.len());
        self.scalars.push(GaugeFamily::new(descriptor));
        Ok(self)
    }

    /// Cap distinct event-log series; `None` keeps them unbounded.
    pub fn max_event_series(mut self, max: Option<usize>) -> Self {
        self.max_event_series = max;
        self
    }

    pub fn build(self) -> MetricRegistry {
        MetricRegistry {
            scalars: self.scalars,
            by_oid: self.by_oid,
            events: GaugeFamily::new(self.events).with_max_series(self.max_event_series),
            stats: RwLock::new(ScrapeStats::default()),
        }
    }
}

/// The closed set of known metrics plus scrape statistics.
pub struct MetricRegistry {
    scalars: Vec<GaugeFamily>,
    by_oid: HashMap<String, usize>,
    events: GaugeFamily,
    stats: RwLock<ScrapeStats>,
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("scalars", &self.scalars.len())
            .field("events", &self.events.name())
            .finish()
    }
}

impl MetricRegistry {
    /// Start an empty registry (the event family is always present).
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// The built-in hub table, extended with configured mappings.
    pub fn with_builtin(
        extra: &[MetricMapping],
        max_event_series: Option<usize>,
    ) -> Result<Self, RegistryError> {
        let mut builder = Self::builder().max_event_series(max_event_series);

        for (oid, name, help) in BUILTIN_SCALARS {
            builder = builder.register(MetricDescriptor::scalar(*oid, *name, *help))?;
        }

        for mapping in extra {
            builder = builder.register(MetricDescriptor::scalar(
                mapping.oid.as_str(),
                mapping.name.as_str(),
                mapping.help.as_str(),
            ))?;
        }

        Ok(builder.build())
    }

    /// Exact-match lookup of a scalar OID.
    pub fn lookup(&self, oid: &str) -> Option<&GaugeFamily> {
        self.by_oid.get(oid).map(|&index| &self.scalars[index])
    }

    /// The DOCSIS event-log family.
    pub fn event_family(&self) -> &GaugeFamily {
        &self.events
    }

    /// Scalar families in registration order.
    pub fn scalars(&self) -> impl Iterator<Item = &GaugeFamily> {
        self.scalars.iter()
    }

    /// Total series across all families.
    pub fn series_count(&self) -> usize {
        self.scalars
            .iter()
            .map(GaugeFamily::series_count)
            .sum::<usize>()
            + self.events.series_count()
    }

    /// Record a completed cycle.
    pub fn record_success(&self, duration: Duration, parse_errors: u64, events_dropped: u64) {
        let mut stats = self.stats.write();
        stats.scrapes_total += 1;
        stats.parse_errors_total += parse_errors;
        stats.events_dropped_total += events_dropped;
        stats.last_scrape_success = true;
        stats.last_scrape_duration = duration;
    }

    /// Record an aborted cycle.
    pub fn record_failure(&self, duration: Duration) {
        let mut stats = self.stats.write();
        stats.scrapes_total += 1;
        stats.scrape_failures_total += 1;
        stats.last_scrape_success = false;
        stats.last_scrape_duration = duration;
    }

    pub fn stats(&self) -> ScrapeStats {
        self.stats.read().clone()
    }

    /// Render every family and the exporter self-metrics.
    pub fn render(&self) -> String {
        let mut output = Vec::with_capacity(4096);

        for family in &self.scalars {
            family.render(&mut output);
        }
        self.events.render(&mut output);

        let stats = self.stats();
        let series_total = self.series_count();
        writeln!(output).ok();

        let values = [
            stats.scrapes_total as f64,
            stats.scrape_failures_total as f64,
            stats.parse_errors_total as f64,
            stats.events_dropped_total as f64,
            if stats.last_scrape_success { 1.0 } else { 0.0 },
            stats.last_scrape_duration.as_secs_f64(),
            series_total as f64,
        ];

        for ((suffix, help, kind), value) in SELF_METRICS.iter().zip(values) {
            let name = self_metric_name(suffix);
            write_header(&mut output, &name, help, *kind);
            write_sample(&mut output, &name, &[], value);
        }

        String::from_utf8(output).unwrap_or_else(|e| {
            warn!(error = %e, "Exposition output was not valid UTF-8");
            String::new()
        })
    }
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<MetricRegistry>;
