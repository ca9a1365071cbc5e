//! OID key classification.

use crate::registry::{GaugeFamily, MetricRegistry};

/// Prefix of DOCSIS event-log keys (`docsDevEvText`); the event id follows it.
pub const EVENT_LOG_PREFIX: &str = "1.3.6.1.2.1.69.1.5.8.1.7.";

/// How a raw snapshot key maps onto the registry.
#[derive(Debug)]
pub enum OidClass<'a> {
    /// DOCSIS event-log entry with the prefix stripped.
    Event { event_id: &'a str },
    /// Exactly registered scalar OID.
    Scalar(&'a GaugeFamily),
    /// Not tracked.
    Unknown,
}

/// Classify a key. The event-log prefix takes precedence over exact lookup.
pub fn classify<'a>(registry: &'a MetricRegistry, key: &'a str) -> OidClass<'a> {
    if let Some(event_id) = event_id(key) {
        return OidClass::Event { event_id };
    }

    match registry.lookup(key) {
        Some(family) => OidClass::Scalar(family),
        None => OidClass::Unknown,
    }
}

/// Extract the event id from an event-log key.
pub fn event_id(key: &str) -> Option<&str> {
    key.strip_prefix(EVENT_LOG_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id() {
        assert_eq!(event_id("1.3.6.1.2.1.69.1.5.8.1.7.82000100"), Some("82000100"));
        assert_eq!(event_id("1.3.6.1.2.1.69.1.5.8.1.7.3.1"), Some("3.1"));
        assert_eq!(event_id("1.3.6.1.2.1.69.1.5.8.1.7"), None);
        assert_eq!(event_id("1.3.6.1.2.1.69.1.5.8.1.6.82000100"), None);
    }

    #[test]
    fn test_classify() {
        let registry = MetricRegistry::with_builtin(&[], None).unwrap();

        assert!(matches!(
            classify(&registry, "1.3.6.1.2.1.69.1.5.8.1.7.16"),
            OidClass::Event { event_id: "16" }
        ));

        match classify(&registry, "1.3.6.1.4.1.4491.2.1.21.1.2.1.4.2.3.706") {
            OidClass::Scalar(family) => assert_eq!(family.name(), "virgin_upstream_power_dbmv"),
            other => panic!("unexpected class: {:?}", other),
        }

        assert!(matches!(classify(&registry, "foo.bar"), OidClass::Unknown));
        assert!(matches!(classify(&registry, "docsis_events"), OidClass::Unknown));
    }
}
