use serde::Deserialize;

use crate::model::BookingStatus;

/// Strings used to render booking statuses to callers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusVocabulary {
    pub pending: String,
    pub confirmed: String,
    pub cancelled: String,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self {
            pending: "pending".into(),
            confirmed: "confirmed".into(),
            cancelled: "cancelled".into(),
        }
    }
}

impl StatusVocabulary {
    pub fn label(&self, status: BookingStatus) -> &str {
        match status {
            BookingStatus::Pending => &self.pending,
            BookingStatus::Confirmed => &self.confirmed,
            BookingStatus::Cancelled => &self.cancelled,
        }
    }

    pub fn parse(&self, s: &str) -> Option<BookingStatus> {
        if s == self.pending {
            Some(BookingStatus::Pending)
        } else if s == self.confirmed {
            Some(BookingStatus::Confirmed)
        } else if s == self.cancelled {
            Some(BookingStatus::Cancelled)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub statuses: StatusVocabulary,
    /// Bookable items lock the cart they sit in.
    pub lock_cart: bool,
    /// Bookable products may carry a deliverable component (e.g. posted tickets).
    pub allow_delivery: bool,
    /// Stock level reported for capacity providers so ordinary stock
    /// decrement logic never blocks them.
    pub unlimited_stock_level: i64,
    pub metrics_port: Option<u16>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            statuses: StatusVocabulary::default(),
            lock_cart: true,
            allow_delivery: false,
            unlimited_stock_level: 9999,
            metrics_port: None,
        }
    }
}

impl EngineConfig {
    /// Read `BOOKABLE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|s| match s.to_ascii_lowercase().as_str() {
                    "1" | "true" | "yes" | "on" => Some(true),
                    "0" | "false" | "no" | "off" => Some(false),
                    _ => None,
                })
                .unwrap_or(default)
        };
        Self {
            statuses: StatusVocabulary {
                pending: lookup("BOOKABLE_STATUS_PENDING").unwrap_or(defaults.statuses.pending),
                confirmed: lookup("BOOKABLE_STATUS_CONFIRMED")
                    .unwrap_or(defaults.statuses.confirmed),
                cancelled: lookup("BOOKABLE_STATUS_CANCELLED")
                    .unwrap_or(defaults.statuses.cancelled),
            },
            lock_cart: flag("BOOKABLE_LOCK_CART", defaults.lock_cart),
            allow_delivery: flag("BOOKABLE_ALLOW_DELIVERY", defaults.allow_delivery),
            unlimited_stock_level: lookup("BOOKABLE_UNLIMITED_STOCK")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.unlimited_stock_level),
            metrics_port: lookup("BOOKABLE_METRICS_PORT").and_then(|s| s.parse().ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.statuses.label(BookingStatus::Pending), "pending");
        assert_eq!(cfg.statuses.label(BookingStatus::Confirmed), "confirmed");
        assert_eq!(cfg.statuses.label(BookingStatus::Cancelled), "cancelled");
        assert!(cfg.lock_cart);
        assert!(!cfg.allow_delivery);
        assert_eq!(cfg.unlimited_stock_level, 9999);
    }

    #[test]
    fn json_partial_overrides() {
        let cfg = EngineConfig::from_json(
            r#"{"statuses": {"confirmed": "booked"}, "allow_delivery": true}"#,
        )
        .unwrap();
        assert_eq!(cfg.statuses.confirmed, "booked");
        assert_eq!(cfg.statuses.pending, "pending");
        assert!(cfg.allow_delivery);
        assert!(cfg.lock_cart);
    }

    #[test]
    fn lookup_reads_vars() {
        let vars: HashMap<&str, &str> = [
            ("BOOKABLE_STATUS_CANCELLED", "void"),
            ("BOOKABLE_LOCK_CART", "off"),
            ("BOOKABLE_UNLIMITED_STOCK", "500"),
            ("BOOKABLE_METRICS_PORT", "9100"),
        ]
        .into_iter()
        .collect();
        let cfg = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.statuses.cancelled, "void");
        assert!(!cfg.lock_cart);
        assert_eq!(cfg.unlimited_stock_level, 500);
        assert_eq!(cfg.metrics_port, Some(9100));
    }

    #[test]
    fn lookup_ignores_garbage() {
        let cfg = EngineConfig::from_lookup(|k| {
            (k == "BOOKABLE_LOCK_CART" || k == "BOOKABLE_METRICS_PORT").then(|| "maybe".to_string())
        });
        assert!(cfg.lock_cart);
        assert_eq!(cfg.metrics_port, None);
    }

    #[test]
    fn parse_roundtrips_custom_vocabulary() {
        let vocab = StatusVocabulary {
            pending: "held".into(),
            confirmed: "booked".into(),
            cancelled: "void".into(),
        };
        assert_eq!(vocab.parse("booked"), Some(BookingStatus::Confirmed));
        assert_eq!(vocab.parse("confirmed"), None);
        assert_eq!(vocab.label(BookingStatus::Pending), "held");
    }
}
