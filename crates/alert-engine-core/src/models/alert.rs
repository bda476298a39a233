//! Alert data models

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{self, Error};

/// Unique, stable identity of an alert
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertName(pub String);

/// Identifier passed to the metrics backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryName(pub String);

/// Human-readable message attached to a threshold
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertMessage(pub String);

macro_rules! string_newtype {
    ($($name:ident),*) => {$(
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl $name {
            /// Borrow the underlying string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    )*};
}

string_newtype!(AlertName, QueryName, AlertMessage);

/// A single trigger value plus the message reported when it is met
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub message: AlertMessage,
    pub value: f64,
}

/// The warn/critical pair of an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warn: Threshold,
    pub critical: Threshold,
}

impl Thresholds {
    /// Map a metric sample to a severity.
    ///
    /// Critical wins over warn when both are met. Comparisons against NaN are
    /// all false, so a NaN sample evaluates to [`AlertSeverity::Pass`];
    /// `+inf` is critical and `-inf` passes.
    pub fn evaluate(&self, value: f64) -> AlertSeverity {
        if value >= self.critical.value {
            AlertSeverity::Critical(self.critical.message.clone())
        } else if value >= self.warn.value {
            AlertSeverity::Warn(self.warn.message.clone())
        } else {
            AlertSeverity::Pass
        }
    }
}

/// Free-function form of [`Thresholds::evaluate`]
pub fn evaluate(value: f64, thresholds: &Thresholds) -> AlertSeverity {
    thresholds.evaluate(value)
}

/// An alert definition as served by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDefinition {
    pub name: AlertName,

    /// Query evaluated on every poll
    pub query: QueryName,

    /// Time between two polls
    #[serde(rename = "intervalSecs", with = "seconds")]
    pub poll_interval: Duration,

    /// Time between two notifications while the alert is not passing
    #[serde(rename = "repeatIntervalSecs", with = "seconds")]
    pub repeat_interval: Duration,

    #[serde(flatten)]
    pub thresholds: Thresholds,
}

impl AlertDefinition {
    /// Reject definitions the supervisor cannot run sensibly
    pub fn validate(&self) -> error::Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::validation(format!(
                "alert '{}' has a zero poll interval",
                self.name
            )));
        }
        if self.repeat_interval.is_zero() {
            return Err(Error::validation(format!(
                "alert '{}' has a zero repeat interval",
                self.name
            )));
        }
        if self.thresholds.critical.value < self.thresholds.warn.value {
            return Err(Error::validation(format!(
                "alert '{}' has critical threshold {} below warn threshold {}",
                self.name, self.thresholds.critical.value, self.thresholds.warn.value
            )));
        }
        Ok(())
    }

    /// The notification action a severity calls for on this alert
    pub fn action_for(&self, severity: &AlertSeverity) -> NotificationAction {
        match severity {
            AlertSeverity::Pass => NotificationAction::ResolveOnce,
            AlertSeverity::Warn(message) | AlertSeverity::Critical(message) => {
                NotificationAction::Repeat {
                    message: message.clone(),
                    interval: self.repeat_interval,
                }
            }
        }
    }
}

/// Evaluated state of an alert at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AlertSeverity {
    #[default]
    Pass,
    Warn(AlertMessage),
    Critical(AlertMessage),
}

impl AlertSeverity {
    /// Short lowercase label, used in logs and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn(_) => "warn",
            Self::Critical(_) => "critical",
        }
    }

    /// Message carried by a non-passing severity
    pub fn message(&self) -> Option<&AlertMessage> {
        match self {
            Self::Pass => None,
            Self::Warn(message) | Self::Critical(message) => Some(message),
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{}({})", self.label(), message),
            None => f.write_str(self.label()),
        }
    }
}

/// What a reporter has to do for a severity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationAction {
    /// Notify now, then again every `interval` until superseded
    Repeat {
        message: AlertMessage,
        interval: Duration,
    },
    /// Resolve exactly once
    ResolveOnce,
}

/// Durations encoded as (possibly fractional) seconds
mod seconds {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
