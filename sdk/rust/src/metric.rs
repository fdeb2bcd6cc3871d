//! Metric value type and merge rule

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors raised while decoding, validating or merging metrics
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("metric id must not be empty")]
    EmptyId,

    #[error("unknown metric type: {0}")]
    UnknownKind(String),

    #[error("{kind} metric {id} has no {field} field")]
    MissingPayload {
        id: String,
        kind: MetricKind,
        field: &'static str,
    },

    #[error("{kind} metric {id} must not carry a {field} field")]
    ConflictingPayload {
        id: String,
        kind: MetricKind,
        field: &'static str,
    },

    #[error("cannot merge {incoming} into {existing} series {id}")]
    KindMismatch {
        id: String,
        existing: MetricKind,
        incoming: MetricKind,
    },

    #[error("counter {id} overflowed")]
    Overflow { id: String },

    #[error("invalid {kind} value {value:?}")]
    InvalidValue { kind: MetricKind, value: String },
}

/// Variant tag of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(Self::Counter),
            "gauge" => Ok(Self::Gauge),
            other => Err(MetricError::UnknownKind(other.to_string())),
        }
    }
}

/// Identity of a series: the same id under different kinds is two series.
///
/// The string form is `kind:id`, e.g. `counter:PollCount`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub kind: MetricKind,
    pub id: String,
}

impl SeriesKey {
    pub fn new(kind: MetricKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for SeriesKey {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| MetricError::UnknownKind(s.to_string()))?;
        if id.is_empty() {
            return Err(MetricError::EmptyId);
        }
        Ok(Self::new(kind.parse()?, id))
    }
}

impl Serialize for SeriesKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SeriesKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A single metric observation or stored series value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetricPayload", into = "MetricPayload")]
pub enum Metric {
    Counter { id: String, delta: i64 },
    Gauge { id: String, value: f64 },
}

impl Metric {
    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self::Counter {
            id: id.into(),
            delta,
        }
    }

    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self::Gauge {
            id: id.into(),
            value,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Counter { id, .. } | Self::Gauge { id, .. } => id,
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Counter { .. } => MetricKind::Counter,
            Self::Gauge { .. } => MetricKind::Gauge,
        }
    }

    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::new(self.kind(), self.id())
    }

    /// Check the invariants a value must hold before it may be merged or stored
    pub fn validate(&self) -> Result<(), MetricError> {
        if self.id().is_empty() {
            return Err(MetricError::EmptyId);
        }
        if let Self::Gauge { value, .. } = self
            && !value.is_finite()
        {
            return Err(MetricError::InvalidValue {
                kind: MetricKind::Gauge,
                value: value.to_string(),
            });
        }
        Ok(())
    }

    /// Apply `incoming` on top of `self`.
    ///
    /// Counters add their deltas, gauges take the incoming value. Merging
    /// different kinds, or a counter sum that does not fit in an `i64`, is
    /// rejected and leaves `self` untouched.
    pub fn merge(&self, incoming: &Metric) -> Result<Metric, MetricError> {
        incoming.validate()?;
        match (self, incoming) {
            (Self::Counter { id, delta }, Self::Counter { delta: add, .. }) => {
                let delta = delta
                    .checked_add(*add)
                    .ok_or_else(|| MetricError::Overflow { id: id.clone() })?;
                Ok(Self::Counter {
                    id: id.clone(),
                    delta,
                })
            }
            (Self::Gauge { .. }, Self::Gauge { .. }) => Ok(incoming.clone()),
            _ => Err(MetricError::KindMismatch {
                id: self.id().to_string(),
                existing: self.kind(),
                incoming: incoming.kind(),
            }),
        }
    }

    /// Merge against an optional existing entry; an absent entry is seeded with `incoming`
    pub fn merge_into(existing: Option<&Metric>, incoming: &Metric) -> Result<Metric, MetricError> {
        match existing {
            Some(current) => current.merge(incoming),
            None => {
                incoming.validate()?;
                Ok(incoming.clone())
            }
        }
    }

    /// Build a metric from the path segments of `/update/{type}/{name}/{value}`
    pub fn parse(kind: &str, id: &str, raw: &str) -> Result<Metric, MetricError> {
        let kind: MetricKind = kind.parse()?;
        let invalid = || MetricError::InvalidValue {
            kind,
            value: raw.to_string(),
        };
        let metric = match kind {
            MetricKind::Counter => Metric::counter(id, raw.parse().map_err(|_| invalid())?),
            MetricKind::Gauge => Metric::gauge(id, raw.parse().map_err(|_| invalid())?),
        };
        metric.validate()?;
        Ok(metric)
    }

    /// Plain-text rendering of the value
    pub fn value_string(&self) -> String {
        match self {
            Self::Counter { delta, .. } => delta.to_string(),
            Self::Gauge { value, .. } => value.to_string(),
        }
    }

    /// Same series with a zero payload
    pub fn zeroed(&self) -> Metric {
        match self {
            Self::Counter { id, .. } => Metric::counter(id.clone(), 0),
            Self::Gauge { id, .. } => Metric::gauge(id.clone(), 0.0),
        }
    }
}

/// Wire form of a metric: `{"id", "type", "delta"?, "value"?}`
#[derive(Debug, Serialize, Deserialize)]
struct MetricPayload {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

impl TryFrom<MetricPayload> for Metric {
    type Error = MetricError;

    fn try_from(payload: MetricPayload) -> Result<Self, Self::Error> {
        let kind: MetricKind = payload.kind.parse()?;
        let field_error = |field, conflicting| {
            let id = payload.id.clone();
            if conflicting {
                MetricError::ConflictingPayload { id, kind, field }
            } else {
                MetricError::MissingPayload { id, kind, field }
            }
        };
        let metric = match kind {
            MetricKind::Counter => {
                if payload.value.is_some() {
                    return Err(field_error("value", true));
                }
                let delta = payload.delta.ok_or_else(|| field_error("delta", false))?;
                Metric::counter(payload.id.clone(), delta)
            }
            MetricKind::Gauge => {
                if payload.delta.is_some() {
                    return Err(field_error("delta", true));
                }
                let value = payload.value.ok_or_else(|| field_error("value", false))?;
                Metric::gauge(payload.id.clone(), value)
            }
        };
        metric.validate()?;
        Ok(metric)
    }
}

impl From<Metric> for MetricPayload {
    fn from(metric: Metric) -> Self {
        let kind = metric.kind().as_str().to_string();
        match metric {
            Metric::Counter { id, delta } => Self {
                id,
                kind,
                delta: Some(delta),
                value: None,
            },
            Metric::Gauge { id, value } => Self {
                id,
                kind,
                delta: None,
                value: Some(value),
            },
        }
    }
}

/// Lookup body of `POST /value/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}
