//! # Tally
//!
//! Shared metric model for the tally agent and server.
//!
//! A [`Metric`] is either a counter, which accumulates integer deltas, or a
//! gauge, which holds the latest observed float value. Both sides of the
//! pipeline apply the same merge rule through [`Metric::merge`], so an agent's
//! pre-aggregated batch and the server's stored series always agree.
//!
//! ```
//! use tally::Metric;
//!
//! let stored = Metric::counter("hits", 5);
//! let merged = stored.merge(&Metric::counter("hits", 3)).unwrap();
//! assert_eq!(merged, Metric::counter("hits", 8));
//! ```
//!
//! Payloads exchanged over HTTP may be signed with a shared key, see
//! [`signing`].

pub mod address;
pub mod metric;
pub mod signing;

pub use metric::{Metric, MetricError, MetricKind, MetricQuery, SeriesKey};
pub use signing::HASH_HEADER;
