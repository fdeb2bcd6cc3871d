//! Tally metrics server
//!
//! Accepts counter and gauge updates over HTTP and stores them in one of
//! three interchangeable backends: in memory, in memory with a JSON snapshot
//! file, or in a relational database.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
