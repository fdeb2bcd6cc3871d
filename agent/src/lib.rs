pub mod aggregator;
pub mod app;
pub mod collector;
pub mod core;
pub mod delivery;
pub mod pipeline;
