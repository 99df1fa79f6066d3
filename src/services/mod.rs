// src/services/mod.rs
pub mod aggregator;
pub mod cache;
pub mod calendar;
pub mod market;
pub mod providers;
pub mod valuation;
