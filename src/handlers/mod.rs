// src/handlers/mod.rs
pub mod cache;
pub mod error;
pub mod health;
pub mod market;
