//! Chamber Monitoring Backend Library
//!
//! This library provides the core functionality for the chamber monitoring service,
//! including:
//! - Device ingestion of temperature, humidity, pressure and CO2 readings
//! - Cadence-based down-sampling of each chamber's time series
//! - CSV and PDF report exports over a local-time window
//! - Per-chamber access control and user administration

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod schema;
pub mod services;
