//! Breathable Commute API.
//!
//! Fetches current PM2.5 and weather for a set of points from Open-Meteo,
//! concurrently and with retries, and turns them into cycling recommendations
//! and hazard warnings.

pub mod config;
pub mod errors;
pub mod helpers;
pub mod models;
pub mod routes;
pub mod services;
