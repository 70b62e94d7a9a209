//! Domain layer for the ride platform backend.
//!
//! This crate contains:
//! - Domain models (Rider, Driver, Ride, Trip, Payment)
//! - Ride and trip state machines
//! - Pure business services (fare calculation, candidate ranking)
//! - The payment gateway facade trait

pub mod models;
pub mod services;
