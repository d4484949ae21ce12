//! Request handlers

pub mod health;
pub mod detection;
pub mod flags;
pub mod alerts;
pub mod reports;
