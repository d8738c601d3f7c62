//! Axum HTTP handlers.

pub mod health;
pub mod images;
pub mod search;
