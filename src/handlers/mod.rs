//! HTTP handlers

pub mod health;
pub mod index;
pub mod data;
pub mod model;
