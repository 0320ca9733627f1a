//! CodeSnap · code-completion puzzle backend.
//!
//! Players fill `%SLOT-n%` gaps in an algorithm's source by dropping code
//! blocks into them, one section at a time. A single progression engine
//! tracks the current attempt, the player's rating and the solved set, and
//! is served over HTTP and WebSocket by the `routes` module.

pub mod catalog;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod logic;
pub mod persistence;
pub mod protocol;
pub mod rating;
pub mod routes;
pub mod selection;
pub mod solver;
pub mod state;
pub mod telemetry;
pub mod template;
