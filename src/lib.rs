//! Stockrush Game Server Library
//!
//! Core components for the stockrush turn-based stock trading game:
//! session state machine, trading engine, price timelines, news gate,
//! turn controller and leaderboards.

pub mod application;
pub mod auth;
pub mod config;
pub mod domain;
pub mod persistence;
