//! Reddit auto-poster backend.
//!
//! Generates Reddit posts with a text-generation API (trying models in
//! order), connects Reddit accounts over OAuth, posts on the user's behalf
//! when they consent, and streams simulated trend ticks to the dashboard.

pub mod config;
pub mod constants;
pub mod db;
pub mod generation;
pub mod reddit;
pub mod trends;
pub mod web;
