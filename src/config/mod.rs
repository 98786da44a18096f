//! Configuration management for mailprobe.
//!
//! Provides XDG-compliant storage for application settings.

mod settings;

pub use settings::{AppSettings, Paths};
