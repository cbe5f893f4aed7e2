//! Shared types for the backup storage audit: data model, settings,
//! site-code naming, cost and metric formulas, error type and display
//! helpers.

pub mod calculations;
pub mod error;
pub mod formatting;
pub mod models;
pub mod pricing;
pub mod settings;
pub mod site_code;
pub mod time_utils;

pub use error::{AuditError, Result};
pub use settings::{AuditSettings, SettingKey};
