//! hotel-cms - schema provisioning for the hotel collection's headless CMS
//!
//! Provisions collections, fields, relations, permissions and seed content
//! into a Directus instance, idempotently and in a fixed stage order. Also
//! carries the site's pure UI state logic (booking quote, gallery).

pub mod cli;
pub mod cms;
pub mod config;
pub mod config_validator;
pub mod diagnostics;
pub mod observability;
pub mod provision;
pub mod schema;
pub mod ui;
