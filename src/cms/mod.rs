//! # CMS Module
//!
//! Everything that talks to the headless CMS.
//!
//! ## Components
//!
//! - `transport`: request type, `CmsTransport` trait, reqwest transport
//! - `client`: authenticated client, one per provisioning run
//! - `gate`: existence checks guarding every create
//! - `memory`: in-memory CMS used for dry runs and tests
//! - `errors`: typed CMS failures

pub mod client;
pub mod errors;
pub mod gate;
pub mod memory;
pub mod transport;

pub use client::{CmsClient, Credentials};
pub use errors::{CmsError, CmsResult};
pub use gate::{Gate, Lookup, ResourceKey};
pub use memory::InMemoryCms;
pub use transport::{CmsRequest, CmsTransport, HttpTransport, Method};
