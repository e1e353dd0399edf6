//! Epicor Kinetic remote store.
//!
//! The catalog is an updatable BAQ over user table `UD05`; one row per
//! posted version. Content lives in the Epicor file store and is addressed
//! by the row's file id.

pub mod auth;
pub mod client;
pub mod provider;

pub use auth::{Credentials, EpicorConfig};
pub use client::{EpicorClient, GembaFileRow};
pub use provider::{parse_post_date, EpicorProvider};
