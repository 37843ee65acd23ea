// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed on-disk stores for grove append-only logs.
//!
//! Four store types cover the engine's persistence: entry and payload
//! bytes per log position ([`ContentStore`]), keypairs under caller-chosen
//! aliases ([`IdentityStore`]), the block set constraining what may be
//! stored ([`MetadataStore`]) and cached change tokens ([`StatusStore`]).
//! Each store owns one embedded database file; every public mutation is a
//! single transaction, so a crash leaves either the old or the new state
//! but never a partial record.

pub mod content;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod status;

pub use content::{ContentStore, KeyPattern, LogKey, Part, StoredRecord, CONTENT_FILE};
pub use error::StoreError;
pub use identity::{IdentityStore, IdentityStoreError, KeyKind, KeyMaterial, IDENTITY_FILE};
pub use metadata::{BlockSpec, MetadataStore, METADATA_FILE};
pub use status::{StatusKind, StatusStore, STATUS_FILE};
