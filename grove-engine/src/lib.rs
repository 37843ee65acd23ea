// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local engine for Bamboo append-only logs.
//!
//! A [`Grove`] owns a spool directory holding any number of named
//! clumps; each clump bundles a content store, a block set and cached
//! change tokens, while keypairs are global to the spool. The engine
//! appends to and reads from logs, validates entries up to their
//! certificate pool, compacts logs down to what tip verification needs,
//! and imports and exports whole spools.
//!
//! ## Example
//!
//! ```no_run
//! use grove_engine::{Grove, Options, Seq};
//! use grove_store::KeyMaterial;
//!
//! # fn main() -> Result<(), grove_engine::GroveError> {
//! let grove = Grove::open("/tmp/spool")?;
//! grove.create_identity("ada", KeyMaterial::Generate)?;
//!
//! let opts = Options::default();
//! grove.append(b"Hello, grove!", "ada", &opts)?;
//! let entry = grove.entry("ada", Seq::Max, &opts)?;
//! assert_eq!(entry.payload.as_deref(), Some(b"Hello, grove!".as_slice()));
//! # Ok(())
//! # }
//! ```

mod blocks;
mod error;
mod grove;
mod interchange;
mod log;
mod options;
mod validate;

pub use blocks::BlockTarget;
pub use error::GroveError;
pub use grove::{Grove, DEFAULT_CLUMP, STORE_HASH_SIZE};
pub use options::{Options, Seq};

pub use grove_core::{Entry, PrivateKey, PublicKey, YamfHash};
pub use grove_store::{BlockSpec, KeyKind, KeyMaterial, Part, StatusKind};
