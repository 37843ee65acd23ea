// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use tracing::{debug, info};

use grove_core::{base62, PublicKey};
use grove_store::{
    ContentStore, IdentityStore, IdentityStoreError, KeyKind, KeyMaterial, MetadataStore,
    StatusKind, StatusStore, CONTENT_FILE, IDENTITY_FILE, METADATA_FILE, STATUS_FILE,
};

use crate::GroveError;

/// Clump every operation defaults to.
pub const DEFAULT_CLUMP: &str = "default";

/// Width in bytes of the store-hash change token.
pub const STORE_HASH_SIZE: usize = 8;

const BASE62_KEY_SIZE: usize = 43;
const RAW_KEY_SIZE: usize = 32;

/// Store bundle of one clump.
pub(crate) struct Clump {
    pub(crate) content: ContentStore,
    pub(crate) metadata: MetadataStore,
    pub(crate) status: StatusStore,

    /// Serializes appends and compactions per clump so sequence numbers
    /// never collide under concurrent writers.
    pub(crate) write_lock: Mutex<()>,
}

impl Clump {
    fn open(spool_dir: &Path, name: &str) -> Result<Self, GroveError> {
        let dir = spool_dir.join(name);
        fs::create_dir_all(&dir)?;

        Ok(Self {
            content: ContentStore::open(dir.join(CONTENT_FILE))?,
            metadata: MetadataStore::open(dir.join(METADATA_FILE))?,
            status: StatusStore::open(dir.join(STATUS_FILE))?,
            write_lock: Mutex::new(()),
        })
    }
}

/// Engine over one spool directory.
///
/// Holds open handles to every store; all operations go through one
/// `Grove` value, which assumes exclusive ownership of the spool for its
/// lifetime. Callers may share it across threads.
pub struct Grove {
    spool_dir: PathBuf,
    pub(crate) identities: IdentityStore,
    clumps: RwLock<BTreeMap<String, Arc<Clump>>>,
}

impl Grove {
    /// Opens a spool, discovering existing clumps and materializing the
    /// default one.
    pub fn open(spool_dir: impl Into<PathBuf>) -> Result<Self, GroveError> {
        let spool_dir = spool_dir.into();
        fs::create_dir_all(&spool_dir)?;

        let identities = IdentityStore::open(spool_dir.join(IDENTITY_FILE))?;

        let mut clumps = BTreeMap::new();
        for dir_entry in fs::read_dir(&spool_dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if !path.is_dir() || !path.join(CONTENT_FILE).is_file() {
                continue;
            }
            if let Some(name) = dir_entry.file_name().to_str() {
                clumps.insert(
                    name.to_string(),
                    Arc::new(Clump::open(&spool_dir, name)?),
                );
            }
        }

        let grove = Self {
            spool_dir,
            identities,
            clumps: RwLock::new(clumps),
        };
        grove.clump_or_create(DEFAULT_CLUMP)?;

        info!(spool = %grove.spool_dir.display(), "opened spool");
        Ok(grove)
    }

    /// Path of the spool directory.
    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Every clump of this spool, sorted.
    pub fn clumps(&self) -> Vec<String> {
        self.clumps
            .read()
            .expect("clump map lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Handle of an existing clump.
    pub(crate) fn clump(&self, clump_id: &str) -> Result<Arc<Clump>, GroveError> {
        self.clumps
            .read()
            .expect("clump map lock poisoned")
            .get(clump_id)
            .cloned()
            .ok_or_else(|| GroveError::UnknownClumpId(clump_id.to_string()))
    }

    /// Handle of a clump, materializing it on first use.
    pub(crate) fn clump_or_create(&self, clump_id: &str) -> Result<Arc<Clump>, GroveError> {
        if let Some(clump) = self
            .clumps
            .read()
            .expect("clump map lock poisoned")
            .get(clump_id)
        {
            return Ok(clump.clone());
        }

        validate_clump_id(clump_id)?;

        let mut clumps = self.clumps.write().expect("clump map lock poisoned");
        if let Some(clump) = clumps.get(clump_id) {
            return Ok(clump.clone());
        }

        debug!(clump = clump_id, "materializing clump");
        let clump = Arc::new(Clump::open(&self.spool_dir, clump_id)?);
        clumps.insert(clump_id.to_string(), clump.clone());
        Ok(clump)
    }

    // ------------------------------------------------------------------
    // Identities
    // ------------------------------------------------------------------

    /// Creates (or overwrites) an identity and returns its public key.
    pub fn create_identity(
        &self,
        alias: &str,
        material: KeyMaterial,
    ) -> Result<PublicKey, GroveError> {
        let public = self.identities.create(alias, material)?;
        self.touch_identity()?;
        debug!(alias, author = %public, "created identity");
        Ok(public)
    }

    /// Moves an identity to a new alias, keys preserved.
    pub fn rename_identity(&self, old: &str, new: &str) -> Result<PublicKey, GroveError> {
        let public = self.identities.rename(old, new)?;
        self.touch_identity()?;
        Ok(public)
    }

    /// Destroys an identity, secret key included.
    pub fn drop_identity(&self, alias: &str) -> Result<(), GroveError> {
        self.identities.drop_identity(alias)?;
        self.touch_identity()?;
        debug!(alias, "dropped identity");
        Ok(())
    }

    /// Every `(alias, public key)` pair, sorted by alias.
    pub fn identities(&self) -> Result<Vec<(String, PublicKey)>, GroveError> {
        Ok(self.identities.list()?)
    }

    /// Exports key bytes for an alias.
    pub fn identity_key(&self, alias: &str, kind: KeyKind) -> Result<Vec<u8>, GroveError> {
        Ok(self.identities.key(alias, kind)?)
    }

    // ------------------------------------------------------------------
    // Author resolution
    // ------------------------------------------------------------------

    /// Resolves any accepted author reference to base62 key text.
    ///
    /// In order: `~prefix` search over known authors, 43 characters
    /// passed through as base62, 32 bytes taken as a raw key, anything
    /// else looked up as an alias.
    pub fn resolve_author(&self, reference: &str) -> Result<String, GroveError> {
        if let Some(prefix) = reference.strip_prefix('~') {
            return self.resolve_prefix(reference, prefix);
        }

        if reference.len() == BASE62_KEY_SIZE {
            return Ok(reference.to_string());
        }

        // Keys with a small leading byte encode a character or two
        // short of the usual 43; accept any text that decodes to a full
        // key before falling back to alias lookup.
        if (BASE62_KEY_SIZE - 2..BASE62_KEY_SIZE).contains(&reference.len()) {
            if let Ok(bytes) = base62::decode(reference) {
                if bytes.len() == RAW_KEY_SIZE {
                    return Ok(reference.to_string());
                }
            }
        }

        if reference.len() == RAW_KEY_SIZE {
            return Ok(base62::encode(reference.as_bytes()));
        }

        match self.identities.public_key(reference) {
            Ok(public) => Ok(public.to_base62()),
            Err(IdentityStoreError::NoSuchIdentity(_)) => {
                Err(GroveError::UnknownIdentity(reference.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves a reference all the way to a public key.
    pub(crate) fn resolve_key(&self, reference: &str) -> Result<PublicKey, GroveError> {
        Ok(PublicKey::from_base62(&self.resolve_author(reference)?)?)
    }

    /// Prefix search over content-store authors of every clump plus the
    /// publics of the identity store; the match must be unique.
    fn resolve_prefix(&self, reference: &str, prefix: &str) -> Result<String, GroveError> {
        let mut candidates = BTreeSet::new();

        let clumps = self.clumps.read().expect("clump map lock poisoned");
        for clump in clumps.values() {
            for author in clump.content.authors()? {
                candidates.insert(author.to_base62());
            }
        }
        drop(clumps);

        for public in self.identities.publics()? {
            candidates.insert(public.to_base62());
        }

        let mut matches = candidates
            .into_iter()
            .filter(|candidate| candidate.starts_with(prefix));

        match (matches.next(), matches.next()) {
            (Some(full), None) => Ok(full),
            _ => Err(GroveError::UnknownIdentity(reference.to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Store hashes
    // ------------------------------------------------------------------

    /// Current change token for a clump's content or the global
    /// identity table.
    ///
    /// Cached until the source table mutates; recomputed lazily. The
    /// token is deterministic over store contents, so restoring the same
    /// records restores the same token.
    pub fn current_hash(&self, kind: StatusKind, clump_id: &str) -> Result<String, GroveError> {
        let clump = self.clump(clump_id)?;

        if let Some(digest) = clump.status.cached(kind)? {
            return Ok(digest);
        }

        let digest = match kind {
            StatusKind::Content => self.content_digest(&clump)?,
            StatusKind::Identity => self.identity_digest()?,
        };
        clump.status.set(kind, &digest)?;

        Ok(digest)
    }

    fn content_digest(&self, clump: &Clump) -> Result<String, GroveError> {
        let hasher = new_hasher();
        let hasher = clump.content.fold(hasher, |mut hasher, key, record| {
            hasher.update(&key.to_bytes());
            for half in [&record.entry, &record.payload] {
                match half {
                    Some(bytes) => {
                        hasher.update(&(bytes.len() as u64).to_be_bytes());
                        hasher.update(bytes);
                    }
                    None => hasher.update(&u64::MAX.to_be_bytes()),
                }
            }
            hasher
        })?;

        Ok(finish_hasher(hasher))
    }

    fn identity_digest(&self) -> Result<String, GroveError> {
        let mut hasher = new_hasher();
        for (alias, public) in self.identities.list()? {
            hasher.update(&(alias.len() as u64).to_be_bytes());
            hasher.update(alias.as_bytes());
            hasher.update(&public.to_bytes());
        }

        Ok(finish_hasher(hasher))
    }

    /// Drops the content token of one clump after a mutation.
    pub(crate) fn touch_content(&self, clump: &Clump) -> Result<(), GroveError> {
        clump.status.invalidate(StatusKind::Content)?;
        Ok(())
    }

    /// Drops the identity token of every clump; the identity table is
    /// global even though the token is recorded per clump.
    fn touch_identity(&self) -> Result<(), GroveError> {
        let clumps = self.clumps.read().expect("clump map lock poisoned");
        for clump in clumps.values() {
            clump.status.invalidate(StatusKind::Identity)?;
        }
        Ok(())
    }
}

fn new_hasher() -> Blake2bVar {
    Blake2bVar::new(STORE_HASH_SIZE).expect("token width is within BLAKE2b bounds")
}

fn finish_hasher(hasher: Blake2bVar) -> String {
    let mut digest = [0u8; STORE_HASH_SIZE];
    hasher
        .finalize_variable(&mut digest)
        .expect("digest buffer matches token width");
    base62::encode(&digest)
}

fn validate_clump_id(clump_id: &str) -> Result<(), GroveError> {
    let usable = !clump_id.is_empty()
        && clump_id != "."
        && clump_id != ".."
        && !clump_id.contains(['/', '\\']);

    if usable {
        Ok(())
    } else {
        Err(GroveError::BadArgs(format!(
            "clump id {clump_id:?} is not usable as a directory name"
        )))
    }
}
