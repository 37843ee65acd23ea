// SPDX-License-Identifier: MIT OR Apache-2.0

//! Spool import and export.
//!
//! An exported spool is a directory of keyfiles plus one binary log file
//! per `(author, log_id)` pair and clump:
//!
//! ```text
//! <path>/identities/<alias>.keyfile.json
//! <path>/content/<clump_id>/<author_b62>_<log_id>.bamboo.log
//! ```
//!
//! Log files are the ascending concatenation of full entry encodings.
//! Import mirrors the layout and merges entry by entry: blocked content
//! is refused, existing records are kept unless `replace` is set, and
//! everything else is validated before it lands.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use grove_core::{base62, decode_stream, Entry, PrivateKey};
use grove_store::{KeyMaterial, LogKey};

use crate::validate::validate_entry;
use crate::{Grove, GroveError, Options};

const KEYFILE_SOURCE: &str = "baobab";
const KEYFILE_ENCODING: &str = "base62";
const KEYFILE_KEY_TYPE: &str = "ed25519";
const KEYFILE_SUFFIX: &str = ".keyfile.json";
const LOG_SUFFIX: &str = ".bamboo.log";

#[derive(Debug, Serialize, Deserialize)]
struct Keyfile {
    source: String,
    key_encoding: String,
    key_type: String,
    identity: String,
    public_key: String,
    secret_key: String,
}

impl Grove {
    /// Stores one foreign entry into a clump.
    ///
    /// Refuses blocked content; returns the already stored entry when
    /// the position is taken and `replace` is false; validates anything
    /// that is actually written.
    pub fn store_entry(
        &self,
        entry: Entry,
        clump_id: &str,
        replace: bool,
    ) -> Result<Entry, GroveError> {
        let clump = self.clump_or_create(clump_id)?;

        if self.refuses(&clump, &entry.author, entry.log_id)? {
            return Err(GroveError::RefusedBlocked);
        }

        let key = LogKey::new(entry.author, entry.log_id, entry.seq_num);
        if !replace {
            if let Some(existing) = self.try_entry(&clump, &key)? {
                return Ok(existing);
            }
        }

        validate_entry(&clump, &entry)?;

        clump.content.put(
            &key,
            Some(&entry.signed_bytes()),
            entry.payload.as_deref(),
        )?;
        self.touch_content(&clump)?;

        debug!(author = %entry.author, log_id = entry.log_id, seq_num = entry.seq_num, clump = clump_id, "stored entry");
        Ok(entry)
    }

    /// Decodes each binary as an entry stream and stores every entry.
    ///
    /// A malformed stream fails its whole binary with nothing ingested
    /// from it.
    pub fn import_binaries<B>(
        &self,
        binaries: impl IntoIterator<Item = B>,
        opts: &Options,
    ) -> Result<Vec<Entry>, GroveError>
    where
        B: AsRef<[u8]>,
    {
        let mut stored = Vec::new();

        for binary in binaries {
            let entries = decode_stream(binary.as_ref())?;
            for entry in entries {
                stored.push(self.store_entry(entry, &opts.clump_id, opts.replace)?);
            }
        }

        Ok(stored)
    }

    /// Writes the whole spool under `path`.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<(), GroveError> {
        let path = path.as_ref();

        let identities_dir = path.join("identities");
        fs::create_dir_all(&identities_dir)?;

        for (alias, public) in self.identities()? {
            let secret = self.identity_key(&alias, grove_store::KeyKind::Secret)?;
            let keyfile = Keyfile {
                source: KEYFILE_SOURCE.to_string(),
                key_encoding: KEYFILE_ENCODING.to_string(),
                key_type: KEYFILE_KEY_TYPE.to_string(),
                identity: alias.clone(),
                public_key: public.to_base62(),
                secret_key: base62::encode(&secret),
            };

            let file = identities_dir.join(format!("{alias}{KEYFILE_SUFFIX}"));
            fs::write(&file, serde_json::to_vec_pretty(&keyfile)?)?;
            set_mode(&file, 0o600)?;
        }

        let content_dir = path.join("content");
        for clump_id in self.clumps() {
            let clump_dir = content_dir.join(&clump_id);
            fs::create_dir_all(&clump_dir)?;
            set_mode(&clump_dir, 0o700)?;

            for (author, log_id, _max) in self.stored_info(&clump_id)? {
                let opts = Options {
                    log_id,
                    clump_id: clump_id.clone(),
                    ..Options::default()
                };

                let mut bytes = Vec::new();
                for entry in self.full_log(&author, &opts)? {
                    bytes.extend(entry.to_bytes());
                }

                let file = clump_dir.join(format!("{author}_{log_id}{LOG_SUFFIX}"));
                fs::write(&file, bytes)?;
                set_mode(&file, 0o700)?;
            }
        }

        info!(path = %path.display(), "exported spool");
        Ok(())
    }

    /// Reads a spool layout back in: keyfiles first, then every binary
    /// log, with the clump inferred from its parent directory.
    pub fn import(&self, path: impl AsRef<Path>) -> Result<(), GroveError> {
        let path = path.as_ref();

        let identities_dir = path.join("identities");
        if identities_dir.is_dir() {
            for dir_entry in fs::read_dir(&identities_dir)? {
                let file = dir_entry?.path();
                let Some(name) = file.file_name().and_then(|name| name.to_str()) else {
                    continue;
                };
                if !name.ends_with(KEYFILE_SUFFIX) {
                    continue;
                }

                self.import_keyfile(&file)?;
            }
        }

        let content_dir = path.join("content");
        if content_dir.is_dir() {
            for clump_entry in fs::read_dir(&content_dir)? {
                let clump_dir = clump_entry?.path();
                if !clump_dir.is_dir() {
                    continue;
                }
                let Some(clump_id) = clump_dir.file_name().and_then(|name| name.to_str())
                else {
                    continue;
                };

                let opts = Options {
                    clump_id: clump_id.to_string(),
                    ..Options::default()
                };

                for log_entry in fs::read_dir(&clump_dir)? {
                    let file = log_entry?.path();
                    let Some(name) = file.file_name().and_then(|name| name.to_str()) else {
                        continue;
                    };
                    if !name.ends_with(LOG_SUFFIX) {
                        continue;
                    }

                    let bytes = fs::read(&file)?;
                    self.import_binaries([bytes], &opts)?;
                }
            }
        }

        info!(path = %path.display(), "imported spool");
        Ok(())
    }

    fn import_keyfile(&self, file: &Path) -> Result<(), GroveError> {
        let keyfile: Keyfile = serde_json::from_slice(&fs::read(file)?)?;

        // The derived public key must agree with the keyfile before the
        // secret is accepted.
        let secret = base62::decode(&keyfile.secret_key)?;
        let private_key = PrivateKey::from_bytes(&secret)?;
        let derived = private_key.public_key().to_base62();
        if derived != keyfile.public_key {
            return Err(GroveError::BadArgs(format!(
                "keyfile for {:?} claims public key {} but the secret derives {}",
                keyfile.identity, keyfile.public_key, derived
            )));
        }

        self.create_identity(&keyfile.identity, KeyMaterial::Raw(secret))?;
        debug!(alias = %keyfile.identity, "imported identity");
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
