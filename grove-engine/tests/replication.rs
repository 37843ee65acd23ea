// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interchange: binary round trips, spool export/import and the
//! partial-replication rules.

use grove_engine::{BlockTarget, Grove, GroveError, KeyMaterial, Options, StatusKind};

fn spool() -> (tempfile::TempDir, Grove) {
    let tmp = tempfile::tempdir().unwrap();
    let grove = Grove::open(tmp.path()).unwrap();
    (tmp, grove)
}

#[test]
fn binary_round_trip_through_import() {
    let (_tmp_a, source) = spool();

    // A deterministic author so the wire bytes are reproducible.
    source
        .create_identity("vector", KeyMaterial::Raw(vec![5u8; 32]))
        .unwrap();
    let opts = Options::default();
    let entry = source.append(b"known vector", "vector", &opts).unwrap();
    let bytes = source.entry_bytes("vector", 1, &opts).unwrap();

    // First entry, log 0: tag, author, two single-byte varints, size,
    // payload hash, signature, then the 12 payload bytes.
    assert_eq!(bytes.len(), 1 + 32 + 1 + 1 + 1 + 66 + 64 + 12);
    assert_eq!(bytes[0], 0x00);

    let (_tmp_b, sink) = spool();
    let stored = sink.import_binaries([bytes.clone()], &opts).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], entry);
    assert_eq!(stored[0].seq_num, 1);
    assert_eq!(stored[0].log_id, 0);
    assert_eq!(stored[0].payload_size, 12);

    // Byte-for-byte identical on the way back out. The `~` form works
    // for any author with stored content, whatever its text length.
    let author = entry.author.to_base62();
    let roundtripped = sink
        .entry_bytes(format!("~{author}").as_str(), 1, &opts)
        .unwrap();
    assert_eq!(roundtripped, bytes);
}

#[test]
fn export_then_reimport_restores_the_spool() {
    let (_tmp, grove) = spool();
    let opts = Options::default();

    grove.create_identity("testy", KeyMaterial::Generate).unwrap();
    for n in 1..=14 {
        grove
            .append(format!("Entry: {n}").as_bytes(), "testy", &opts)
            .unwrap();
    }

    let content_before = grove.current_hash(StatusKind::Content, "default").unwrap();
    let identity_before = grove.current_hash(StatusKind::Identity, "default").unwrap();

    let export_dir = tempfile::tempdir().unwrap();
    grove.export(export_dir.path()).unwrap();

    // Wipe the content table and bring everything back.
    let info = grove.purge(None, None, "default").unwrap();
    assert!(info.is_empty());

    grove.import(export_dir.path()).unwrap();

    assert_eq!(grove.max_seq_num("testy", &opts).unwrap(), 14);
    let revalidating = Options {
        revalidate: true,
        ..Options::default()
    };
    for seq in 1..=14u64 {
        assert!(grove.entry("testy", seq, &revalidating).is_ok());
    }

    // Restoring the same records restores the same change tokens.
    assert_eq!(
        grove.current_hash(StatusKind::Content, "default").unwrap(),
        content_before
    );
    assert_eq!(
        grove.current_hash(StatusKind::Identity, "default").unwrap(),
        identity_before
    );
}

#[test]
fn export_imports_into_a_fresh_spool() {
    let (_tmp_a, source) = spool();
    let opts = Options::default();

    source.create_identity("mover", KeyMaterial::Generate).unwrap();
    for n in 1..=5 {
        source
            .append(format!("move {n}").as_bytes(), "mover", &opts)
            .unwrap();
    }

    let export_dir = tempfile::tempdir().unwrap();
    source.export(export_dir.path()).unwrap();

    let (_tmp_b, sink) = spool();
    sink.import(export_dir.path()).unwrap();

    // The identity arrived with its keys.
    assert_eq!(
        sink.resolve_author("mover").unwrap(),
        source.resolve_author("mover").unwrap()
    );
    assert_eq!(sink.max_seq_num("mover", &opts).unwrap(), 5);

    // Same records, same content token.
    assert_eq!(
        sink.current_hash(StatusKind::Content, "default").unwrap(),
        source.current_hash(StatusKind::Content, "default").unwrap()
    );
}

#[test]
fn import_tolerates_a_missing_backlink_target() {
    let (_tmp_a, source) = spool();
    let opts = Options::default();

    source.create_identity("gappy", KeyMaterial::Generate).unwrap();
    for n in 1..=4 {
        source
            .append(format!("gap {n}").as_bytes(), "gappy", &opts)
            .unwrap();
    }

    // Ship only the lipmaa spine of entry 4: entries 1 and 4.
    let mut bytes = source.entry_bytes("gappy", 1, &opts).unwrap();
    bytes.extend(source.entry_bytes("gappy", 4, &opts).unwrap());

    let (_tmp_b, sink) = spool();
    let stored = sink.import_binaries([bytes], &opts).unwrap();

    // Entry 4 landed although its direct predecessor 3 is nowhere to be
    // found; the spine entry 1 satisfied the lipmaa check.
    assert_eq!(
        stored.iter().map(|entry| entry.seq_num).collect::<Vec<_>>(),
        vec![1, 4]
    );
}

#[test]
fn import_insists_on_the_lipmaa_spine() {
    let (_tmp_a, source) = spool();
    let opts = Options::default();

    source.create_identity("spiny", KeyMaterial::Generate).unwrap();
    for n in 1..=4 {
        source
            .append(format!("spine {n}").as_bytes(), "spiny", &opts)
            .unwrap();
    }

    // Entry 4 alone: its lipmaa target 1 is absent on the other side.
    let bytes = source.entry_bytes("spiny", 4, &opts).unwrap();

    let (_tmp_b, sink) = spool();
    assert!(matches!(
        sink.import_binaries([bytes], &opts),
        Err(GroveError::MissingLipmaa)
    ));
}

#[test]
fn import_refuses_blocked_content() {
    let (_tmp_a, source) = spool();
    let opts = Options::default();

    source.create_identity("pariah", KeyMaterial::Generate).unwrap();
    source.append(b"unwanted", "pariah", &opts).unwrap();
    let author = source.resolve_author("pariah").unwrap();
    let bytes = source.entry_bytes("pariah", 1, &opts).unwrap();

    let (_tmp_b, sink) = spool();
    sink.block(BlockTarget::Author(author), "default").unwrap();

    assert!(matches!(
        sink.import_binaries([bytes], &opts),
        Err(GroveError::RefusedBlocked)
    ));
    assert!(sink.all_entries("default").unwrap().is_empty());
}

#[test]
fn existing_records_win_unless_replace() {
    let (_tmp_a, source) = spool();
    let opts = Options::default();

    source.create_identity("twice", KeyMaterial::Generate).unwrap();
    source.append(b"only once", "twice", &opts).unwrap();
    let bytes = source.entry_bytes("twice", 1, &opts).unwrap();

    let (_tmp_b, sink) = spool();
    sink.import_binaries([bytes.clone()], &opts).unwrap();
    sink.import_binaries([bytes.clone()], &opts).unwrap();

    assert_eq!(sink.all_entries("default").unwrap().len(), 1);

    let replacing = Options {
        replace: true,
        ..Options::default()
    };
    sink.import_binaries([bytes], &replacing).unwrap();
    assert_eq!(sink.all_entries("default").unwrap().len(), 1);
}

#[test]
fn malformed_streams_poison_their_whole_binary() {
    let (_tmp_a, source) = spool();
    let opts = Options::default();

    source.create_identity("mangle", KeyMaterial::Generate).unwrap();
    source.append(b"good entry", "mangle", &opts).unwrap();

    let mut bytes = source.entry_bytes("mangle", 1, &opts).unwrap();
    bytes.extend([0x00, 0x01, 0x02]);

    let (_tmp_b, sink) = spool();
    assert!(matches!(
        sink.import_binaries([bytes], &opts),
        Err(GroveError::BadBinary(_))
    ));

    // Nothing of the poisoned binary was ingested.
    assert!(sink.all_entries("default").unwrap().is_empty());
}

#[test]
fn keyfile_cross_check() {
    let (_tmp_a, source) = spool();
    source.create_identity("honest", KeyMaterial::Generate).unwrap();

    let export_dir = tempfile::tempdir().unwrap();
    source.export(export_dir.path()).unwrap();

    // Tamper with the claimed public key.
    let keyfile_path = export_dir
        .path()
        .join("identities")
        .join("honest.keyfile.json");
    let text = std::fs::read_to_string(&keyfile_path).unwrap();
    let mut keyfile: serde_json::Value = serde_json::from_str(&text).unwrap();
    keyfile["public_key"] = serde_json::Value::String("11111111111111111111".into());
    std::fs::write(&keyfile_path, serde_json::to_vec(&keyfile).unwrap()).unwrap();

    let (_tmp_b, sink) = spool();
    assert!(matches!(
        sink.import(export_dir.path()),
        Err(GroveError::BadArgs(_))
    ));
}

#[test]
fn export_layout() {
    let (_tmp, grove) = spool();
    let opts = Options::default();

    grove.create_identity("layout", KeyMaterial::Generate).unwrap();
    grove.append(b"laid out", "layout", &opts).unwrap();
    let author = grove.resolve_author("layout").unwrap();

    let export_dir = tempfile::tempdir().unwrap();
    grove.export(export_dir.path()).unwrap();

    let keyfile = export_dir
        .path()
        .join("identities")
        .join("layout.keyfile.json");
    assert!(keyfile.is_file());

    let parsed: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&keyfile).unwrap()).unwrap();
    assert_eq!(parsed["source"], "baobab");
    assert_eq!(parsed["key_encoding"], "base62");
    assert_eq!(parsed["key_type"], "ed25519");
    assert_eq!(parsed["identity"], "layout");
    assert_eq!(parsed["public_key"], author.as_str());

    let log_file = export_dir
        .path()
        .join("content")
        .join("default")
        .join(format!("{author}_0.bamboo.log"));
    assert!(log_file.is_file());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&keyfile).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let mode = std::fs::metadata(&log_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
