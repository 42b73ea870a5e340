use std::fs;
use std::path::{Path, PathBuf};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use symdb::core::config::Config;
use symdb::core::hash::{MurmurHash64A, StringHasher};
use symdb::dump::{dump_path, TextSink};
use symdb::resolver::Resolver;
use symdb::storage::format::{FLAG_COMPRESSED, FORMAT_VERSION};
use symdb::storage::fs::{MemoryFileSystem, StdFileSystem};
use symdb::storage::reader::DatabaseReader;
use symdb::writer::{DatabaseGenerator, LiteralScanner};

fn random_corpus(seed: u64, count: usize) -> Vec<(u64, String)> {
    let hasher = MurmurHash64A::default();
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let len = rng.gen_range(0..40);
            let text: String = (0..len)
                .map(|_| rng.gen_range(b' '..=b'~') as char)
                .collect();
            // Suffix keeps every string distinct
            let text = format!("{}#{}", text, i);
            (hasher.hash_str(&text), text)
        })
        .collect()
}

fn disk_resolver(root: &Path) -> Resolver {
    Resolver::with_config(Config {
        root_path: root.to_path_buf(),
        ..Config::default()
    })
}

#[test]
fn test_generate_load_decode_every_pair_on_disk() {
    for compress in [false, true] {
        let dir = tempfile::tempdir().unwrap();
        let corpus = random_corpus(compress as u64, 2_000);
        DatabaseGenerator::new(compress)
            .generate(&StdFileSystem, &dir.path().join("corpus.hdb"), corpus.clone())
            .unwrap();

        let mut resolver = disk_resolver(dir.path());
        for (hash, text) in &corpus {
            assert_eq!(resolver.decode(*hash).as_deref(), Some(text.as_str()), "compress={}", compress);
        }
        assert_eq!(resolver.stats().databases, 1);
        assert_eq!(resolver.stats().database_entries, corpus.len());
    }
}

#[test]
fn test_unicode_strings_roundtrip_compressed() {
    let fs = MemoryFileSystem::new();
    let hasher = MurmurHash64A::default();
    let strings = ["héllo wörld", "日本語のテキスト", "emoji 🚀 rocket", ""];
    let corpus: Vec<(u64, String)> = strings.iter().map(|s| (hasher.hash_str(s), s.to_string())).collect();
    DatabaseGenerator::new(true)
        .generate(&fs, Path::new("u/db.hdb"), corpus)
        .unwrap();

    let reader = DatabaseReader::open(&fs, Path::new("u/db.hdb")).unwrap();
    for s in strings {
        assert_eq!(reader.read_string(&fs, hasher.hash_str(s)).unwrap().as_deref(), Some(s));
    }
}

#[test]
fn test_colliding_corpus_keeps_first() {
    let fs = MemoryFileSystem::new();
    let corpus = vec![
        (0x11, "Foo".to_string()),
        (0x22, "Bar".to_string()),
        (0x11, "Foo".to_string()),
    ];
    let report = DatabaseGenerator::new(false)
        .generate(&fs, Path::new("root/db.hdb"), corpus)
        .unwrap();
    assert_eq!(report.entries, 2);

    let reader = DatabaseReader::open(&fs, Path::new("root/db.hdb")).unwrap();
    assert_eq!(reader.len(), 2);
    assert_eq!(reader.read_string(&fs, 0x11).unwrap().as_deref(), Some("Foo"));
}

#[test]
fn test_dump_three_entries_to_text_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("three.hdb");
    let corpus = vec![
        (0xC0FFEE, "coffee".to_string()),
        (0x0BAD, "bad".to_string()),
        (0xABCD_EF01_2345_6789, "big".to_string()),
    ];
    DatabaseGenerator::new(false).generate(&StdFileSystem, &db, corpus).unwrap();

    let out = dir.path().join("three.hdb.txt");
    let mut sink = TextSink::new(fs::File::create(&out).unwrap());
    dump_path(&StdFileSystem, &Config::default(), &db, &mut sink).unwrap();
    drop(sink);

    let text = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec![
        "0000000000000bad = 'bad'",
        "0000000000c0ffee = 'coffee'",
        "abcdef0123456789 = 'big'",
    ]);
}

#[test]
fn test_unknown_version_skipped_in_discovery_but_fatal_when_explicit() {
    let dir = tempfile::tempdir().unwrap();
    let hasher = MurmurHash64A::default();
    let hash = hasher.hash_str("future");

    let path = dir.path().join("future.hdb");
    DatabaseGenerator::new(true)
        .generate(&StdFileSystem, &path, vec![(hash, "future".to_string())])
        .unwrap();
    let mut bytes = fs::read(&path).unwrap();
    bytes[..4].copy_from_slice(&((FORMAT_VERSION + 1) | FLAG_COMPRESSED).to_le_bytes());
    fs::write(&path, bytes).unwrap();

    let mut resolver = disk_resolver(dir.path());
    assert_eq!(resolver.decode(hash), None);
    assert!(resolver.databases().is_empty());
    assert_eq!(resolver.try_decode(hash), format!("{:016x}", hash));

    let err = DatabaseReader::open(&StdFileSystem, &path).unwrap_err();
    assert!(err.is_unsupported_version());

    let mut sink = TextSink::new(Vec::new());
    let err = dump_path(&StdFileSystem, &Config::default(), &path, &mut sink).unwrap_err();
    assert!(err.is_unsupported_version());
}

#[test]
fn test_runtime_registration_beats_disk() {
    let dir = tempfile::tempdir().unwrap();
    let hasher = MurmurHash64A::default();
    let hash = hasher.hash_str("renamed_field");
    DatabaseGenerator::new(false)
        .generate(&StdFileSystem, &dir.path().join("old.hdb"), vec![(hash, "old_field".to_string())])
        .unwrap();

    let mut resolver = disk_resolver(dir.path());
    resolver.register_string("renamed_field");
    assert_eq!(resolver.decode(hash).as_deref(), Some("renamed_field"));
}

#[test]
fn test_nested_databases_resolve_in_walk_order() {
    let dir = tempfile::tempdir().unwrap();
    let nested: PathBuf = dir.path().join("b_plugins").join("physics");
    fs::create_dir_all(&nested).unwrap();
    fs::create_dir_all(dir.path().join(".trash")).unwrap();

    DatabaseGenerator::new(true)
        .generate(&StdFileSystem, &dir.path().join("a_core.hdb"), vec![(1, "core".to_string())])
        .unwrap();
    DatabaseGenerator::new(false)
        .generate(&StdFileSystem, &nested.join("physics.hdb"), vec![(1, "physics".to_string()), (2, "gravity".to_string())])
        .unwrap();
    DatabaseGenerator::new(false)
        .generate(&StdFileSystem, &dir.path().join(".trash").join("x.hdb"), vec![(3, "trash".to_string())])
        .unwrap();

    let mut resolver = disk_resolver(dir.path());
    assert_eq!(resolver.decode(1).as_deref(), Some("core"));
    assert_eq!(resolver.decode(2).as_deref(), Some("gravity"));
    assert_eq!(resolver.decode(3), None);
    assert_eq!(resolver.databases().len(), 2);
}

#[test]
fn test_scan_generate_resolve_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("entity.c"), r#"uint64_t k = hash("transform"); uint64_t j = hash("velocity");"#).unwrap();
    fs::write(src.join("notes.md"), r#"hash("ignored")"#).unwrap();

    let config = Config {
        root_path: src.clone(),
        ..Config::default()
    };
    let scanner = LiteralScanner::new(&config, MurmurHash64A::default()).unwrap();
    let corpus = scanner.scan_path(&StdFileSystem, &src).unwrap();
    assert_eq!(corpus.len(), 2);

    let out_dir = dir.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    DatabaseGenerator::new(true)
        .generate(&StdFileSystem, &out_dir.join("src.hdb"), corpus)
        .unwrap();

    let mut resolver = disk_resolver(&out_dir);
    let hasher = MurmurHash64A::default();
    assert_eq!(resolver.decode(hasher.hash_str("velocity")).as_deref(), Some("velocity"));
    assert_eq!(resolver.decode(hasher.hash_str("ignored")), None);
}

#[test]
fn test_database_with_shared_code_nodes_is_skipped() {
    let fs = MemoryFileSystem::new();

    // Compressed header, no entries, 60 branches that all reuse the node before them
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(FORMAT_VERSION | FLAG_COMPRESSED).to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&60u32.to_le_bytes());
    bytes.extend_from_slice(&[1, b'a', 0, 0, 0, 0, 0, 0, 0, 0]);
    for slot in 1..60u32 {
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(&(slot - 1).to_le_bytes());
        bytes.extend_from_slice(&(slot - 1).to_le_bytes());
    }
    fs.insert("root/a.hdb", bytes);
    DatabaseGenerator::new(true)
        .generate(&fs, Path::new("root/b.hdb"), vec![(7, "good".to_string())])
        .unwrap();

    let mut resolver = Resolver::new(
        Config { root_path: PathBuf::from("root"), ..Config::default() },
        fs.clone(),
        MurmurHash64A::default(),
    );
    assert_eq!(resolver.decode(7).as_deref(), Some("good"));
    assert_eq!(resolver.databases().len(), 1);
    assert_eq!(resolver.databases()[0].path, PathBuf::from("root/b.hdb"));

    let err = DatabaseReader::open(&fs, Path::new("root/a.hdb")).unwrap_err();
    assert_eq!(err.kind, symdb::ErrorKind::Format);
}
