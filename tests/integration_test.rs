use dnpak::entry::{encode_location, EntryRecord, RECORD_SIZE};
use dnpak::header::{PakHeader, HEADER_SIZE};
use dnpak::{LocationStyle, PakArchive, PakError, PakOptions};
use proptest::prelude::*;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::tempdir;

fn write_source(dir: &Path, rel: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, data).unwrap();
    path
}

fn read_header(path: &Path) -> PakHeader {
    PakHeader::read(File::open(path).unwrap()).unwrap()
}

#[test]
fn test_two_file_scenario() {
    let dir = tempdir().unwrap();
    let a: Vec<u8> = b"hello, pak!\n".to_vec();
    let b: Vec<u8> = (0..40u8).collect();
    assert_eq!(a.len(), 12);
    let src_a = write_source(dir.path(), "src/a.txt", &a);
    let src_b = write_source(dir.path(), "src/b.bin", &b);
    let archive = dir.path().join("two.pak");

    {
        let mut pak = PakArchive::create(&archive).unwrap();
        pak.add_file(&src_a, "/a.txt").unwrap();
        pak.add_file(&src_b, "/dir/b.bin").unwrap();
        let header = pak.close().unwrap();
        assert_eq!(header.file_count, 2);
    }

    let pak = PakArchive::open(&archive).unwrap();
    let header = read_header(&archive);
    assert_eq!(header.file_count, 2);
    assert_eq!(pak.header(), &header);

    let entry_a = pak.find("/a.txt").unwrap();
    let entry_b = pak.find("/dir/b.bin").unwrap();
    assert_eq!(entry_a.decompressed().unwrap(), a);
    assert_eq!(entry_b.decompressed().unwrap(), b);
    assert_eq!(entry_a.raw_size(), 12);
    assert_eq!(entry_b.raw_size(), 40);

    let compressed: u32 = pak.entries().iter().map(|e| e.compressed_size()).sum();
    assert_eq!(header.table_offset, HEADER_SIZE as u32 + compressed);
    assert_eq!(entry_a.offset(), HEADER_SIZE as u32);
    assert_eq!(entry_b.offset(), HEADER_SIZE as u32 + entry_a.compressed_size());

    let file_len = fs::metadata(&archive).unwrap().len();
    assert_eq!(file_len, u64::from(header.table_offset) + 2 * RECORD_SIZE);
    pak.close().unwrap();
}

#[test]
fn test_extract_roundtrip() {
    let dir = tempdir().unwrap();
    let files: Vec<(&str, &str, Vec<u8>)> = vec![
        ("resource/etc/freeze.msh", "/resource/etc/freeze.msh", b"mesh bytes ".repeat(100)),
        ("resource/etc/freeze.skn", "/resource/etc/freeze.skn", b"skin".to_vec()),
        ("test.txt", "/test.txt", b"test".to_vec()),
    ];
    let archive = dir.path().join("pak1.test.pak");

    let mut pak = PakArchive::create(&archive).unwrap();
    for (rel, location, data) in &files {
        let src = write_source(&dir.path().join("src"), rel, data);
        pak.add_file(&src, location).unwrap();
    }
    pak.close().unwrap();

    let pak = PakArchive::open(&archive).unwrap();
    let out = pak.default_extract_dir();
    let summary = pak.extract(&out, false).unwrap();
    assert_eq!(summary.written, 3);
    assert_eq!(summary.skipped_denied, 0);
    for (rel, _, data) in &files {
        assert_eq!(&fs::read(out.join(rel)).unwrap(), data);
    }
    pak.close().unwrap();
}

#[test]
fn test_compressible_content_roundtrip() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("zeros.pak");
    let zeros = vec![0u8; 1 << 20];
    let text = b"EffectID,Name,Duration\n1,Burn,3000\n".repeat(2048);

    let mut pak = PakArchive::create(&archive).unwrap();
    pak.add_bytes("/zeros.bin", &zeros).unwrap();
    pak.add_bytes("/table.csv", &text).unwrap();
    pak.close().unwrap();

    let pak = PakArchive::open(&archive).unwrap();
    let entry = pak.find("/zeros.bin").unwrap();
    assert!((entry.compressed_size() as usize) * 100 < zeros.len());
    assert_eq!(entry.decompressed().unwrap(), zeros);

    let out = dir.path().join("out");
    let summary = pak.extract(&out, true).unwrap();
    assert_eq!(summary.written, 2);
    assert_eq!(fs::read(out.join("zeros.bin")).unwrap(), zeros);
    assert_eq!(fs::read(out.join("table.csv")).unwrap(), text);
    pak.close().unwrap();
}

#[cfg(unix)]
#[test]
fn test_extract_skips_denied_files() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let archive = dir.path().join("denied.pak");
    let mut pak = PakArchive::create(&archive).unwrap();
    pak.add_bytes("/a.txt", b"first").unwrap();
    pak.add_bytes("/locked/b.txt", b"blocked").unwrap();
    pak.add_bytes("/z.txt", b"last").unwrap();
    pak.close().unwrap();

    let out = dir.path().join("out");
    let locked = out.join("locked");
    fs::create_dir_all(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();

    // Permission bits are not enforced for root.
    if File::create(locked.join("writable")).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
        return;
    }

    let pak = PakArchive::open(&archive).unwrap();
    let summary = pak.extract(&out, false);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();
    let summary = summary.unwrap();

    assert_eq!(summary.skipped_denied, 1);
    assert_eq!(summary.written, 2);
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"first");
    assert_eq!(fs::read(out.join("z.txt")).unwrap(), b"last");
    assert!(!locked.join("b.txt").exists());
    pak.close().unwrap();
}

#[test]
fn test_create_refuses_existing_file() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("exists.pak");
    fs::write(&archive, b"not yours").unwrap();

    let err = PakArchive::create(&archive).unwrap_err();
    assert!(matches!(err, PakError::AlreadyExists(_)));
    assert_eq!(fs::read(&archive).unwrap(), b"not yours");
}

#[test]
fn test_open_missing_archive() {
    let dir = tempdir().unwrap();
    let err = PakArchive::open(dir.path().join("unavailable.test.pak")).unwrap_err();
    assert!(matches!(err, PakError::SourceNotFound(_)));
}

#[test]
fn test_add_rejections() {
    let dir = tempdir().unwrap();
    let src = write_source(dir.path(), "exists.txt", b"x");
    let mut pak = PakArchive::create(dir.path().join("r.pak")).unwrap();

    let err = pak.add_file(&src, "no-leading-slash").unwrap_err();
    assert!(matches!(err, PakError::InvalidLocation(_)));

    let err = pak.add_file(dir.path().join("missing/file"), "/x").unwrap_err();
    assert!(matches!(err, PakError::SourceNotFound(_)));

    let err = pak.add_files(dir.path().join("no-such-folder")).unwrap_err();
    assert!(matches!(err, PakError::SourceNotFound(_)));

    assert!(pak.is_empty());
    pak.close().unwrap();
}

#[test]
fn test_find() {
    let dir = tempdir().unwrap();
    let mut pak = PakArchive::create(dir.path().join("f.pak")).unwrap();
    pak.add_bytes("/dup.txt", b"first").unwrap();
    pak.add_bytes("\\other.txt", b"other").unwrap();
    pak.add_bytes("/dup.txt", b"second").unwrap();

    let found = pak.find("/dup.txt").unwrap();
    assert_eq!(found.location(), "/dup.txt");
    assert_eq!(found.decompressed().unwrap(), b"first");
    assert_eq!(pak.position("\\other.txt"), Some(1));
    assert!(pak.find("/never-added").is_none());
    assert!(pak.find("dup.txt").is_none());
    pak.close().unwrap();
}

#[test]
fn test_edit_only_is_persisted() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("edit.pak");

    let mut pak = PakArchive::create(&archive).unwrap();
    pak.add_bytes("/keep.bin", &[1u8; 64]).unwrap();
    pak.add_bytes("/test.txt", b"test").unwrap();
    pak.close().unwrap();

    let mut pak = PakArchive::open(&archive).unwrap();
    assert_eq!(pak.find("/test.txt").unwrap().decompressed().unwrap(), b"test");
    pak.edit("/test.txt", b"test change").unwrap();
    pak.close().unwrap();

    let pak = PakArchive::open(&archive).unwrap();
    assert_eq!(pak.len(), 2);
    assert_eq!(pak.find("/test.txt").unwrap().decompressed().unwrap(), b"test change");
    assert_eq!(pak.find("/test.txt").unwrap().raw_size(), 11);
    assert_eq!(pak.find("/keep.bin").unwrap().decompressed().unwrap(), vec![1u8; 64]);
    pak.close().unwrap();
}

#[test]
fn test_add_to_read_archive() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("grow.pak");

    let mut pak = PakArchive::create(&archive).unwrap();
    pak.add_bytes("/one", b"1").unwrap();
    pak.add_bytes("/two", b"22").unwrap();
    pak.close().unwrap();

    let mut pak = PakArchive::open(&archive).unwrap();
    assert_eq!(pak.header().file_count, 2);
    pak.add_bytes("/three", b"333").unwrap();
    pak.add_bytes("/four", b"4444").unwrap();
    assert_eq!(pak.header().file_count, 2);
    assert_eq!(pak.len(), 4);
    let header = pak.close().unwrap();
    assert_eq!(header.file_count, 4);

    let pak = PakArchive::open(&archive).unwrap();
    let locations: Vec<&str> = pak.entries().iter().map(|e| e.location()).collect();
    assert_eq!(locations, ["/one", "/two", "/three", "/four"]);
    let offsets: Vec<u32> = pak.entries().iter().map(|e| e.offset()).collect();
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(pak.find("/four").unwrap().decompressed().unwrap(), b"4444");
    pak.close().unwrap();
}

#[test]
fn test_add_files_walks_folder() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("tree");
    write_source(&root, "resource/etc/freeze.msh", b"msh");
    write_source(&root, "resource/etc/freeze.skn", b"skn");
    write_source(&root, "test.txt", b"test");
    write_source(&root, "noext", b"no extension");

    let unix = dir.path().join("unix.pak");
    let mut pak = PakArchive::create(&unix).unwrap();
    assert_eq!(pak.add_files(&root).unwrap(), 4);
    pak.close().unwrap();

    let pak = PakArchive::open(&unix).unwrap();
    let locations: Vec<&str> = pak.entries().iter().map(|e| e.location()).collect();
    assert_eq!(
        locations,
        ["/noext", "/resource/etc/freeze.msh", "/resource/etc/freeze.skn", "/test.txt"]
    );
    assert_eq!(pak.find("/test.txt").unwrap().decompressed().unwrap(), b"test");
    pak.close().unwrap();

    let windows = dir.path().join("windows.pak");
    let opts = PakOptions { location_style: LocationStyle::Windows, ..PakOptions::default() };
    let mut pak = PakArchive::create_with_options(&windows, opts).unwrap();
    pak.add_files(&root).unwrap();
    assert!(pak.find("\\resource\\etc\\freeze.msh").is_some());
    pak.close().unwrap();
}

/// Write an archive by hand holding one real entry and one zero-size
/// placeholder, the way some packers leave deleted files behind.
fn archive_with_placeholder(path: &Path) {
    let payload = dnpak::codec::compress(b"real").unwrap();
    let mut file = File::create(path).unwrap();
    let records = [
        EntryRecord {
            location: encode_location("/real.txt").unwrap(),
            compressed_size: payload.len() as u32,
            raw_size: 4,
            allocated_size: payload.len() as u32,
            offset: HEADER_SIZE as u32,
            seed: 0,
            checksum: 0,
        },
        EntryRecord {
            location: encode_location("/deleted.txt").unwrap(),
            compressed_size: 0,
            raw_size: 0,
            allocated_size: 0,
            offset: HEADER_SIZE as u32 + payload.len() as u32,
            seed: 0,
            checksum: 0,
        },
    ];
    let header = PakHeader {
        file_count: 2,
        table_offset: HEADER_SIZE as u32 + payload.len() as u32,
        ..PakHeader::new()
    };
    header.write(&mut file).unwrap();
    file.write_all(&payload).unwrap();
    for record in &records {
        record.write(&mut file).unwrap();
    }
}

#[test]
fn test_strict_extraction_skips_placeholders() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("placeholder.pak");
    archive_with_placeholder(&archive);

    let pak = PakArchive::open(&archive).unwrap();
    assert!(pak.find("/deleted.txt").unwrap().is_empty_placeholder());

    let strict_out = dir.path().join("strict");
    let summary = pak.extract(&strict_out, true).unwrap();
    assert_eq!((summary.written, summary.skipped_empty), (1, 1));
    assert_eq!(fs::read(strict_out.join("real.txt")).unwrap(), b"real");
    assert!(!strict_out.join("deleted.txt").exists());

    let loose_out = dir.path().join("loose");
    let summary = pak.extract(&loose_out, false).unwrap();
    assert_eq!((summary.written, summary.skipped_empty), (2, 0));
    assert!(fs::read(loose_out.join("deleted.txt")).unwrap().is_empty());
    pak.close().unwrap();
}

#[test]
fn test_corrupt_payload_surfaces_on_extract() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("corrupt.pak");
    let mut pak = PakArchive::create(&archive).unwrap();
    pak.add_bytes("/c.bin", &[5u8; 2048]).unwrap();
    pak.close().unwrap();

    // Clobber the first bytes of the payload block.
    let mut file = fs::OpenOptions::new().write(true).open(&archive).unwrap();
    file.seek(SeekFrom::Start(HEADER_SIZE)).unwrap();
    file.write_all(&[0xFF; 4]).unwrap();
    drop(file);

    let pak = PakArchive::open(&archive).unwrap();
    let err = pak.extract(dir.path().join("out"), false).unwrap_err();
    assert!(err.is_corrupt_payload(), "{err}");
    pak.close().unwrap();
}

#[test]
fn test_location_too_long_is_rejected() {
    let dir = tempdir().unwrap();
    let mut pak = PakArchive::create(dir.path().join("long.pak")).unwrap();
    let location = format!("/{}", "x".repeat(300));
    let err = pak.add_bytes(&location, b"x").unwrap_err();
    assert!(matches!(err, PakError::LocationTooLong { .. }));
    pak.close().unwrap();
}

#[test]
fn test_record_layout_on_disk() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("layout.pak");
    let mut pak = PakArchive::create(&archive).unwrap();
    pak.add_bytes("/a", b"aaaa").unwrap();
    let header = pak.close().unwrap();

    let mut file = File::open(&archive).unwrap();
    let mut magic = [0u8; 32];
    file.read_exact(&mut magic).unwrap();
    assert_eq!(&magic, b"EyedentityGames Packing File 0.1");

    file.seek(SeekFrom::Start(u64::from(header.table_offset))).unwrap();
    let record = EntryRecord::read(&mut file).unwrap();
    assert_eq!(record.location(), "/a");
    assert_eq!(record.raw_size, 4);
    assert_eq!(record.allocated_size, record.compressed_size);
    assert_eq!(record.offset, HEADER_SIZE as u32);
    assert_eq!((record.seed, record.checksum), (0, 0));
}

#[test]
fn test_instances_do_not_share_entries() {
    let dir = tempdir().unwrap();
    let mut first = PakArchive::create(dir.path().join("first.pak")).unwrap();
    first.add_bytes("/only-in-first", b"1").unwrap();
    let second = PakArchive::create(dir.path().join("second.pak")).unwrap();
    assert!(second.is_empty());
    assert!(second.find("/only-in-first").is_none());
    first.close().unwrap();
    assert_eq!(second.close().unwrap().file_count, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_content_survives_write_and_read(
        contents in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2048), 1..6)
    ) {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("prop.pak");
        let mut pak = PakArchive::create(&archive).unwrap();
        for (i, data) in contents.iter().enumerate() {
            pak.add_bytes(&format!("/f{i}.bin"), data).unwrap();
        }
        let header = pak.close().unwrap();
        prop_assert_eq!(header.file_count as usize, contents.len());

        let pak = PakArchive::open(&archive).unwrap();
        for (i, data) in contents.iter().enumerate() {
            let entry = pak.find(&format!("/f{i}.bin")).unwrap();
            prop_assert_eq!(&entry.decompressed().unwrap(), data);
        }
        pak.close().unwrap();
    }
}
