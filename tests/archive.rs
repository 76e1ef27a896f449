//! Archive mounting: end-record discovery, validation, and the index.

mod common;

use common::{ArchiveBuilder, MemSource, mount, read_all};
use std::sync::Arc;
use zipvfs::{FileSource, ZipArchive, ZipError, is_archive};

#[tokio::test]
async fn index_is_sorted_regardless_of_archive_order() {
    let archive = mount(
        ArchiveBuilder::new()
            .stored("zebra.txt", b"z")
            .stored("alpha.txt", b"a")
            .stored("d/nested", b"n")
            .stored("beta.txt", b"b")
            .build(),
    )
    .await;

    assert_eq!(archive.entry_count(), 4);
    let names: Vec<&str> = archive.entries().map(|e| e.name).collect();
    assert_eq!(names, ["alpha.txt", "beta.txt", "d/nested", "zebra.txt"]);
    assert!(names.windows(2).all(|w| w[0].as_bytes() < w[1].as_bytes()));
}

#[tokio::test]
async fn last_mod_time_decodes_the_dos_stamp() {
    use chrono::TimeZone;

    let archive = mount(ArchiveBuilder::new().stored("f", b"x").build()).await;

    let expected = chrono::Local
        .with_ymd_and_hms(2024, 5, 6, 7, 8, 10)
        .single()
        .map(|dt| dt.timestamp());
    assert_eq!(archive.last_mod_time("f"), expected);
    assert_eq!(archive.last_mod_time("missing"), None);
}

#[tokio::test]
async fn self_extracting_prefix_is_transparent() {
    let plain = ArchiveBuilder::new()
        .stored("hello.txt", b"hi\n")
        .deflated("data.bin", b"some deflated payload")
        .build();
    let prefixed = ArchiveBuilder::new()
        .stored("hello.txt", b"hi\n")
        .deflated("data.bin", b"some deflated payload")
        .build_with_prefix(1024);

    for bytes in [plain, prefixed] {
        let mut archive = mount(bytes).await;
        assert!(archive.exists("hello.txt"));

        let mut file = archive.open_read("hello.txt").await.unwrap();
        assert_eq!(read_all(&mut file).await, b"hi\n");

        let mut file = archive.open_read("data.bin").await.unwrap();
        assert_eq!(read_all(&mut file).await, b"some deflated payload");
    }
}

#[tokio::test]
async fn archive_comment_is_tolerated() {
    let bytes = ArchiveBuilder::new()
        .stored("f", b"x")
        .build_with_comment(b"built by a test; PK is not a signature here");
    let mut archive = mount(bytes).await;

    let mut file = archive.open_read("f").await.unwrap();
    assert_eq!(read_all(&mut file).await, b"x");
}

#[tokio::test]
async fn trailing_garbage_is_a_comment_length_mismatch() {
    let mut bytes = ArchiveBuilder::new().stored("f", b"x").build();
    bytes.extend_from_slice(&[0u8; 7]);

    let err = ZipArchive::open(Arc::new(MemSource(bytes)), "t")
        .await
        .unwrap_err();
    assert!(matches!(err, ZipError::Unsupported(_)), "got {err:?}");
}

#[tokio::test]
async fn multi_disk_archives_are_rejected() {
    let mut bytes = ArchiveBuilder::new().stored("f", b"x").build();
    let eocd = bytes.len() - 22;
    bytes[eocd + 4] = 1; // number of this disk

    let err = ZipArchive::open(Arc::new(MemSource(bytes)), "t")
        .await
        .unwrap_err();
    assert!(matches!(err, ZipError::Unsupported(_)), "got {err:?}");
}

#[tokio::test]
async fn disagreeing_entry_counts_are_rejected() {
    let mut bytes = ArchiveBuilder::new().stored("f", b"x").build();
    let eocd = bytes.len() - 22;
    bytes[eocd + 8] = 9; // entries on this disk != total entries

    let err = ZipArchive::open(Arc::new(MemSource(bytes)), "t")
        .await
        .unwrap_err();
    assert!(matches!(err, ZipError::Unsupported(_)), "got {err:?}");
}

#[tokio::test]
async fn zip64_markers_are_rejected() {
    let mut bytes = ArchiveBuilder::new().stored("f", b"x").build();
    let eocd = bytes.len() - 22;
    // Both entry counts escape to 0xFFFF.
    bytes[eocd + 8..eocd + 12].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);

    let err = ZipArchive::open(Arc::new(MemSource(bytes)), "t")
        .await
        .unwrap_err();
    assert!(matches!(err, ZipError::Unsupported(_)), "got {err:?}");
}

#[tokio::test]
async fn junk_is_not_an_archive() {
    let junk: Vec<u8> = (0u32..2000).map(|i| (i * 31 % 251) as u8).collect();
    let source = MemSource(junk.clone());
    assert!(!is_archive(&source).await);

    let err = ZipArchive::open(Arc::new(source), "junk")
        .await
        .unwrap_err();
    assert!(matches!(err, ZipError::NotAnArchive), "got {err:?}");
}

#[tokio::test]
async fn probe_accepts_plain_and_prefixed_archives() {
    let plain = ArchiveBuilder::new().stored("f", b"x").build();
    assert!(is_archive(&MemSource(plain)).await);

    // A prefixed archive does not start with a local header signature;
    // the probe falls through to the end-record scan.
    let prefixed = ArchiveBuilder::new()
        .stored("f", b"x")
        .build_with_prefix(512);
    assert!(is_archive(&MemSource(prefixed)).await);
}

#[tokio::test]
async fn empty_archive_mounts() {
    let archive = mount(ArchiveBuilder::new().build()).await;
    assert_eq!(archive.entry_count(), 0);
    assert!(!archive.exists("anything"));
    assert!(archive.enumerate("", false).is_empty());
}

#[tokio::test]
async fn unknown_method_is_rejected_at_open_not_at_mount() {
    let bytes = ArchiveBuilder::new()
        .with_method("packed.bz2", b"not really bzip2", 12)
        .stored("plain.txt", b"ok")
        .build();
    let mut archive = mount(bytes).await;

    // Mounting succeeded and the sibling entry is readable.
    let mut file = archive.open_read("plain.txt").await.unwrap();
    assert_eq!(read_all(&mut file).await, b"ok");

    let err = archive.open_read("packed.bz2").await.unwrap_err();
    assert!(matches!(err, ZipError::UnsupportedCompression(12)), "got {err:?}");
}

#[tokio::test]
async fn mounts_from_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.zip");
    std::fs::write(
        &path,
        ArchiveBuilder::new().stored("hello.txt", b"hi\n").build(),
    )
    .unwrap();

    let source = Arc::new(FileSource::open(&path).unwrap());
    assert!(is_archive(&*source).await);

    let mut archive = ZipArchive::open(source, path.display().to_string())
        .await
        .unwrap();
    let mut file = archive.open_read("hello.txt").await.unwrap();
    assert_eq!(read_all(&mut file).await, b"hi\n");
}

#[tokio::test]
async fn write_side_operations_are_read_only() {
    let mut archive = mount(ArchiveBuilder::new().stored("f", b"x").build()).await;

    assert!(matches!(archive.open_write("f"), Err(ZipError::ReadOnly)));
    assert!(matches!(archive.open_append("f"), Err(ZipError::ReadOnly)));
    assert!(matches!(archive.mkdir("d"), Err(ZipError::ReadOnly)));
    assert!(matches!(archive.remove("f"), Err(ZipError::ReadOnly)));
}
