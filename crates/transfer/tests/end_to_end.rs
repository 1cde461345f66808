//! End-to-end protocol scenarios over the in-memory remote.

use std::io::{Cursor, Read};

use tempfile::tempdir;
use test_support::MemoryRemoteFs;
use transfer::{
    dispatch, fetch_for_delivery, ArchiveOptions, FetchOptions, PlainSource, ReserveOptions,
    SendOptions,
};

use settings::DuplicatePolicy;

fn two_megabytes() -> Vec<u8> {
    // Deterministic non-repeating-ish payload; content equality below would
    // catch truncation or reordering.
    (0..2 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect()
}

#[test]
fn staged_send_with_timestamp_suffix_round_trips() {
    let mut fs = MemoryRemoteFs::new("/home/user");
    fs.add_dir("/outbox");
    let handle = fs.handle();
    let payload = two_megabytes();
    let source = Box::new(PlainSource::new(Cursor::new(payload.clone())));

    let options = SendOptions {
        temp_dir: Some("staging".to_owned()),
        add_timestamp_suffix: true,
        duplicate_policy: DuplicatePolicy::ThrowException,
    };
    let final_name = dispatch(Box::new(fs), source, "/outbox", "payload.bin", &options)
        .expect("send succeeds");

    // The final name carries no in-flight suffix remnants.
    assert_eq!(final_name, "payload.bin");
    let received = handle
        .file_contents("/outbox/payload.bin")
        .expect("file at final destination");
    assert_eq!(received.len(), payload.len());
    assert_eq!(received, payload);
    // Nothing left behind in the temp directory, session released.
    assert!(handle.has_dir("/outbox/staging"));
    assert!(!handle.has_file("/outbox/staging/payload.bin"));
    assert!(handle.is_closed());
}

#[test]
fn inbound_fetch_with_reserve_and_archive() {
    let mut fs = MemoryRemoteFs::new("/home/user");
    fs.add_file("/inbox/orders.csv", b"id,qty\n1,3\n");
    let handle = fs.handle();
    let archive_root = tempdir().expect("archive dir");

    let options = FetchOptions {
        auto_delete: true,
        keep_file_on_error: false,
        reserve: Some(ReserveOptions {
            temp_dir: "picked".to_owned(),
            add_timestamp_suffix: false,
        }),
        archive: Some(ArchiveOptions {
            archive_dir: archive_root.path().to_path_buf(),
            temp_receiving_dir: Some("receiving".to_owned()),
            temp_sending_dir: Some("sending".to_owned()),
        }),
    };

    let mut deliverable =
        fetch_for_delivery(Box::new(fs), "/inbox", "orders.csv", &options).expect("fetch");
    assert_eq!(deliverable.original_name(), "orders.csv");

    // The archive copy settled the remote source already.
    assert!(!handle.has_file("/inbox/orders.csv"));
    assert!(!handle.has_file("/inbox/picked/orders.csv"));

    let mut content = Vec::new();
    deliverable.read_to_end(&mut content).expect("read archive copy");
    assert_eq!(content, b"id,qty\n1,3\n");
    deliverable.close().expect("clean close");

    // Final archive placement happened on close.
    let archived = std::fs::read(archive_root.path().join("orders.csv")).expect("archived file");
    assert_eq!(archived, b"id,qty\n1,3\n");
    assert!(!archive_root.path().join("sending/orders.csv").exists());
    assert!(handle.is_closed());
}

#[test]
fn failed_send_leaves_no_trace_at_the_destination() {
    let mut fs = MemoryRemoteFs::new("/home/user");
    fs.add_dir("/outbox");
    fs.fail_next_put();
    let handle = fs.handle();
    let source = Box::new(PlainSource::new(Cursor::new(two_megabytes())));

    let options = SendOptions {
        temp_dir: Some("staging".to_owned()),
        add_timestamp_suffix: true,
        duplicate_policy: DuplicatePolicy::ThrowException,
    };
    let result = dispatch(Box::new(fs), source, "/outbox", "payload.bin", &options);

    assert!(result.is_err());
    assert!(!handle.has_file("/outbox/payload.bin"));
    assert!(handle.is_closed());
}
