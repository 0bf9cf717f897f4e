//! Streaming file handles through paths

use polypath_core::{AsyncPath, BlockingPath, Error, Whence};
use polypath_testing::{MemoryStore, TestDir};
use std::io::{BufRead, Read, Seek, SeekFrom, Write};

fn digits(path: &BlockingPath) {
    path.write_text("0123456789").unwrap();
}

#[test]
fn test_forward_only_seek() {
    let dir = TestDir::new().unwrap();
    let store = MemoryStore::new();
    for path in [
        dir.root().unwrap().join("digits.txt"),
        store.path("memory://bucket/digits.txt").unwrap(),
    ] {
        digits(&path);
        let mut handle = path.open("rb").unwrap();

        assert_eq!(handle.read(Some(3)).unwrap().as_ref(), b"012");
        assert_eq!(handle.tell().unwrap(), 3);

        assert_eq!(handle.seek(6, Whence::Start).unwrap(), 6);
        assert_eq!(handle.read(Some(2)).unwrap().as_ref(), b"67");

        let err = handle.seek(2, Whence::Start).unwrap_err();
        assert!(matches!(
            err,
            Error::BackwardSeekUnsupported {
                position: 8,
                target: 2
            }
        ));
        assert!(matches!(
            handle.seek(0, Whence::End).unwrap_err(),
            Error::EndSeekUnsupported
        ));

        assert_eq!(handle.seek(0, Whence::Start).unwrap(), 0);
        assert_eq!(handle.read(None).unwrap().as_ref(), b"0123456789");
        assert_eq!(
            handle.seek(-1, Whence::Current).unwrap_err().to_string(),
            "Backward seek not supported for streaming reads (position 10, target 9)"
        );
        handle.close().unwrap();
    }
}

#[test]
fn test_use_after_close_and_mode_checks() {
    let store = MemoryStore::new();
    let path = store.path("memory://bucket/file.txt").unwrap();
    digits(&path);

    let mut reader = path.open("r").unwrap();
    assert!(matches!(
        reader.write_str("nope").unwrap_err(),
        Error::UnsupportedOperation(_)
    ));
    reader.close().unwrap();
    reader.close().unwrap();
    assert!(matches!(
        reader.read_text(None).unwrap_err(),
        Error::UseAfterClose
    ));

    let mut writer = path.open("w").unwrap();
    assert!(matches!(
        writer.tell().unwrap_err(),
        Error::UnsupportedOperation(_)
    ));
    writer.close().unwrap();
    assert!(matches!(writer.write_str("late").unwrap_err(), Error::UseAfterClose));

    for mode in ["x", "rr", "rw", "bt", ""] {
        assert!(
            matches!(path.open(mode).unwrap_err(), Error::UnsupportedMode(_)),
            "{mode:?}"
        );
    }
}

#[test]
fn test_std_io_traits() {
    let dir = TestDir::new().unwrap();
    let path = dir.root().unwrap().join("io.txt");

    {
        let mut handle = path.open("wb").unwrap();
        writeln!(handle, "first line").unwrap();
        handle.write_all(b"second line\n").unwrap();
        handle.flush().unwrap();
    }
    assert_eq!(path.read_text().unwrap(), "first line\nsecond line\n");

    let mut handle = path.open("rb").unwrap();
    let mut line = String::new();
    handle.read_line(&mut line).unwrap();
    assert_eq!(line, "first line\n");
    assert_eq!(handle.stream_position().unwrap(), 11);

    Seek::seek(&mut handle, SeekFrom::Current(7)).unwrap();
    let mut rest = String::new();
    handle.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "line\n");

    let err = Seek::seek(&mut handle, SeekFrom::Start(3)).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn test_text_lines() {
    let store = MemoryStore::new();
    let path = store.path("memory://bucket/lines.txt").unwrap();
    path.write_text("α\nβ\n\nγ").unwrap();

    let mut handle = path.open("r").unwrap();
    let lines: Vec<String> = (&mut handle).lines().collect::<polypath_core::Result<_>>().unwrap();
    assert_eq!(lines, vec!["α\n", "β\n", "\n", "γ"]);
    handle.close().unwrap();

    let mut handle = path.open("r").unwrap();
    assert_eq!(handle.read_text(Some(1)).unwrap(), "α");
    assert_eq!(handle.tell().unwrap(), 2);
    assert_eq!(handle.readline_text(Some(1)).unwrap(), "\n");
}

#[tokio::test]
async fn test_async_handles() {
    let store = MemoryStore::new();
    let path: AsyncPath = store.async_path("memory://bucket/async.txt").unwrap();
    path.write_text("Existing ").await.unwrap();

    let mut handle = path.open("a").await.unwrap();
    handle.write_str("Append").unwrap();
    handle.close().await.unwrap();
    handle.close().await.unwrap();
    assert_eq!(path.read_text().await.unwrap(), "Existing Append");

    let mut handle = path.open("r").await.unwrap();
    assert_eq!(handle.seek(9, Whence::Start).await.unwrap(), 9);
    assert_eq!(handle.next_line().await.unwrap().as_deref(), Some("Append"));
    assert_eq!(handle.next_line().await.unwrap(), None);
    assert!(matches!(
        handle.seek(1, Whence::Start).await.unwrap_err(),
        Error::BackwardSeekUnsupported { .. }
    ));
    handle.close().await.unwrap();
}
