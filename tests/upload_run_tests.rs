use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

use photo_sync::{
    AppConfig, Error, IdentityKey, Ledger, MediaUploader, ProgressReporter, RunOutcome,
    SilentReporter, UploadEngine, UploadError, UploadReceipt,
};

/// Records every call; fails on the configured file name.
#[derive(Default)]
struct RecordingUploader {
    calls: Vec<PathBuf>,
    fail_on: Option<String>,
}

impl RecordingUploader {
    fn failing_on(name: &str) -> Self {
        Self {
            calls: Vec::new(),
            fail_on: Some(name.to_string()),
        }
    }

    fn call_names(&self) -> Vec<String> {
        self.calls
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

impl MediaUploader for RecordingUploader {
    fn upload_to_library(&mut self, path: &Path) -> Result<UploadReceipt, UploadError> {
        self.calls.push(path.to_path_buf());
        let name = path.file_name().unwrap().to_string_lossy();
        if self.fail_on.as_deref() == Some(name.as_ref()) {
            return Err(UploadError::Rejected {
                status: "500 Internal Server Error".into(),
                message: "backend unavailable".into(),
            });
        }
        Ok(UploadReceipt {
            media_item_id: Some(format!("id-{}", self.calls.len())),
        })
    }
}

/// Keeps every `(counter, path)` progress report.
#[derive(Default)]
struct RecordingReporter {
    uploads: RefCell<Vec<(usize, PathBuf)>>,
}

impl ProgressReporter for RecordingReporter {
    fn on_uploaded(&self, counter: usize, path: &Path) {
        self.uploads.borrow_mut().push((counter, path.to_path_buf()));
    }
}

struct Fixture {
    _tmp: TempDir,
    root: PathBuf,
    state: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("pics");
        let state = tmp.path().join("state");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&state).unwrap();
        Fixture {
            _tmp: tmp,
            root,
            state,
        }
    }

    fn file(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn config(&self, limit: usize) -> AppConfig {
        AppConfig {
            root_path: self.root.clone(),
            upload_limit: limit,
            ledger_path: self.ledger_path(),
            ignored_path: self.ignored_path(),
            ..AppConfig::default()
        }
    }

    fn ledger_path(&self) -> PathBuf {
        self.state.join("successed_file.txt")
    }

    fn ignored_path(&self) -> PathBuf {
        self.state.join("ignored_file.txt")
    }

    fn run(&self, limit: usize, uploader: &mut RecordingUploader) -> Result<photo_sync::RunResult, Error> {
        UploadEngine::new(self.config(limit)).run(uploader, &SilentReporter)
    }

    fn canonical(&self, rel: &str) -> PathBuf {
        fs::canonicalize(self.root.join(rel)).unwrap()
    }
}

#[test]
fn test_every_eligible_file_is_recorded() {
    let fx = Fixture::new();
    fx.file("a.jpg", b"aaaa");
    fx.file("b.png", b"bb");
    fx.file("nested/deeper/c.JPG", b"cccccc");

    let mut uploader = RecordingUploader::default();
    let result = fx.run(10, &mut uploader).unwrap();
    assert_eq!(result.outcome, RunOutcome::Completed);
    assert_eq!(result.uploaded, 3);

    let ledger = Ledger::load(&fx.ledger_path()).unwrap();
    assert_eq!(ledger.len(), 3);
    for (name, size, rel) in [
        ("a.jpg", 4, "a.jpg"),
        ("b.png", 2, "b.png"),
        ("c.JPG", 6, "nested/deeper/c.JPG"),
    ] {
        let key = IdentityKey::new(name, size);
        assert!(ledger.contains(&key), "{} missing from ledger", key);
        assert_eq!(ledger.get(&key), Some(fx.canonical(rel).as_path()));
    }

    let on_disk = fs::read_to_string(fx.ledger_path()).unwrap();
    assert_eq!(on_disk.lines().count(), 3);
    assert!(on_disk.contains("a.jpg,4,"));
}

#[test]
fn test_second_run_uploads_nothing() {
    let fx = Fixture::new();
    fx.file("a.jpg", b"1");
    fx.file("sub/b.jpg", b"22");

    let mut first = RecordingUploader::default();
    fx.run(10, &mut first).unwrap();
    assert_eq!(first.calls.len(), 2);

    let mut second = RecordingUploader::default();
    let result = fx.run(10, &mut second).unwrap();
    assert!(second.calls.is_empty());
    assert_eq!(result.uploaded, 0);
    assert_eq!(result.duplicates, 2);
    assert_eq!(result.outcome, RunOutcome::Completed);
}

#[test]
fn test_cap_stops_run_and_next_run_resumes() {
    let fx = Fixture::new();
    for name in ["1.jpg", "2.jpg", "3.jpg", "4.jpg", "5.jpg"] {
        fx.file(name, name.as_bytes());
    }

    let mut first = RecordingUploader::default();
    let result = fx.run(2, &mut first).unwrap();
    assert_eq!(result.outcome, RunOutcome::CapReached);
    assert_eq!(first.call_names(), vec!["1.jpg", "2.jpg"]);
    assert_eq!(Ledger::load(&fx.ledger_path()).unwrap().len(), 2);

    let mut second = RecordingUploader::default();
    let result = fx.run(3, &mut second).unwrap();
    assert_eq!(second.call_names(), vec!["3.jpg", "4.jpg", "5.jpg"]);
    assert_eq!(result.outcome, RunOutcome::CapReached);
    assert_eq!(Ledger::load(&fx.ledger_path()).unwrap().len(), 5);

    let mut third = RecordingUploader::default();
    let result = fx.run(3, &mut third).unwrap();
    assert!(third.calls.is_empty());
    assert_eq!(result.outcome, RunOutcome::Completed);
}

#[test]
fn test_uploads_follow_sorted_name_order() {
    let fx = Fixture::new();
    fx.file("b.jpg", b"b");
    fx.file("a.jpg", b"a");
    fx.file("c.JPG", b"c");

    let mut uploader = RecordingUploader::default();
    fx.run(10, &mut uploader).unwrap();
    assert_eq!(uploader.call_names(), vec!["a.jpg", "b.jpg", "c.JPG"]);
}

#[test]
fn test_subdirectory_finished_before_next_sibling() {
    let fx = Fixture::new();
    fx.file("a.jpg", b"a");
    fx.file("b/x.jpg", b"x");
    fx.file("b/c/y.jpg", b"yy");
    fx.file("c.jpg", b"ccc");

    let mut uploader = RecordingUploader::default();
    fx.run(10, &mut uploader).unwrap();
    assert_eq!(uploader.call_names(), vec!["a.jpg", "y.jpg", "x.jpg", "c.jpg"]);
}

#[test]
fn test_wrong_extension_goes_to_ignored_log() {
    let fx = Fixture::new();
    fx.file("notes.txt", b"remember the milk");
    fx.file("photo.jpg", b"jpeg");
    fs::write(fx.ignored_path(), "/stale/from/last/run.txt\n").unwrap();

    let mut uploader = RecordingUploader::default();
    let result = fx.run(10, &mut uploader).unwrap();
    assert_eq!(result.ignored, 1);
    assert_eq!(uploader.call_names(), vec!["photo.jpg"]);

    let ignored = fs::read_to_string(fx.ignored_path()).unwrap();
    let expected = format!("{}\n", fx.canonical("notes.txt").display());
    assert_eq!(ignored, expected);

    let ledger = Ledger::load(&fx.ledger_path()).unwrap();
    assert!(!ledger.contains(&IdentityKey::new("notes.txt", 17)));
}

#[test]
fn test_empty_files_are_in_neither_log() {
    let fx = Fixture::new();
    fx.file("empty.jpg", b"");
    fx.file("empty.txt", b"");

    let mut uploader = RecordingUploader::default();
    let result = fx.run(10, &mut uploader).unwrap();
    assert!(uploader.calls.is_empty());
    assert_eq!(result.empty_files, 2);
    assert_eq!(result.ignored, 0);

    assert!(Ledger::load(&fx.ledger_path()).unwrap().is_empty());
    assert_eq!(fs::read_to_string(fx.ignored_path()).unwrap(), "");
}

#[test]
fn test_same_name_and_size_elsewhere_is_a_duplicate() {
    let fx = Fixture::new();
    fx.file("a.jpg", b"0123456789");
    fx.file("sub/a.jpg", b"abcdefghij");

    let mut uploader = RecordingUploader::default();
    let result = fx.run(10, &mut uploader).unwrap();
    assert_eq!(uploader.calls, vec![fx.canonical("a.jpg")]);
    assert_eq!(result.duplicates, 1);

    let ledger = Ledger::load(&fx.ledger_path()).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(
        ledger.get(&IdentityKey::new("a.jpg", 10)),
        Some(fx.canonical("a.jpg").as_path())
    );
}

#[test]
fn test_upload_failure_halts_with_context() {
    let fx = Fixture::new();
    fx.file("a.jpg", b"a");
    fx.file("b.jpg", b"b");
    fx.file("c.jpg", b"c");

    let mut uploader = RecordingUploader::failing_on("b.jpg");
    let err = fx.run(10, &mut uploader).unwrap_err();
    assert_eq!(uploader.call_names(), vec!["a.jpg", "b.jpg"]);

    match &err {
        Error::Upload { counter, path, source } => {
            assert_eq!(*counter, 1);
            assert_eq!(path, &fx.canonical("b.jpg"));
            assert!(matches!(source, UploadError::Rejected { .. }));
        }
        other => panic!("expected upload error, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.starts_with("1, "));
    assert!(message.contains("b.jpg"));
    assert!(message.contains("backend unavailable"));

    let ledger = Ledger::load(&fx.ledger_path()).unwrap();
    assert_eq!(ledger.len(), 1);
    assert!(!ledger.contains(&IdentityKey::new("b.jpg", 1)));

    let mut retry = RecordingUploader::default();
    fx.run(10, &mut retry).unwrap();
    assert_eq!(retry.call_names(), vec!["b.jpg", "c.jpg"]);
}

#[test]
fn test_interrupted_record_is_retried() {
    let fx = Fixture::new();
    fx.file("a.jpg", b"aa");
    fx.file("b.jpg", b"bb");

    // A previous run that uploaded a.jpg and died before b.jpg's record hit
    // the disk leaves only a.jpg behind.
    let mut ledger = Ledger::load(&fx.ledger_path()).unwrap();
    ledger
        .record(IdentityKey::new("a.jpg", 2), &fx.canonical("a.jpg"))
        .unwrap();
    drop(ledger);

    let mut uploader = RecordingUploader::default();
    fx.run(10, &mut uploader).unwrap();
    assert_eq!(uploader.call_names(), vec!["b.jpg"]);
}

#[test]
fn test_legacy_ledger_is_honoured() {
    let fx = Fixture::new();
    fx.file("old.jpg", b"12345");
    fx.file("new.jpg", b"123");
    fs::write(
        fx.ledger_path(),
        "old.jpg,5#~^^^~#/somewhere/else/old.jpg\n",
    )
    .unwrap();

    let mut uploader = RecordingUploader::default();
    fx.run(10, &mut uploader).unwrap();
    assert_eq!(uploader.call_names(), vec!["new.jpg"]);

    let contents = fs::read_to_string(fx.ledger_path()).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "old.jpg,5#~^^^~#/somewhere/else/old.jpg");
    assert!(lines[1].starts_with("new.jpg,3,"));
}

#[test]
fn test_custom_extensions_and_ignore_patterns() {
    let fx = Fixture::new();
    fx.file("a.heic", b"heic");
    fx.file("b.jpg", b"jpg");
    fx.file("cache/c.heic", b"cached");

    let mut config = fx.config(10);
    config.allowed_extensions = vec!["heic".into()];
    config.ignore_patterns = vec!["*/cache".into()];

    let mut uploader = RecordingUploader::default();
    let result = UploadEngine::new(config)
        .run(&mut uploader, &SilentReporter)
        .unwrap();
    assert_eq!(uploader.call_names(), vec!["a.heic"]);
    assert_eq!(result.ignored, 1);
}

#[test]
fn test_progress_reports_each_upload_in_order() {
    let fx = Fixture::new();
    fx.file("b.jpg", b"bb");
    fx.file("a.jpg", b"a");
    fx.file("sub/c.png", b"ccc");
    fx.file("notes.txt", b"skip me");

    let reporter = RecordingReporter::default();
    let mut uploader = RecordingUploader::default();
    let result = UploadEngine::new(fx.config(10))
        .run(&mut uploader, &reporter)
        .unwrap();
    assert_eq!(result.uploaded, 3);

    assert_eq!(
        reporter.uploads.into_inner(),
        vec![
            (1, fx.canonical("a.jpg")),
            (2, fx.canonical("b.jpg")),
            (3, fx.canonical("sub/c.png")),
        ]
    );
}

#[test]
fn test_progress_stops_at_cap_and_resumes_from_one() {
    let fx = Fixture::new();
    fx.file("a.jpg", b"a");
    fx.file("b.jpg", b"bb");
    fx.file("c.jpg", b"ccc");

    let first = RecordingReporter::default();
    UploadEngine::new(fx.config(2))
        .run(&mut RecordingUploader::default(), &first)
        .unwrap();
    assert_eq!(
        first.uploads.into_inner(),
        vec![(1, fx.canonical("a.jpg")), (2, fx.canonical("b.jpg"))]
    );

    let second = RecordingReporter::default();
    UploadEngine::new(fx.config(2))
        .run(&mut RecordingUploader::default(), &second)
        .unwrap();
    assert_eq!(second.uploads.into_inner(), vec![(1, fx.canonical("c.jpg"))]);
}

#[cfg(unix)]
#[test]
fn test_linked_photos_are_counted_not_uploaded() {
    let fx = Fixture::new();
    fx.file("a.jpg", b"a");
    let outside = fx.state.join("outside.jpg");
    fs::write(&outside, b"elsewhere").unwrap();
    std::os::unix::fs::symlink(&outside, fx.root.join("link.jpg")).unwrap();

    let mut uploader = RecordingUploader::default();
    let result = fx.run(10, &mut uploader).unwrap();
    assert_eq!(uploader.call_names(), vec!["a.jpg"]);
    assert_eq!(result.skipped_symlinks, 1);
    assert_eq!(result.walk_errors, 0);
}
