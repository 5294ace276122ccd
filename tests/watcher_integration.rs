//! Integration tests for the folder watcher pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tempfile::TempDir;

use attachment_renamer::capture::{
    CaptureError, CaptureOutcome, CapturedImage, MetadataBundle, MetadataCapture, NoCapture,
};
use attachment_renamer::clock::{Clock, ManualClock};
use attachment_renamer::config::RenamerConfig;
use attachment_renamer::watcher::{FolderWatcher, ScanReport, WatcherError};

enum Script {
    Bundle(MetadataBundle),
    NoFields,
    Fail,
}

/// Capture double that counts calls.
struct ScriptedCapture {
    script: Script,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MetadataCapture for ScriptedCapture {
    async fn capture(&self) -> CaptureOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Fail => CaptureOutcome::Failed(CaptureError::TimedOut(Duration::from_secs(10))),
            Script::Bundle(_) | Script::NoFields => CaptureOutcome::Captured(CapturedImage {
                bytes: b"PNG".to_vec(),
                text: String::new(),
            }),
        }
    }

    fn extract(&self, _image: &CapturedImage) -> Option<MetadataBundle> {
        match &self.script {
            Script::Bundle(bundle) => Some(bundle.clone()),
            Script::NoFields | Script::Fail => None,
        }
    }
}

struct Harness {
    _root: TempDir,
    watch: PathBuf,
    out: PathBuf,
    clock: Arc<ManualClock>,
    watcher: FolderWatcher,
}

fn wall() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2025-03-01 09:15:30", "%Y-%m-%d %H:%M:%S").unwrap()
}

fn harness_with(capture: Box<dyn MetadataCapture>, same_output: bool) -> Harness {
    let root = TempDir::new().unwrap();
    let watch = root.path().join("downloads");
    let out = if same_output {
        watch.clone()
    } else {
        root.path().join("renamed")
    };
    std::fs::create_dir_all(&watch).unwrap();

    let config = RenamerConfig {
        watch_dir: watch.clone(),
        output_dir: out.clone(),
        ..Default::default()
    };
    let clock = Arc::new(ManualClock::new(wall()));
    let watcher =
        FolderWatcher::new(&config, capture, Arc::clone(&clock) as Arc<dyn Clock>).unwrap();

    Harness {
        _root: root,
        watch,
        out,
        clock,
        watcher,
    }
}

fn harness() -> Harness {
    harness_with(Box::new(NoCapture), false)
}

fn counting(script: Script) -> (Box<dyn MetadataCapture>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let capture = ScriptedCapture {
        script,
        calls: Arc::clone(&calls),
    };
    (Box::new(capture), calls)
}

fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn pre_existing_files_are_not_touched() {
    let mut h = harness();
    let old = h.watch.join("old_file.jpg");
    std::fs::write(&old, b"existing").unwrap();

    assert_eq!(h.watcher.seed().await.unwrap(), 1);
    for _ in 0..3 {
        let report = h.watcher.scan_once().await.unwrap();
        assert_eq!(report, ScanReport::default());
    }

    assert!(old.exists());
    assert!(file_names(&h.out).is_empty());
    assert!(h.watcher.state().get(&old).unwrap().processed);
}

#[tokio::test]
async fn new_file_is_renamed_once_size_settles() {
    let mut h = harness();
    h.watcher.seed().await.unwrap();
    let source = h.watch.join("alice_bob_2024.jpg");
    std::fs::write(&source, b"jpeg-data").unwrap();

    let first = h.watcher.scan_once().await.unwrap();
    assert_eq!(first.new, 1);
    assert_eq!(first.deferred, 1);
    assert_eq!(first.processed, 0);
    assert!(source.exists());

    let second = h.watcher.scan_once().await.unwrap();
    assert_eq!(second.processed, 1);
    assert!(!source.exists());
    assert_eq!(
        file_names(&h.out),
        vec!["alice_bob_2025-03-01_09-15-30.jpg"]
    );

    let third = h.watcher.scan_once().await.unwrap();
    assert_eq!(third.removed, 1);
    assert!(h.watcher.state().is_empty());
}

#[tokio::test]
async fn growing_file_is_deferred() {
    let mut h = harness();
    h.watcher.seed().await.unwrap();
    let source = h.watch.join("grow_ing.jpg");
    std::fs::write(&source, b"0123456789").unwrap();

    assert_eq!(h.watcher.scan_once().await.unwrap().deferred, 1);

    std::fs::write(&source, b"0123456789abcdefghij").unwrap();
    let report = h.watcher.scan_once().await.unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(report.processed, 0);

    let report = h.watcher.scan_once().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(file_names(&h.out).len(), 1);
}

#[tokio::test]
async fn empty_file_is_not_tracked_until_written() {
    let mut h = harness();
    h.watcher.seed().await.unwrap();
    let source = h.watch.join("empty_one.jpg");
    std::fs::write(&source, b"").unwrap();

    let report = h.watcher.scan_once().await.unwrap();
    assert_eq!(report.new, 0);
    assert!(h.watcher.state().get(&source).is_none());

    std::fs::write(&source, b"content").unwrap();
    assert_eq!(h.watcher.scan_once().await.unwrap().new, 1);
}

#[tokio::test]
async fn truncated_file_is_not_renamed() {
    let mut h = harness();
    h.watcher.seed().await.unwrap();
    let source = h.watch.join("alice_bob.jpg");
    std::fs::write(&source, b"jpeg").unwrap();
    assert_eq!(h.watcher.scan_once().await.unwrap().new, 1);

    std::fs::write(&source, b"").unwrap();
    for _ in 0..2 {
        let report = h.watcher.scan_once().await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.deferred, 1);
    }
    assert!(source.exists());
    assert!(file_names(&h.out).is_empty());

    std::fs::write(&source, b"jpeg-data").unwrap();
    assert_eq!(h.watcher.scan_once().await.unwrap().processed, 0);
    assert_eq!(h.watcher.scan_once().await.unwrap().processed, 1);
    assert_eq!(
        file_names(&h.out),
        vec!["alice_bob_2025-03-01_09-15-30.jpg"]
    );
}

#[tokio::test]
async fn temporary_download_renames_final_file() {
    let mut h = harness();
    h.watcher.seed().await.unwrap();
    let temp = h.watch.join("carol_dave.jpg_tmp");
    let final_path = h.watch.join("carol_dave.jpg");
    std::fs::write(&temp, b"partial").unwrap();

    // The downloader finishes while the watcher is waiting.
    let (from, to) = (temp.clone(), final_path.clone());
    h.clock.on_sleep(move |_| {
        if from.exists() {
            std::fs::rename(&from, &to).unwrap();
        }
    });

    assert_eq!(h.watcher.scan_once().await.unwrap().deferred, 1);
    let report = h.watcher.scan_once().await.unwrap();
    assert_eq!(report.processed, 1);

    assert!(!temp.exists());
    assert!(!final_path.exists());
    let renamed = file_names(&h.out);
    assert_eq!(renamed.len(), 1);
    assert!(renamed[0].starts_with("carol_dave_2025-03-01_09-15-"));
    assert!(
        Path::new(&renamed[0])
            .extension()
            .is_some_and(|ext| ext == "jpg")
    );

    assert_eq!(h.watcher.scan_once().await.unwrap().removed, 1);
}

#[tokio::test]
async fn temporary_download_that_never_finishes_times_out() {
    let (capture, calls) = counting(Script::NoFields);
    let mut h = harness_with(capture, false);
    h.watcher.seed().await.unwrap();
    let temp = h.watch.join("x_y.jpg_tmp");
    std::fs::write(&temp, b"partial").unwrap();

    h.watcher.scan_once().await.unwrap();
    let report = h.watcher.scan_once().await.unwrap();

    assert_eq!(report.processed, 1);
    assert!(h.clock.elapsed() >= Duration::from_secs(30));
    assert!(temp.exists());
    assert!(file_names(&h.out).is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Not retried while the path stays unchanged.
    let sleeps = h.clock.sleep_count();
    assert_eq!(h.watcher.scan_once().await.unwrap().processed, 0);
    assert_eq!(h.clock.sleep_count(), sleeps);
}

#[tokio::test]
async fn metadata_names_file_and_saves_audit_copy() {
    let bundle = MetadataBundle::new(
        "Alice",
        vec!["MVR100.00".to_string(), "REF123".to_string()],
        "2025-02-24_16-24-00",
    );
    let (capture, calls) = counting(Script::Bundle(bundle));
    let mut h = harness_with(capture, false);
    h.watcher.seed().await.unwrap();
    std::fs::write(h.watch.join("IMG-0001.jpg"), b"jpeg").unwrap();

    h.watcher.scan_once().await.unwrap();
    h.watcher.scan_once().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        file_names(&h.out),
        vec!["Alice_MVR100.00_REF123_2025-02-24_16-24-00.jpg"]
    );
    assert_eq!(
        file_names(&h.out.join("debug_screenshots")),
        vec!["Alice_MVR100.00_REF123_2025-03-01_09-15-30.png"]
    );
}

#[tokio::test]
async fn capture_failure_falls_back_to_filename() {
    let (capture, calls) = counting(Script::Fail);
    let mut h = harness_with(capture, false);
    h.watcher.seed().await.unwrap();
    std::fs::write(h.watch.join("bob_eve_photo.png"), b"png").unwrap();

    h.watcher.scan_once().await.unwrap();
    h.watcher.scan_once().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(file_names(&h.out), vec!["bob_eve_2025-03-01_09-15-30.png"]);
    assert!(!h.out.join("debug_screenshots").exists());
}

#[tokio::test]
async fn unrecognized_capture_falls_back_to_filename() {
    let (capture, _calls) = counting(Script::NoFields);
    let mut h = harness_with(capture, false);
    h.watcher.seed().await.unwrap();
    std::fs::write(h.watch.join("single.jpg"), b"jpeg").unwrap();

    h.watcher.scan_once().await.unwrap();
    h.watcher.scan_once().await.unwrap();

    assert_eq!(
        file_names(&h.out),
        vec!["Unknown_Unknown_2025-03-01_09-15-30.jpg"]
    );
}

#[tokio::test]
async fn settled_file_triggers_exactly_one_attempt() {
    let (capture, calls) = counting(Script::NoFields);
    let mut h = harness_with(capture, false);
    h.watcher.seed().await.unwrap();
    std::fs::write(h.watch.join("one_shot.jpg"), b"jpeg").unwrap();

    let mut processed = 0;
    for _ in 0..5 {
        processed += h.watcher.scan_once().await.unwrap().processed;
    }

    assert_eq!(processed, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_rename_is_not_retried() {
    let (capture, calls) = counting(Script::NoFields);
    let mut h = harness_with(capture, false);
    h.watcher.seed().await.unwrap();
    std::fs::create_dir_all(&h.out).unwrap();
    std::fs::write(h.out.join("dup_name_2025-03-01_09-15-30.jpg"), b"old").unwrap();
    let source = h.watch.join("dup_name.jpg");
    std::fs::write(&source, b"new").unwrap();

    for _ in 0..4 {
        h.watcher.scan_once().await.unwrap();
    }

    assert!(source.exists());
    assert_eq!(
        std::fs::read(h.out.join("dup_name_2025-03-01_09-15-30.jpg")).unwrap(),
        b"old"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn removed_file_is_forgotten() {
    let mut h = harness();
    h.watcher.seed().await.unwrap();
    let source = h.watch.join("short_lived.jpg");
    std::fs::write(&source, b"jpeg").unwrap();

    h.watcher.scan_once().await.unwrap();
    assert!(h.watcher.state().get(&source).is_some());

    std::fs::remove_file(&source).unwrap();
    let report = h.watcher.scan_once().await.unwrap();

    assert_eq!(report.removed, 1);
    assert_eq!(report.processed, 0);
    assert!(h.watcher.state().get(&source).is_none());
}

#[tokio::test]
async fn modified_existing_file_is_reopened() {
    let mut h = harness();
    let source = h.watch.join("eve_frank.jpg");
    std::fs::write(&source, b"v1").unwrap();
    h.watcher.seed().await.unwrap();

    std::fs::write(&source, b"version-two").unwrap();
    let report = h.watcher.scan_once().await.unwrap();
    assert_eq!(report.reopened, 1);
    assert_eq!(report.deferred, 1);

    let report = h.watcher.scan_once().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(
        file_names(&h.out),
        vec!["eve_frank_2025-03-01_09-15-30.jpg"]
    );
}

#[tokio::test]
async fn renamed_output_in_watched_folder_is_skipped() {
    let (capture, calls) = counting(Script::NoFields);
    let mut h = harness_with(capture, true);
    h.watcher.seed().await.unwrap();
    std::fs::write(h.watch.join("gina_hal.jpg"), b"jpeg").unwrap();

    for _ in 0..6 {
        h.watcher.scan_once().await.unwrap();
    }

    assert_eq!(
        file_names(&h.watch),
        vec!["gina_hal_2025-03-01_09-15-30.jpg"]
    );
    // Only the original download asked for metadata.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_fails_fast_when_watch_dir_missing() {
    let mut h = harness();
    std::fs::remove_dir_all(&h.watch).unwrap();

    let err = h.watcher.run().await.unwrap_err();

    assert!(matches!(err, WatcherError::WatchDirMissing(_)));
}

#[tokio::test]
async fn run_renames_and_survives_scan_errors() {
    let mut h = harness();
    let watch = h.watch.clone();
    h.clock.on_sleep(move |elapsed| {
        if elapsed == Duration::from_secs(2) {
            std::fs::write(watch.join("ivy_jack.jpg"), b"jpeg").unwrap();
        }
        if elapsed == Duration::from_secs(20) && watch.exists() {
            std::fs::remove_dir_all(&watch).unwrap();
        }
    });

    let result = tokio::time::timeout(Duration::from_millis(500), h.watcher.run()).await;

    // Still looping after the folder vanished.
    assert!(result.is_err());
    assert!(h.clock.elapsed() > Duration::from_secs(20));
    assert_eq!(
        file_names(&h.out),
        vec!["ivy_jack_2025-03-01_09-15-34.jpg"]
    );
}
