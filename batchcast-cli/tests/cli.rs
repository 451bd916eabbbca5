use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a config rooted in `dir` and returns its path.
fn write_config(dir: &Path) -> PathBuf {
    let config = dir.join("batchcast.yaml");
    let yaml = format!(
        "paths:\n  pending_dir: {root}/media\n  archive_dir: {root}/archive\n  history_file: {root}/upload_history.json\n  ratings_file: {root}/media_ratings.json\n  schedule_file: {root}/schedule_config.json\nbatch:\n  images_per_batch: 2\n  videos_per_batch: 1\n  selection_order: name\n",
        root = dir.display()
    );
    fs::write(&config, yaml).expect("Writing temp config failed");
    config
}

fn seeded_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let media = dir.path().join("media");
    fs::create_dir_all(&media).unwrap();
    fs::create_dir_all(dir.path().join("archive")).unwrap();
    for name in ["a.png", "b.jpg", "c.gif", "clip.mp4"] {
        fs::write(media.join(name), vec![0u8; 1024]).unwrap();
    }
    fs::write(media.join("notes.txt"), b"ignored").unwrap();
    dir
}

fn batchcast() -> Command {
    let mut cmd = Command::cargo_bin("batchcast").expect("Binary exists");
    cmd.env_remove("BATCHCAST_WEBHOOK_URL");
    cmd
}

#[test]
fn status_reports_queue_and_preview_without_a_webhook() {
    let dir = seeded_dir();
    let config = write_config(dir.path());

    batchcast()
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("images ready:  3")
                .and(predicate::str::contains("videos ready:  1"))
                .and(predicate::str::contains("Next batch: 2 images, 1 videos")),
        );

    assert!(dir.path().join("media").join("a.png").exists());
}

#[test]
fn schedule_changes_persist_between_invocations() {
    let dir = seeded_dir();
    let config = write_config(dir.path());

    batchcast()
        .arg("--config")
        .arg(&config)
        .args(["schedule", "set", "--hour", "7", "--minute", "45"])
        .assert()
        .success();
    batchcast()
        .arg("--config")
        .arg(&config)
        .args(["schedule", "disable"])
        .assert()
        .success();

    batchcast()
        .arg("--config")
        .arg(&config)
        .args(["schedule", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Daily upload at 07:45 (disabled)"));
}

#[test]
fn out_of_range_schedule_is_rejected() {
    let dir = seeded_dir();
    let config = write_config(dir.path());

    batchcast()
        .arg("--config")
        .arg(&config)
        .args(["schedule", "set", "--hour", "24", "--minute", "0"])
        .assert()
        .failure();
}

#[test]
fn upload_now_requires_the_webhook_url() {
    let dir = seeded_dir();
    let config = write_config(dir.path());

    batchcast()
        .arg("--config")
        .arg(&config)
        .arg("upload-now")
        .assert()
        .failure()
        .stderr(predicate::str::contains("BATCHCAST_WEBHOOK_URL"));

    assert!(dir.path().join("media").join("clip.mp4").exists());
}

#[test]
fn votes_are_deduplicated_per_voter() {
    let dir = seeded_dir();
    let config = write_config(dir.path());

    batchcast()
        .arg("--config")
        .arg(&config)
        .args(["vote", "a.png", "--voter", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Vote recorded for a.png"));
    batchcast()
        .arg("--config")
        .arg(&config)
        .args(["vote", "a.png", "--voter", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice already voted for a.png"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use batchcast_cli::cli::{run, Cli, Commands};

    let cli = Cli {
        config: PathBuf::from("dummy.yaml"),
        command: Commands::Status,
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
