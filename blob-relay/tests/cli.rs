use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Creates a minimal config file for the CLI to read.
fn create_minimal_config() -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(
        config.path(),
        b"source_container: unprocessed-pdf\ndestination_container: processed-pdf\nconnection_setting: BLOB_RELAY_TEST_STORAGE\n",
    )
    .expect("Writing temp config failed");
    config
}

#[test]
fn help_lists_commands() {
    let mut cmd = Command::cargo_bin("blob-relay").expect("Binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("copy")
                .and(predicate::str::contains("upload"))
                .and(predicate::str::contains("serve")),
        );
}

#[test]
fn copy_without_connection_setting_fails_with_setting_name() {
    let config = create_minimal_config();
    let mut cmd = Command::cargo_bin("blob-relay").expect("Binary exists");

    cmd.arg("copy")
        .arg("--config")
        .arg(config.path())
        .arg("--name")
        .arg("invoice.pdf")
        .env_remove("BLOB_RELAY_TEST_STORAGE")
        .env_remove("BLOB_RELAY_TEST_STORAGE__serviceUri")
        .env_remove("BLOB_RELAY_TEST_STORAGE__blobServiceUri");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("BLOB_RELAY_TEST_STORAGE"));
}

#[test]
fn copy_requires_a_name() {
    let mut cmd = Command::cargo_bin("blob-relay").expect("Binary exists");
    cmd.arg("copy");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--name"));
}

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
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

    use blob_relay::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Copy {
            config: Some(std::path::PathBuf::from("dummy.yaml")),
            name: "invoice.pdf".into(),
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
