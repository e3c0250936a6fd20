//! End-to-end system tests
//!
//! These tests run a real relay process and drive viewers against it
//! through the CLI.
//!
//! **These tests are ignored by default** because they require available
//! network ports.
//!
//! Run with: `cargo test --test e2e_test -- --ignored`

use std::net::TcpStream;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

/// Base port for test relays
static PORT_COUNTER: AtomicU16 = AtomicU16::new(0);

fn get_test_port() -> u16 {
    41000 + PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

struct TestConfig {
    dir: tempfile::TempDir,
    port: u16,
}

impl TestConfig {
    fn new(port: u16) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        Self { dir, port }
    }

    /// Write a viewer config with its own data dir
    fn viewer(&self, name: &str) -> String {
        let path = self.dir.path().join(format!("{}.toml", name));
        let config = format!(
            r#"
[store]
data_dir = {:?}
relay_address = "127.0.0.1:{}"
connect_timeout = 2
label = "{}"

[relay]
bind_address = "127.0.0.1:{}"
"#,
            self.dir.path().join(name).display().to_string(),
            self.port,
            name,
            self.port
        );
        std::fs::write(&path, config).expect("Failed to write config");
        path.display().to_string()
    }
}

struct TestRelay {
    process: Child,
    config: TestConfig,
}

impl TestRelay {
    fn start() -> Self {
        let config = TestConfig::new(get_test_port());
        let relay_config = config.viewer("relay");

        let process = Command::new(env!("CARGO_BIN_EXE_teamwall"))
            .args(["--config", &relay_config, "relay"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to start relay");

        let relay = Self { process, config };
        assert!(
            wait_for_port(relay.config.port, Duration::from_secs(5)),
            "Relay did not start within timeout"
        );
        relay
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

fn wait_for_port(port: u16, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

fn run(config: &str, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_teamwall"))
        .args(["--config", config])
        .args(args)
        .output()
        .expect("Failed to run teamwall")
}

#[test]
#[ignore] // Requires free ports - run with: cargo test -- --ignored
fn test_e2e_toggle_is_broadcast() {
    let relay = TestRelay::start();
    let viewer = relay.config.viewer("lobby");

    let output = run(&viewer, &["toggle", "4"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "toggle failed: {:?}", output);
    assert!(
        stdout.contains("Change sent to other viewers"),
        "Expected a sent broadcast, got: {}",
        stdout
    );
}

#[test]
#[ignore]
fn test_e2e_watcher_receives_update() {
    let relay = TestRelay::start();
    let watcher_config = relay.config.viewer("watcher");
    let editor_config = relay.config.viewer("editor");

    let mut watcher = Command::new(env!("CARGO_BIN_EXE_teamwall"))
        .args(["--config", &watcher_config, "watch"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start watcher");

    // give the watcher time to join
    std::thread::sleep(Duration::from_millis(500));

    let status = run(&editor_config, &["status"]);
    assert!(
        String::from_utf8_lossy(&status.stdout).contains("Connected (1 peer)"),
        "editor should see the watcher"
    );

    let output = run(&editor_config, &["update", "9", "--task", "Site inspection"]);
    assert!(output.status.success());

    std::thread::sleep(Duration::from_millis(500));
    let _ = watcher.kill();
    let watched = watcher.wait_with_output().expect("Failed to collect watcher output");

    assert!(
        String::from_utf8_lossy(&watched.stdout).contains("Site inspection"),
        "watcher never printed the update"
    );
}

#[test]
#[ignore]
fn test_e2e_relay_down_falls_back_to_local() {
    let config = TestConfig::new(get_test_port());
    let viewer = config.viewer("alone");

    let output = run(&viewer, &["toggle", "1"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("running local-only"));
    assert!(String::from_utf8_lossy(&output.stdout).contains("no relay connection"));
}
