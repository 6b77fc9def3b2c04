use serde_json::json;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    service_url: Option<String>,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
            service_url: None,
        }
    }

    /// Point the index and queue at a mock server
    fn with_server(mut self, server: &MockServer) -> Self {
        self.service_url = Some(server.uri());
        self
    }

    fn preferences_path(&self) -> PathBuf {
        self.xdg_data.join("sadash/mozilla-sa-dashboard.json")
    }

    fn seed_preferences(&self, content: &str) {
        let path = self.preferences_path();
        fs::create_dir_all(path.parent().expect("missing preferences parent"))
            .expect("failed to create preferences directory");
        fs::write(path, content).expect("failed to write preferences");
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("sadash"));

    let mut command = Command::new(bin_path);

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("SADASH_CHANNEL")
        .env_remove("RUST_LOG");

    match &env.service_url {
        Some(url) => {
            command
                .env("SADASH_INDEX_URL", format!("{}/index", url))
                .env("SADASH_QUEUE_URL", format!("{}/queue", url));
        }
        None => {
            // Nothing listens on the discard port
            command
                .env("SADASH_INDEX_URL", "http://127.0.0.1:9/index")
                .env("SADASH_QUEUE_URL", "http://127.0.0.1:9/queue");
        }
    }

    command
        .output()
        .unwrap_or_else(|e| panic!("failed to execute sadash: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "sadash {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

async fn mount_services(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(
            "/index/tasks/project.releng.services.project.production.shipit_static_analysis.phabricator",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tasks": [
                { "taskId": "taskA", "data": { "state": "done", "issues": 2, "indexed": "2018-05-02T10:00:00.000000Z" } },
                { "taskId": "taskB", "data": { "state": "error", "issues": 0, "indexed": "2018-05-03T10:00:00.000000Z" } }
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(
            "/index/tasks/project.releng.services.project.production.shipit_static_analysis.mozreview",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tasks": [] })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/queue/task/task[AB]/artifacts/public/results/report\.json$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "time": 1525255200.0,
            "revision": { "source": "phabricator", "rev": "abcdef" },
            "issues": [
                { "analyzer": "clang-tidy", "check": "modernize-use-nullptr", "message": "use nullptr", "publishable": true, "path": "dom/a.cpp", "line": 10 },
                { "analyzer": "mozlint", "linter": "flake8", "rule": "E501", "message": "line too long", "publishable": false, "path": "b.py", "line": 3 }
            ]
        })))
        .mount(server)
        .await;
}

#[test]
fn config_reports_paths_and_defaults() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["config"]);
    assert_success(&["config"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sadash Configuration"));
    assert!(stdout.contains("Index URL:       http://127.0.0.1:9/index"));
    assert!(stdout.contains("Namespaces:      mozreview, phabricator"));
    assert!(stdout.contains("Batch size:      10"));

    let log_pattern = env.xdg_state.join("sadash/sadash.log.YYYY-MM-DD");
    assert!(stdout.contains(&format!("Log files:       {}", log_pattern.display())));
}

#[test]
fn verbose_logs_to_dated_file() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["-v", "channel"]);
    assert_success(&["-v", "channel"], &output);

    let log_dir = env.xdg_state.join("sadash");
    let names: Vec<String> = fs::read_dir(&log_dir)
        .expect("log directory should exist")
        .map(|entry| entry.expect("readable entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        names.iter().any(|name| name.starts_with("sadash.log.")),
        "expected a dated log file, found {names:?}"
    );
    assert!(!log_dir.join("sadash.log").exists());
}

#[test]
fn channel_reads_preferences() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["channel"]);
    assert_success(&["channel"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Channel: production"));

    env.seed_preferences(r#"{"channel":"staging"}"#);
    let output = run_bin(&env, &["channel"]);
    assert_success(&["channel"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Channel: staging"));

    env.seed_preferences("{ broken");
    let output = run_bin(&env, &["channel"]);
    assert_success(&["channel"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Channel: production"));
}

#[test]
fn unknown_channel_is_rejected() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["channel", "nightly"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown channel: nightly"));
    assert!(!env.preferences_path().exists());
}

#[test]
fn unreachable_index_fails_with_context() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["tasks"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load indexes"));
}

#[tokio::test(flavor = "multi_thread")]
async fn tasks_and_stats_against_mock_services() {
    let server = MockServer::start().await;
    mount_services(&server).await;
    let env = CliTestEnv::new().with_server(&server);

    let output = run_bin(&env, &["tasks"]);
    assert_success(&["tasks"], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Tasks:   2 indexed, showing 2"));
    // Newest first
    let b = stdout.find("taskB").expect("taskB listed");
    let a = stdout.find("taskA").expect("taskA listed");
    assert!(b < a, "tasks should be sorted newest first:\n{stdout}");

    let output = run_bin(&env, &["report", "taskA", "--all"]);
    assert_success(&["report", "taskA", "--all"], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Issues:      2 (1 publishable)"));
    assert!(stdout.contains("modernize-use-nullptr"));
    assert!(stdout.contains("dom/a.cpp:10"));
    assert!(stdout.contains("mozlint.flake8"));

    let output = run_bin(&env, &["stats", "--json"]);
    assert_success(&["stats", "--json"], &output);
    let stats: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stats output should be JSON");
    // Only the finished task with issues is analyzed
    assert_eq!(stats["loaded"], 1);
    assert_eq!(stats["ids"], json!(["taskA"]));
    assert_eq!(stats["checks"]["clang-tidy.modernize-use-nullptr"]["publishable"], 1);
    assert_eq!(stats["checks"]["mozlint.flake8.E501"]["total"], 1);
    assert_eq!(stats["status"], "complete");
    assert!(stats.get("error").is_none());
}
