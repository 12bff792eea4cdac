use assert_cmd::cargo::cargo_bin_cmd;
use highlight_server::{serve_listener, AppState, ServerConfig};
use highlight_storage::{DocumentLibrary, HighlightDb};
use predicates::prelude::*;
use serde_json::Value;
use std::sync::Arc;

struct LiveServer {
    base_url: String,
    _pdf_dir: tempfile::TempDir,
}

fn start_server() -> LiveServer {
    let pdf_dir = tempfile::tempdir().expect("temp dir should be created");
    std::fs::write(pdf_dir.path().join("doc1.pdf"), b"%PDF-1.4").expect("fixture pdf");
    std::fs::write(pdf_dir.path().join("doc2.pdf"), b"%PDF-1.4").expect("fixture pdf");

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    listener.set_nonblocking(true).expect("listener should be non-blocking");
    let addr = listener.local_addr().expect("listener address");

    let db = HighlightDb::open_in_memory().expect("in-memory db should open");
    let state = Arc::new(AppState::new(db, DocumentLibrary::with_root(pdf_dir.path())));
    let config = ServerConfig::default().with_bind(addr);

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("runtime should build");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("listener handoff");
            serve_listener(listener, state, &config).await.expect("server should run");
        });
    });

    LiveServer { base_url: format!("http://{addr}"), _pdf_dir: pdf_dir }
}

fn stdout_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).expect("stdout should be utf-8")
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("highlighter")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unreachable_server_fails_with_transport_error() {
    cargo_bin_cmd!("highlighter")
        .args(["documents", "--server", "http://127.0.0.1:9", "--timeout", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("transport error"));
}

#[test]
fn add_rejects_page_zero_before_contacting_server() {
    let server = start_server();

    cargo_bin_cmd!("highlighter")
        .args(["add", "doc1.pdf", "--text", "abc", "--rect", "1,2,3,4", "--page", "0"])
        .args(["--server", &server.base_url])
        .assert()
        .failure()
        .stderr(predicate::str::contains("page numbers start at 1"));
}

#[test]
fn highlight_lifecycle_against_live_server() {
    let server = start_server();

    cargo_bin_cmd!("highlighter")
        .args(["documents", "--server", &server.base_url])
        .assert()
        .success()
        .stdout("doc1.pdf\ndoc2.pdf\n");

    let added = cargo_bin_cmd!("highlighter")
        .args(["add", "doc1.pdf", "--text", "the quoted passage", "--rect", "10,20,200,40"])
        .args(["--page", "2", "--comment", "important", "--emoji", "🔥"])
        .args(["--server", &server.base_url])
        .assert()
        .success();
    let id = stdout_of(added).trim().to_owned();
    assert!(!id.is_empty());

    let listed = cargo_bin_cmd!("highlighter")
        .args(["list", "doc1.pdf", "--json", "--server", &server.base_url])
        .assert()
        .success();
    let records: Value = serde_json::from_str(&stdout_of(listed)).expect("list --json should be json");
    let records = records.as_array().expect("array of highlights");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], id.as_str());
    assert_eq!(records[0]["pdfUrl"], format!("{}/pdf/doc1.pdf", server.base_url));
    assert_eq!(records[0]["position"]["pageNumber"], 2);

    cargo_bin_cmd!("highlighter")
        .args(["list", "doc2.pdf", "--server", &server.base_url])
        .assert()
        .success()
        .stdout("");

    cargo_bin_cmd!("highlighter")
        .args(["open", "doc1.pdf", "--fragment", &format!("#highlight-{id}")])
        .args(["--server", &server.base_url])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("#highlight-{id}")))
        .stdout(predicate::str::contains("the quoted passage"))
        .stdout(predicate::str::contains("🔥 important"));

    cargo_bin_cmd!("highlighter")
        .args(["open", "doc1.pdf", "--fragment", "#highlight-unknown"])
        .args(["--server", &server.base_url])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no highlight matches"));

    cargo_bin_cmd!("highlighter")
        .args(["delete", &id, "--server", &server.base_url])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("deleted {id}")));

    cargo_bin_cmd!("highlighter")
        .args(["list", "doc1.pdf", "--server", &server.base_url])
        .assert()
        .success()
        .stdout("");
}
