#![cfg(all(unix, feature = "cli"))]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/edgeipc-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn edgeipc() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_edgeipc"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn spawn_listener(sock_path: &Path, extra: &[&str]) -> Child {
    let child = edgeipc()
        .arg("--format")
        .arg("json")
        .arg("listen")
        .arg(sock_path)
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("listen command should start");

    let start = Instant::now();
    while !sock_path.exists() {
        if start.elapsed() >= Duration::from_secs(3) {
            panic!("listener did not bind {}", sock_path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
    child
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout should be one JSON document")
}

#[test]
fn listen_prints_frame_from_send() {
    let dir = unique_temp_dir("send");
    let sock_path = dir.join("t.sock");
    let listener = spawn_listener(&sock_path, &["--count", "1"]);

    let sent = edgeipc()
        .arg("send")
        .arg(&sock_path)
        .arg("--data")
        .arg("hello")
        .output()
        .expect("send should run");
    assert!(sent.status.success());

    let output = listener.wait_with_output().expect("listener should exit");
    assert!(output.status.success());
    let frame = stdout_json(&output);
    assert_eq!(frame["payload"], "hello");
    assert_eq!(frame["payload_size"], 5);
    assert_eq!(frame["delivery"], "inline");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_reads_trailer() {
    let dir = unique_temp_dir("trailer");
    let sock_path = dir.join("t.sock");
    let trailer_path = dir.join("pixels.bin");
    std::fs::write(&trailer_path, [7u8; 12]).unwrap();
    let listener = spawn_listener(&sock_path, &["--count", "1", "--trailer-size", "12"]);

    let sent = edgeipc()
        .arg("send")
        .arg(&sock_path)
        .arg("--data")
        .arg("frame-header")
        .arg("--trailer-file")
        .arg(&trailer_path)
        .output()
        .expect("send should run");
    assert!(sent.status.success());

    let output = listener.wait_with_output().expect("listener should exit");
    let frame = stdout_json(&output);
    assert_eq!(frame["payload"], "frame-header");
    assert_eq!(frame["trailer_size"], 12);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn publish_through_shared_memory_is_decoded() {
    let dir = unique_temp_dir("publish");
    let sock_path = dir.join("consumer.sock");
    let listener = spawn_listener(&sock_path, &["--count", "1", "--decode"]);

    let published = edgeipc()
        .arg("--format")
        .arg("json")
        .arg("publish")
        .arg(&sock_path)
        .arg("--json")
        .arg(r#"{"BBoxes_xyxy":{"cat":[1,2,3,4]},"Identity":[0.5,0.25],"Frame":7}"#)
        .arg("--inline-threshold")
        .arg("0")
        .output()
        .expect("publish should run");
    assert!(published.status.success());
    let report = stdout_json(&published);
    assert_eq!(report["delivery"], "shared");

    let output = listener.wait_with_output().expect("listener should exit");
    let frame = stdout_json(&output);
    assert_eq!(frame["delivery"], "shared");
    assert_eq!(frame["key"], report["key"]);
    assert_eq!(
        frame["result"]["BBoxes_xyxy"]["cat"],
        serde_json::json!([1.0, 2.0, 3.0, 4.0])
    );
    assert_eq!(frame["result"]["Identity"], serde_json::json!([0.5, 0.25]));
    assert_eq!(frame["result"]["Frame"], 7);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn send_to_missing_socket_fails() {
    let dir = unique_temp_dir("missing");
    let output = edgeipc()
        .arg("send")
        .arg(dir.join("nobody.sock"))
        .arg("--data")
        .arg("x")
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("send failed"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn shm_write_read_remove() {
    let written = edgeipc()
        .arg("--format")
        .arg("json")
        .arg("shm")
        .arg("write")
        .arg("--data")
        .arg("0123456789")
        .output()
        .expect("shm write should run");
    assert!(written.status.success());
    let report = stdout_json(&written);
    assert_eq!(report["capacity"], 10);
    let key = report["key"].as_i64().expect("key should be a number").to_string();

    let read = edgeipc()
        .arg("--format")
        .arg("raw")
        .arg("shm")
        .arg("read")
        .arg(&key)
        .output()
        .expect("shm read should run");
    assert!(read.status.success());
    assert_eq!(read.stdout, b"0123456789");

    let described = edgeipc()
        .arg("--format")
        .arg("json")
        .arg("shm")
        .arg("read")
        .arg(&key)
        .output()
        .expect("shm read should run");
    let described = stdout_json(&described);
    assert_eq!(described["size"], 10);
    assert_eq!(described["capacity"], 10);
    assert_eq!(described["payload"], "0123456789");

    let removed = edgeipc()
        .arg("shm")
        .arg("remove")
        .arg(&key)
        .output()
        .expect("shm remove should run");
    assert!(removed.status.success());

    let missing = edgeipc()
        .arg("shm")
        .arg("read")
        .arg(&key)
        .output()
        .expect("shm read should run");
    assert_eq!(missing.status.code(), Some(3));
}

#[test]
fn shm_write_with_key_path() {
    let dir = unique_temp_dir("ftok");
    let key_path = dir.join("model.bin");
    std::fs::write(&key_path, b"weights").unwrap();

    let written = edgeipc()
        .arg("--format")
        .arg("json")
        .arg("shm")
        .arg("write")
        .arg("--data")
        .arg("by-path")
        .arg("--key-path")
        .arg(&key_path)
        .arg("--project-id")
        .arg("9")
        .output()
        .expect("shm write should run");
    assert!(written.status.success());
    let key = stdout_json(&written)["key"]
        .as_i64()
        .expect("key should be a number")
        .to_string();

    let read = edgeipc()
        .arg("--format")
        .arg("raw")
        .arg("shm")
        .arg("read")
        .arg(&key)
        .output()
        .expect("shm read should run");
    assert_eq!(read.stdout, b"by-path");

    let removed = edgeipc()
        .arg("shm")
        .arg("remove")
        .arg(&key)
        .output()
        .expect("shm remove should run");
    assert!(removed.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn shm_write_rejects_small_capacity() {
    let output = edgeipc()
        .arg("shm")
        .arg("write")
        .arg("--data")
        .arg("too long")
        .arg("--capacity")
        .arg("2")
        .output()
        .expect("shm write should run");
    assert_eq!(output.status.code(), Some(64));
}

/// Answer one HTTP request with `body` and return the request line.
fn respond_once(body: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("listener should accept");
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line.trim_end().is_empty() {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
        }
        let mut request_body = vec![0; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let mut stream = reader.into_inner();
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        request_line.trim_end().to_string()
    });

    (base_url, handle)
}

#[test]
fn control_status_uses_env_url() {
    let (base_url, server) = respond_once(r#"{"state":"running"}"#);

    let output = edgeipc()
        .env("EDGEIPC_CONTROL_URL", &base_url)
        .arg("--format")
        .arg("json")
        .arg("control")
        .arg("status")
        .output()
        .expect("control status should run");

    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["state"], "running");
    assert_eq!(server.join().unwrap(), "GET /status HTTP/1.1");
}

#[test]
fn control_patch_sends_form() {
    let (base_url, server) = respond_once("{}");

    let output = edgeipc()
        .arg("--format")
        .arg("json")
        .arg("control")
        .arg("--url")
        .arg(&base_url)
        .arg("patch")
        .arg("--json")
        .arg(r#"{"fps":10}"#)
        .output()
        .expect("control patch should run");

    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["patched"], 1);
    assert_eq!(server.join().unwrap(), "PATCH /settings HTTP/1.1");
}

#[test]
fn control_unreachable_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let output = edgeipc()
        .arg("control")
        .arg("--url")
        .arg(&base_url)
        .arg("--timeout")
        .arg("2s")
        .arg("start")
        .output()
        .expect("control start should run");

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn version_reports_package_version() {
    let output = edgeipc()
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("edgeipc {}", env!("CARGO_PKG_VERSION"))
    );
}
