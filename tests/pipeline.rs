//! Offline integration tests for the full note run.
//!
//! The agent pipeline is replaced by a scripted [`TaskRuntime`] and the
//! image-search service by a tiny HTTP server on `127.0.0.1`, so every test
//! exercises the real resolver, normaliser and PDF writer without network
//! access or API keys.

use async_trait::async_trait;
use edgequake_notes::{
    generate_notes, Crew, CrewOutput, ImageIssue, ImageResolver, NotesConfig, NotesError,
    NotesProgressCallback, Preference, Stage, TaskOutput, TaskRuntime,
};
use image::{ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Scripted runtime ─────────────────────────────────────────────────────────

/// Returns canned text for every task, or fails like an exhausted provider.
struct ScriptedRuntime {
    final_text: String,
    fail: bool,
    kickoffs: AtomicUsize,
}

impl ScriptedRuntime {
    fn ok(text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            final_text: text.into(),
            fail: false,
            kickoffs: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            final_text: String::new(),
            fail: true,
            kickoffs: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TaskRuntime for ScriptedRuntime {
    async fn kickoff(&self, crew: &Crew) -> Result<CrewOutput, NotesError> {
        self.kickoffs.fetch_add(1, Ordering::SeqCst);
        crew.validate()?;
        if self.fail {
            return Err(NotesError::Orchestration {
                task: crew.tasks[0].kind.to_string(),
                attempts: 3,
                detail: "503 Service Unavailable".into(),
            });
        }
        let last = crew.tasks.len() - 1;
        let tasks = crew
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| TaskOutput {
                task: t.kind,
                text: if i == last {
                    self.final_text.clone()
                } else {
                    format!("draft from {}", t.kind)
                },
                input_tokens: 10,
                output_tokens: 20,
                duration_ms: 1,
                attempts: 1,
            })
            .collect();
        Ok(CrewOutput::from_tasks(tasks))
    }
}

// ── Minimal HTTP server ──────────────────────────────────────────────────────

#[derive(Clone)]
struct Response {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

/// Serves fixed responses by path (query string ignored) and counts hits.
struct FakeServer {
    addr: SocketAddr,
    routes: Arc<Mutex<HashMap<String, Response>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: Arc<Mutex<HashMap<String, Response>>> = Arc::default();
        let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::default();

        let (table, counter) = (Arc::clone(&routes), Arc::clone(&hits));
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let table = Arc::clone(&table);
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buf);
                    let target = head.split_whitespace().nth(1).unwrap_or("/");
                    let path = target.split('?').next().unwrap_or("/").to_string();
                    *counter.lock().unwrap().entry(path.clone()).or_default() += 1;

                    let resp = table.lock().unwrap().get(&path).cloned().unwrap_or(Response {
                        status: 404,
                        content_type: "text/plain",
                        body: b"not found".to_vec(),
                    });
                    let reason = if resp.status == 200 { "OK" } else { "Not Found" };
                    let header = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        resp.status,
                        reason,
                        resp.content_type,
                        resp.body.len()
                    );
                    let _ = socket.write_all(header.as_bytes()).await;
                    let _ = socket.write_all(&resp.body).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, routes, hits }
    }

    fn route(&self, path: &str, response: Response) {
        self.routes.lock().unwrap().insert(path.to_string(), response);
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

fn json(body: String) -> Response {
    Response {
        status: 200,
        content_type: "application/json",
        body: body.into_bytes(),
    }
}

fn search_hit(image_url: &str) -> Response {
    json(format!(
        r#"{{"search_metadata":{{"status":"Success"}},"images_results":[{{"position":1,"original":"{image_url}"}},{{"position":2,"original":"http://unused.invalid/2.jpg"}}]}}"#
    ))
}

fn png_with_alpha(w: u32, h: u32) -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(w, h, Rgba([20, 90, 200, 255]));
    for x in 0..w {
        img.put_pixel(x, 0, Rgba([0, 0, 0, 0]));
    }
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn config_for(
    root: &Path,
    server: &FakeServer,
    runtime: Arc<dyn TaskRuntime>,
) -> edgequake_notes::NotesConfigBuilder {
    NotesConfig::builder()
        .images_dir(root.join("images"))
        .pdf_dir(root.join("pdf"))
        .serpapi_api_key("test-key")
        .search_endpoint(server.url("/search.json"))
        .search_timeout_secs(5)
        .download_timeout_secs(5)
        .runtime(runtime)
}

fn long_notes(paragraphs: usize) -> String {
    (1..=paragraphs)
        .map(|i| format!("Paragraph {i}: containers package an application with its dependencies."))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn ok_response(content_type: &'static str, body: Vec<u8>) -> Response {
    Response {
        status: 200,
        content_type,
        body,
    }
}

#[derive(Default)]
struct StageRecorder {
    started: Mutex<Vec<Stage>>,
    completed: Mutex<Vec<Stage>>,
    tasks: AtomicUsize,
    issues: AtomicUsize,
}

impl NotesProgressCallback for StageRecorder {
    fn on_stage_start(&self, stage: Stage) {
        self.started.lock().unwrap().push(stage);
    }

    fn on_task_complete(&self, _task: &str, _index: usize, _total: usize, _len: usize) {
        self.tasks.fetch_add(1, Ordering::SeqCst);
    }

    fn on_image_issue(&self, _issue: &ImageIssue) {
        self.issues.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.completed.lock().unwrap().push(stage);
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn no_search_results_gives_text_only_multi_page_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::start().await;
    server.route("/search.json", json(r#"{"images_results":[]}"#.to_string()));
    let config = config_for(dir.path(), &server, ScriptedRuntime::ok(long_notes(60)))
        .build()
        .unwrap();

    let out = generate_notes("docker", &Preference::Short, &config)
        .await
        .expect("run succeeds without an image");

    assert_eq!(server.hits("/search.json"), 1);
    assert!(out.image.is_none());
    assert!(!out.image_placed);
    assert!(matches!(
        out.image_issues.as_slice(),
        [ImageIssue::SearchUnavailable { .. }]
    ));
    assert!(out.page_count > 1, "60 paragraphs should overflow one page");
    assert_eq!(out.pdf_path, dir.path().join("pdf").join("notes_docker.pdf"));

    let bytes = std::fs::read(&out.pdf_path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert!(!dir.path().join("images").exists());
}

#[tokio::test]
async fn search_service_error_is_carried_into_issue() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::start().await;
    server.route(
        "/search.json",
        json(r#"{"search_metadata":{"status":"Success"},"error":"Google hasn't returned any results for this query."}"#.to_string()),
    );
    let config = config_for(dir.path(), &server, ScriptedRuntime::ok("Notes."))
        .build()
        .unwrap();

    let out = generate_notes("docker", &Preference::Short, &config)
        .await
        .expect("run succeeds without an image");

    match out.image_issues.as_slice() {
        [ImageIssue::SearchUnavailable { query, detail }] => {
            assert_eq!(query, "docker");
            assert!(detail.contains("hasn't returned any results"), "{detail}");
        }
        other => panic!("unexpected issues: {other:?}"),
    }
    assert!(!out.image_placed);
    assert!(out.pdf_path.exists());
}

#[tokio::test]
async fn png_result_is_downloaded_converted_and_placed() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::start().await;
    server.route("/search.json", search_hit(&server.url("/img/k8s.png?w=800")));
    server.route("/img/k8s.png", ok_response("image/png", png_with_alpha(120, 60)));

    let runtime = ScriptedRuntime::ok("Pods group containers.\n\nServices expose pods.");
    let config = config_for(dir.path(), &server, runtime.clone())
        .build()
        .unwrap();

    let out = generate_notes("Docker & Kubernetes!", &Preference::Long, &config)
        .await
        .unwrap();

    let images = dir.path().join("images");
    assert!(images.join("docker_kubernetes.png").exists());
    assert_eq!(out.image, Some(images.join("docker_kubernetes_converted.jpg")));
    assert!(out.image_placed);
    assert!(out.image_issues.is_empty(), "issues: {:?}", out.image_issues);
    assert_eq!(out.page_count, 1);
    assert_eq!(
        out.pdf_path.file_name().unwrap().to_string_lossy(),
        "notes_Docker_&_Kubernetes!.pdf"
    );

    assert_eq!(runtime.kickoffs.load(Ordering::SeqCst), 1);
    assert_eq!(server.hits("/search.json"), 1);
    assert_eq!(server.hits("/img/k8s.png"), 1);
    assert_eq!(out.stats.total_input_tokens, 40);
    assert_eq!(out.stats.total_output_tokens, 80);
    assert_eq!(out.notes, "Pods group containers.\n\nServices expose pods.");
}

#[tokio::test]
async fn failed_download_still_writes_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::start().await;
    server.route("/search.json", search_hit(&server.url("/img/gone.jpg")));

    let config = config_for(dir.path(), &server, ScriptedRuntime::ok("Only text."))
        .build()
        .unwrap();
    let out = generate_notes("docker", &Preference::Short, &config)
        .await
        .unwrap();

    assert_eq!(server.hits("/img/gone.jpg"), 1);
    assert!(out.image.is_none());
    assert!(matches!(
        out.image_issues.as_slice(),
        [ImageIssue::DownloadFailed { reason, .. }] if reason.contains("404")
    ));
    assert!(!dir.path().join("images").join("docker.jpg").exists());
    assert!(out.pdf_path.exists());
}

#[tokio::test]
async fn undecodable_download_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::start().await;
    server.route("/search.json", search_hit(&server.url("/img/page.png")));
    server.route(
        "/img/page.png",
        ok_response("text/html", b"<html>captcha</html>".to_vec()),
    );

    let config = config_for(dir.path(), &server, ScriptedRuntime::ok("Text."))
        .build()
        .unwrap();
    let out = generate_notes("docker", &Preference::Short, &config)
        .await
        .unwrap();

    assert!(out.image.is_none());
    assert!(!out.image_placed);
    assert!(matches!(
        out.image_issues.as_slice(),
        [ImageIssue::DecodeFailed { .. }]
    ));
    assert!(out.pdf_path.exists());
}

#[tokio::test]
async fn orchestration_failure_is_fatal_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::start().await;
    server.route("/search.json", search_hit(&server.url("/img/a.jpg")));

    let config = config_for(dir.path(), &server, ScriptedRuntime::failing())
        .build()
        .unwrap();
    let err = generate_notes("docker", &Preference::Short, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, NotesError::Orchestration { .. }), "got {err}");
    assert_eq!(server.hits("/search.json"), 0, "no search after a failed pipeline");
    assert!(!dir.path().join("pdf").exists());
    assert!(!dir.path().join("images").exists());
}

#[tokio::test]
async fn resolving_twice_gives_identical_file() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::start().await;
    server.route("/search.json", search_hit(&server.url("/img/photo.jpg")));
    server.route("/img/photo.jpg", ok_response("image/jpeg", png_with_alpha(8, 8)));

    let config = config_for(dir.path(), &server, ScriptedRuntime::ok(""))
        .build()
        .unwrap();
    let resolver = ImageResolver::new(&config);

    let first = resolver.resolve("Docker & Kubernetes!").await.unwrap().unwrap();
    let first_bytes = std::fs::read(&first.path).unwrap();
    let second = resolver.resolve("Docker & Kubernetes!").await.unwrap().unwrap();
    let second_bytes = std::fs::read(&second.path).unwrap();

    assert_eq!(first.path, dir.path().join("images").join("docker_kubernetes.jpg"));
    assert_eq!(first.path, second.path);
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(first.bytes, first_bytes.len() as u64);
}

#[cfg(unix)]
#[tokio::test]
async fn image_permissions_follow_config() {
    use std::os::unix::fs::PermissionsExt;

    let server = FakeServer::start().await;
    server.route("/search.json", search_hit(&server.url("/img/p.gif")));
    server.route("/img/p.gif", ok_response("image/gif", b"GIF89a".to_vec()));

    for (shared, file_mode) in [(false, 0o644), (true, 0o666)] {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path(), &server, ScriptedRuntime::ok(""))
            .shared_permissions(shared)
            .build()
            .unwrap();
        let img = ImageResolver::new(&config)
            .resolve("rust")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(img.path.file_name().unwrap(), "rust.gif");
        let mode = std::fs::metadata(&img.path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, file_mode, "shared={shared}");
    }
}

#[tokio::test]
async fn progress_follows_stage_order() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::start().await;
    server.route("/search.json", json("{}".to_string()));

    let recorder = Arc::new(StageRecorder::default());
    let config = config_for(dir.path(), &server, ScriptedRuntime::ok("Text."))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    generate_notes("docker", &Preference::Short, &config)
        .await
        .unwrap();

    let expected = vec![Stage::Notes, Stage::Image, Stage::Normalize, Stage::Assemble];
    assert_eq!(*recorder.started.lock().unwrap(), expected);
    assert_eq!(*recorder.completed.lock().unwrap(), expected);
    assert_eq!(recorder.issues.load(Ordering::SeqCst), 1);
}
