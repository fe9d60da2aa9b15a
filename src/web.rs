//! Browser front end.
//!
//! A small axum application: a form to upload videos and pick the options,
//! a handler that streams the uploads to disk, runs the batch on a blocking
//! thread and renders the results, and static routes for the produced files.
//!
//! | Route            | Purpose                                 |
//! |------------------|-----------------------------------------|
//! | `GET /`          | Upload form                             |
//! | `POST /process`  | Multipart submission, renders results   |
//! | `GET /health`    | JSON liveness check                     |
//! | `/videos/*`      | Reversed and combined videos            |
//! | `/frames/*`      | Extracted frames                        |
//! | `/uploads/*`     | Uploaded originals                      |

use std::{
    fmt::Write as _,
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::Field},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tower_http::services::ServeDir;

use crate::{
    config::{CombineMode, PipelineOptions, ReversalSpec},
    error::RewindError,
    layout::OutputLayout,
    pipeline::{BatchReport, InputReport, InputStatus, process_batch},
};

/// Default directory for uploaded originals.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Upload extensions offered by the form and accepted by the server.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

/// Settings for the web front end.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Output directories and extensions.
    pub layout: OutputLayout,
    /// Where uploads are stored before processing.
    pub upload_dir: PathBuf,
    /// Pipeline options shared by every submission.
    pub options: PipelineOptions,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            layout: OutputLayout::default(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            options: PipelineOptions::default(),
            max_upload_bytes: 1 << 30,
        }
    }
}

impl WebConfig {
    /// Defaults with the given output layout.
    pub fn new(layout: OutputLayout) -> Self {
        Self {
            layout,
            ..Self::default()
        }
    }

    /// Set the upload directory.
    pub fn with_upload_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Set the pipeline options.
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the request body limit.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

/// Build the application.
pub fn router(config: WebConfig) -> Router {
    let videos = ServeDir::new(&config.layout.videos_dir);
    let frames = ServeDir::new(&config.layout.frames_dir);
    let uploads = ServeDir::new(&config.upload_dir);
    let limit = config.max_upload_bytes;

    Router::new()
        .route("/", get(index_handler))
        .route("/process", post(process_handler))
        .route("/health", get(health_handler))
        .nest_service("/videos", videos)
        .nest_service("/frames", frames)
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(limit))
        .with_state(Arc::new(config))
}

/// Create the directories and serve until the process is stopped.
///
/// # Errors
///
/// [`RewindError::Io`] if a directory cannot be created or `addr` cannot be
/// bound.
pub async fn serve(addr: SocketAddr, config: WebConfig) -> Result<(), RewindError> {
    config.layout.ensure_dirs(true)?;
    fs::create_dir_all(&config.upload_dir)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{addr}");
    axum::serve(listener, router(config)).await?;
    Ok(())
}

async fn index_handler() -> Html<String> {
    Html(render_form(None))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// A validated form submission.
#[derive(Debug)]
struct Submission {
    uploads: StagedUploads,
    keep_frames: bool,
    mode: CombineMode,
}

/// Uploads streamed to hidden files in the upload directory.
///
/// [`commit`](Self::commit) renames them to their client names; dropping the
/// set first deletes them, so a rejected submission leaves nothing behind.
#[derive(Debug, Default)]
struct StagedUploads {
    /// `(staging path, client file name)` in upload order.
    files: Vec<(PathBuf, String)>,
}

impl StagedUploads {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Reserve a staging path for the next upload.
    fn stage(&mut self, upload_dir: &Path, file_name: &str) -> PathBuf {
        let staging = upload_dir.join(format!(".{}-{file_name}.part", self.files.len()));
        self.files.push((staging.clone(), file_name.to_string()));
        staging
    }

    /// Move every upload to `upload_dir/<client name>`, replacing earlier
    /// uploads of the same name.
    fn commit(mut self, upload_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut stored = Vec::with_capacity(self.files.len());
        for (staging, file_name) in &self.files {
            let path = upload_dir.join(file_name);
            fs::rename(staging, &path)?;
            stored.push(path);
        }
        self.files.clear();
        Ok(stored)
    }
}

impl Drop for StagedUploads {
    fn drop(&mut self) {
        for (staging, _) in &self.files {
            match fs::remove_file(staging) {
                Ok(()) => log::debug!("Discarded upload {}", staging.display()),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => log::warn!("Cannot remove {}: {error}", staging.display()),
            }
        }
    }
}

fn bad_request(error: impl std::fmt::Display) -> Response {
    (StatusCode::BAD_REQUEST, error.to_string()).into_response()
}

fn storage_error(error: std::io::Error) -> Response {
    log::error!("Cannot store upload: {error}");
    (StatusCode::INTERNAL_SERVER_ERROR, "cannot store upload").into_response()
}

/// Copy one multipart field to `path` chunk by chunk.
async fn stream_to_file(field: &mut Field<'_>, path: &Path) -> Result<u64, Response> {
    let mut file = tokio::fs::File::create(path).await.map_err(storage_error)?;
    let mut written = 0_u64;
    while let Some(chunk) = field.chunk().await.map_err(bad_request)? {
        file.write_all(&chunk).await.map_err(storage_error)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(storage_error)?;
    Ok(written)
}

async fn read_submission(
    mut multipart: Multipart,
    upload_dir: &Path,
) -> Result<Submission, Response> {
    let invalid = |message: String| {
        (StatusCode::UNPROCESSABLE_ENTITY, Html(render_form(Some(message.as_str())))).into_response()
    };

    let mut uploads = StagedUploads::default();
    let mut keep_frames = false;
    let mut mode_field = String::new();

    while let Some(mut field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "videos" => {
                // Browsers send an empty part when no file is chosen.
                let Some(file_name) = field.file_name().and_then(upload_name) else {
                    continue;
                };
                if !has_accepted_extension(&file_name) {
                    return Err(invalid(format!(
                        "{file_name} is not a supported video (use {})",
                        ACCEPTED_EXTENSIONS.join(", ")
                    )));
                }
                if uploads.is_empty() {
                    tokio::fs::create_dir_all(upload_dir)
                        .await
                        .map_err(storage_error)?;
                }
                let staging = uploads.stage(upload_dir, &file_name);
                let bytes = stream_to_file(&mut field, &staging).await?;
                log::debug!("Received {file_name} ({bytes} bytes)");
            }
            "keep_frames" => keep_frames = true,
            "video_loop" => mode_field = field.text().await.map_err(bad_request)?,
            other => log::debug!("Ignoring form field {other:?}"),
        }
    }

    if uploads.is_empty() {
        return Err(invalid("Choose at least one video to upload.".to_string()));
    }
    let mode = mode_field
        .parse::<CombineMode>()
        .map_err(|error| invalid(error.to_string()))?;

    Ok(Submission {
        uploads,
        keep_frames,
        mode,
    })
}

async fn process_handler(
    State(config): State<Arc<WebConfig>>,
    multipart: Multipart,
) -> Response {
    let submission = match read_submission(multipart, &config.upload_dir).await {
        Ok(submission) => submission,
        Err(response) => return response,
    };
    log::info!(
        "Received {} upload(s), keep_frames={}, mode={}",
        submission.uploads.len(),
        submission.keep_frames,
        submission.mode
    );

    let job_config = config.clone();
    let result = tokio::task::spawn_blocking(move || run_submission(&job_config, submission)).await;

    match result {
        Ok(Ok(report)) => Html(render_results(&config, &report)).into_response(),
        Ok(Err(RewindError::Config(message))) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(render_form(Some(message.as_str()))),
        )
            .into_response(),
        Ok(Err(error)) => {
            log::error!("Batch failed: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
        Err(error) => {
            log::error!("Processing task panicked: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, "processing failed").into_response()
        }
    }
}

/// Store the uploads and run the batch. Runs on a blocking thread.
fn run_submission(config: &WebConfig, submission: Submission) -> Result<BatchReport, RewindError> {
    let inputs = submission.uploads.commit(&config.upload_dir)?;
    log::debug!("Stored {} upload(s) in {}", inputs.len(), config.upload_dir.display());

    let spec = ReversalSpec::new(inputs)
        .keep_frames(submission.keep_frames)
        .combine(submission.mode);
    process_batch(&spec, &config.layout, &config.options)
}

/// Reduce a client-supplied file name to its last component.
fn upload_name(raw: &str) -> Option<String> {
    // Some browsers send the full client path, with either separator.
    let last = raw.rsplit(['/', '\\']).next()?.trim();
    (!last.is_empty() && last != "." && last != "..").then(|| last.to_string())
}

fn has_accepted_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|extension| ACCEPTED_EXTENSIONS.contains(&extension.as_str()))
}

/// Escape text for HTML element content and attribute values.
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// URL under `prefix` for a file inside `root`, or `None` if it lies elsewhere.
fn file_url(prefix: &str, root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut url = prefix.to_string();
    for component in relative.components() {
        url.push('/');
        url.push_str(&urlencoding::encode(&component.as_os_str().to_string_lossy()));
    }
    Some(url)
}

const PAGE_HEAD: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>rewind</title>
<style>
body { font-family: sans-serif; max-width: 960px; margin: 2em auto; }
.error { color: #b00020; }
.ok { color: #1b5e20; }
.partial { color: #e65100; }
video { max-width: 300px; margin-right: 1em; }
.gallery img { width: 96px; margin: 2px; }
</style>
</head>
<body>
<h1>rewind</h1>
"#;

const PAGE_TAIL: &str = "</body>\n</html>\n";

/// The upload form, with an optional validation message above it.
pub(crate) fn render_form(message: Option<&str>) -> String {
    let mut page = String::from(PAGE_HEAD);
    if let Some(message) = message {
        let _ = writeln!(page, r#"<p class="error">{}</p>"#, escape_html(message));
    }
    let accept = ACCEPTED_EXTENSIONS
        .iter()
        .map(|extension| format!(".{extension}"))
        .collect::<Vec<_>>()
        .join(",");
    let _ = write!(
        page,
        r#"<form action="/process" method="post" enctype="multipart/form-data">
<p><input type="file" name="videos" accept="{accept}" multiple></p>
<p><label><input type="checkbox" name="keep_frames"> Keep reversed frames</label></p>
<fieldset>
<legend>Loop</legend>
<label><input type="radio" name="video_loop" value="none" checked> None</label>
<label><input type="radio" name="video_loop" value="ab"> Original then reversed</label>
<label><input type="radio" name="video_loop" value="ba"> Reversed then original</label>
</fieldset>
<p><button type="submit">Reverse</button></p>
</form>
"#
    );
    page.push_str(PAGE_TAIL);
    page
}

fn render_input(page: &mut String, config: &WebConfig, report: &InputReport) {
    let layout = &config.layout;
    let (class, label) = match report.status() {
        InputStatus::Succeeded => ("ok", "success"),
        InputStatus::Partial => ("partial", "partial"),
        InputStatus::Failed => ("error", "error"),
    };
    let name = report
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.base_name.clone());

    let _ = writeln!(page, "<section>");
    let _ = writeln!(
        page,
        r#"<h2>{}</h2><p class="{class}">{label}</p>"#,
        escape_html(&name)
    );
    for failure in &report.failures {
        let _ = writeln!(
            page,
            r#"<p class="error">{}: {}</p>"#,
            failure.step.as_str(),
            escape_html(&failure.message)
        );
    }

    let videos = [
        ("Original", file_url("/uploads", &config.upload_dir, &report.input)),
        (
            "Reversed",
            report
                .reversed
                .as_ref()
                .and_then(|video| file_url("/videos", &layout.videos_dir, &video.path)),
        ),
        (
            "Combined",
            report
                .combined
                .as_ref()
                .and_then(|video| file_url("/videos", &layout.videos_dir, &video.path)),
        ),
    ];
    for (title, url) in videos {
        if let Some(url) = url {
            let _ = writeln!(
                page,
                r#"<figure><figcaption>{title}</figcaption><video src="{}" controls></video></figure>"#,
                escape_html(&url)
            );
        }
    }

    if !report.frames.is_empty() {
        let _ = writeln!(page, r#"<div class="gallery">"#);
        for frame in &report.frames {
            if let Some(url) = file_url("/frames", &layout.frames_dir, frame) {
                let _ = writeln!(page, r#"<img src="{}" alt="" loading="lazy">"#, escape_html(&url));
            }
        }
        let _ = writeln!(page, "</div>");
    }
    let _ = writeln!(page, "</section>");
}

/// Results page for a finished batch.
pub(crate) fn render_results(config: &WebConfig, report: &BatchReport) -> String {
    let mut page = String::from(PAGE_HEAD);
    let _ = writeln!(
        page,
        "<p>{} succeeded, {} partial, {} failed.</p>",
        report.succeeded(),
        report.partial(),
        report.failed()
    );
    for input in report.inputs() {
        render_input(&mut page, config, input);
    }
    page.push_str(r#"<p><a href="/">Process more videos</a></p>"#);
    page.push('\n');
    page.push_str(PAGE_TAIL);
    page
}
