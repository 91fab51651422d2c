use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::{header, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::{Html, IntoResponse},
    routing::{get, post},
    BoxError, Json, Router,
};
use futures::{stream, Stream, TryStreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::{fs::File, io::BufWriter};
use tokio_util::io::StreamReader;

use verdi::adapters::ffmpeg::{CliFfmpegRunner, FfmpegEncoder};
use verdi::adapters::fs_store::FsStore;
use verdi::adapters::sysinfo_probe::SysinfoProbe;
use verdi::application::pipeline::PipelineService;
use verdi::application::runner::{JobRunner, ResultLookup};
use verdi::config::Config;
use verdi::domain::asset::ContentKind;
use verdi::domain::job::Job;
use verdi::ports::store::AssetStore;

struct AppState {
    runner: JobRunner,
    store: FsStore,
    config: Config,
}

type SharedState = Arc<AppState>;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt::init();

    let store = FsStore::new(config.store_root.clone());
    let pipeline = PipelineService::new(
        store.clone(),
        FfmpegEncoder::new(CliFfmpegRunner),
        SysinfoProbe::new(),
        config.pipeline.clone(),
    );
    let runner = JobRunner::start(pipeline, config.worker_count);

    let state = Arc::new(AppState {
        runner,
        store,
        config: config.clone(),
    });

    let mut router = Router::new()
        .route("/upload", post(upload_images))
        .route("/process_video", post(process_video))
        .route("/jobs/:id", get(job_status))
        .route("/jobs/:id/result", get(job_result))
        .route("/jobs/:id/events", get(job_events))
        .route("/videos/:filename", get(get_video))
        .layer(DefaultBodyLimit::disable())
        .with_state(state);

    if config.is_test {
        router = router.route("/", get(index));
    }

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.addr, config.port))
        .await
        .expect("Failed to bind TCP listener");
    println!("Listening at {}:{}", config.addr, config.port);
    axum::serve(listener, router)
        .await
        .expect("Server failed to start");
}

// Handler that accepts a multipart image upload, stores each file, then
// submits a slideshow job over the image folder.
async fn upload_images(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let staging = tempfile::tempdir().map_err(internal_error)?;
    let mut uploaded = 0usize;

    while let Ok(Some(field)) = multipart.next_field().await {
        let file_name = match field.file_name() {
            Some(name) => sanitize_file_name(name),
            None => continue,
        };
        if !ContentKind::Image.matches_extension(&file_name) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("unsupported file type: {file_name}"),
            ));
        }

        let path = staging.path().join(&file_name);
        stream_to_file(&path, field).await?;
        state
            .store
            .upload(&path, &state.config.image_folder, ContentKind::Image)
            .await
            .map_err(internal_error)?;
        uploaded += 1;
    }

    if uploaded == 0 {
        return Err((StatusCode::BAD_REQUEST, String::from("no images in upload")));
    }

    submit_image_folder(&state).await
}

// Submit a job over whatever the image folder currently holds.
async fn process_video(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    submit_image_folder(&state).await
}

async fn submit_image_folder(
    state: &AppState,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let images = state
        .store
        .list_by_folder(&state.config.image_folder, ContentKind::Image)
        .await
        .map_err(internal_error)?;

    let job_id = state.runner.submit(images).await.map_err(internal_error)?;
    Ok(Json(json!({ "job_id": job_id })))
}

async fn job_status(
    State(state): State<SharedState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<Job>, StatusCode> {
    state.runner.status(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn job_result(
    State(state): State<SharedState>,
    UrlPath(id): UrlPath<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.runner.result(&id) {
        ResultLookup::Ready(locator) => {
            let file_name = locator.rsplit('/').next().unwrap_or(&locator).to_string();
            (
                StatusCode::OK,
                Json(json!({
                    "locator": locator,
                    "video_url": format!("/videos/{file_name}"),
                })),
            )
        }
        ResultLookup::NotReady => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "job is still running" })),
        ),
        ResultLookup::Failed(error) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": error })))
        }
        ResultLookup::NotFound => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown job" })))
        }
    }
}

// Server-push progress stream for one job. Ends after the terminal event.
async fn job_events(
    State(state): State<SharedState>,
    UrlPath(id): UrlPath<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.runner.subscribe();

    let stream = stream::unfold((rx, id, false), |(mut rx, id, done)| async move {
        if done {
            return None;
        }
        loop {
            match rx.recv().await {
                Ok(event) if event.job_id() == id => {
                    let done = event.is_terminal();
                    match Event::default().json_data(&event) {
                        Ok(sse_event) => return Some((Ok::<_, Infallible>(sse_event), (rx, id, done))),
                        Err(_) => continue,
                    }
                }
                Ok(_) => continue,
                // Lagging costs missed updates, never correctness.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new())
}

async fn get_video(
    State(state): State<SharedState>,
    UrlPath(filename): UrlPath<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !file_name_is_safe(&filename) {
        return Err((StatusCode::BAD_REQUEST, String::from("Invalid file name")));
    }

    let path = PathBuf::from(&state.config.store_root)
        .join(&state.config.video_folder)
        .join(&filename);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| (StatusCode::NOT_FOUND, String::from("No such video")))?;

    Ok(([(header::CONTENT_TYPE, "video/mp4")], bytes))
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(path: &std::path::Path, stream: S) -> Result<(), (StatusCode, String)>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    async {
        let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;

        Ok::<_, io::Error>(())
    }
    .await
    .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

/// Strip any path components and unusual characters from a client-supplied
/// file name.
fn sanitize_file_name(name: &str) -> String {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn file_name_is_safe(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.starts_with('.')
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
        <!doctype html>
        <html>
            <head>
                <title>Make a slideshow!</title>
            </head>
            <body>
                <h1>Slideshow builder</h1>
                <form action="/upload" method="post" enctype="multipart/form-data">
                    <div>
                        <label>
                            Upload images:
                            <input type="file" name="files[]" multiple>
                        </label>
                    </div>
                    <div>
                        <input type="submit" value="Build video">
                    </div>
                </form>
            </body>
        </html>
        "#,
    )
}
