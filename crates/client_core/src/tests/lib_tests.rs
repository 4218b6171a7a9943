use super::*;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Multipart, Path, RawQuery, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, Default)]
struct RecordedUpload {
    text_fields: Vec<(String, String)>,
    image_file_name: Option<String>,
    image_content_type: Option<String>,
    image_len: usize,
}

#[derive(Clone, Default)]
struct ServerState {
    uploads: Arc<Mutex<Vec<RecordedUpload>>>,
    retrievals: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

async fn record_upload(State(state): State<ServerState>, mut multipart: Multipart) -> impl IntoResponse {
    let mut upload = RecordedUpload::default();
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            upload.image_file_name = field.file_name().map(str::to_string);
            upload.image_content_type = field.content_type().map(str::to_string);
            upload.image_len = field.bytes().await.expect("image bytes").len();
        } else {
            upload
                .text_fields
                .push((name, field.text().await.expect("text field")));
        }
    }
    let filter = upload
        .text_fields
        .iter()
        .find(|(name, _)| name == "filter")
        .map(|(_, value)| value.clone())
        .unwrap_or_default();
    state.uploads.lock().await.push(upload);

    if filter == "emboss" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid filter. Available filters: invert, grayscale, contrast, blur, sharpen"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "message": "Image processed successfully",
            "filename": "processed_abc123.png",
            "filter": filter,
            "processing_time": 42.5,
            "original_size": "4x3",
            "output_format": "PNG",
            "file_size": 2048
        })),
    )
}

async fn serve_processed(
    State(state): State<ServerState>,
    Path(filename): Path<String>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    state.retrievals.lock().await.push((filename.clone(), query));
    if filename == "missing.png" {
        return (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json")],
            br#"{"error":"File not found"}"#.to_vec(),
        );
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/png")],
        b"\x89PNG-bytes".to_vec(),
    )
}

async fn spawn_vision_server() -> Result<(Url, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route(
            "/health",
            get(|| async {
                Json(json!({
                    "message": "Vision API is running perfectly!",
                    "status": "healthy",
                    "timestamp": "2026-10-16T09:30:00",
                    "available_filters": 5
                }))
            }),
        )
        .route(
            "/filters",
            get(|| async {
                Json(json!({
                    "filters": {
                        "invert": {"description": "Invert image colors", "parameters": null},
                        "contrast": {
                            "description": "Adjust image contrast",
                            "parameters": {"factor": {"type": "float", "default": 1.5, "range": "0.0 - 3.0", "description": "Contrast multiplier"}}
                        }
                    },
                    "count": 2,
                    "categories": {"color": ["invert"], "enhancement": ["contrast"]}
                }))
            }),
        )
        .route(
            "/stats",
            get(|| async {
                Json(json!({
                    "timestamp": "2026-10-16T09:30:00",
                    "files": {"uploaded": 3, "processed": 7, "total": 10},
                    "storage": {"uploads_size_mb": 1.5, "processed_size_mb": 4.25, "total_size_mb": 5.75}
                }))
            }),
        )
        .route("/process", post(record_upload))
        .route("/processed/:filename", get(serve_processed))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((Url::parse(&format!("http://{addr}/"))?, state))
}

async fn spawn_failing_server(status: StatusCode, body: &'static str) -> Result<Url> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/health", get(move || async move { (status, body) }))
        .route("/process", post(move || async move { (status, body) }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(Url::parse(&format!("http://{addr}"))?)
}

fn png_candidate() -> CandidateFile {
    CandidateFile::new("holiday photo.png", "image/png", vec![7u8; 64])
}

#[tokio::test]
async fn process_sends_named_multipart_fields() -> Result<()> {
    let (base, state) = spawn_vision_server().await?;
    let client = VisionClient::new(base);

    let response = client
        .process(ProcessRequest {
            file: png_candidate(),
            filter: FilterId::Contrast,
            parameter: Some((FilterParameter::ContrastFactor, 1.5)),
        })
        .await?;

    assert_eq!(response.filename, "processed_abc123.png");
    assert_eq!(response.filter, "contrast");
    assert_eq!(response.processing_time, Some(42.5));
    assert_eq!(response.file_size, Some(2048));

    let uploads = state.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert_eq!(upload.image_file_name.as_deref(), Some("holiday photo.png"));
    assert_eq!(upload.image_content_type.as_deref(), Some("image/png"));
    assert_eq!(upload.image_len, 64);
    assert_eq!(
        upload.text_fields,
        vec![
            ("filter".to_string(), "contrast".to_string()),
            ("factor".to_string(), "1.5".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn parameterless_filter_sends_only_filter_field() -> Result<()> {
    let (base, state) = spawn_vision_server().await?;
    let client = VisionClient::new(base);

    client
        .process(ProcessRequest {
            file: png_candidate(),
            filter: FilterId::Grayscale,
            parameter: None,
        })
        .await?;

    let uploads = state.uploads.lock().await;
    assert_eq!(
        uploads[0].text_fields,
        vec![("filter".to_string(), "grayscale".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn unparsable_media_type_still_uploads() -> Result<()> {
    let (base, state) = spawn_vision_server().await?;
    let client = VisionClient::new(base);

    client
        .process(ProcessRequest {
            file: CandidateFile::new("scan.bmp", "not a mime", vec![1u8; 8]),
            filter: FilterId::Invert,
            parameter: None,
        })
        .await?;

    let uploads = state.uploads.lock().await;
    assert_eq!(uploads[0].image_file_name.as_deref(), Some("scan.bmp"));
    assert_eq!(uploads[0].image_len, 8);
    Ok(())
}

#[tokio::test]
async fn error_body_becomes_status_failure() -> Result<()> {
    let (base, _) = spawn_vision_server().await?;
    let client = VisionClient::new(base);

    // `emboss` has no FilterId, so the form is built by hand.
    let response = client
        .http
        .post(client.endpoint("process")?)
        .multipart(
            Form::new()
                .part("image", Part::bytes(vec![1u8]).file_name("a.png"))
                .text("filter", "emboss"),
        )
        .send()
        .await?;
    let failure = status_failure(response, PROCESS_FALLBACK_MESSAGE).await;

    assert_eq!(
        failure,
        ServiceFailure::Status {
            status: 400,
            message: "Invalid filter. Available filters: invert, grayscale, contrast, blur, sharpen"
                .into(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn missing_error_body_falls_back_to_endpoint_message() -> Result<()> {
    let base = spawn_failing_server(StatusCode::INTERNAL_SERVER_ERROR, "<html>boom</html>").await?;
    let client = VisionClient::new(base);

    let err = client
        .process(ProcessRequest {
            file: png_candidate(),
            filter: FilterId::Sharpen,
            parameter: Some((FilterParameter::SharpenFactor, 2.0)),
        })
        .await
        .expect_err("must fail");
    assert_eq!(
        err,
        ServiceFailure::Status {
            status: 500,
            message: "Processing failed".into(),
        }
    );

    let err = client.health().await.expect_err("must fail");
    assert_eq!(err.message(), "Server health check failed");
    Ok(())
}

#[tokio::test]
async fn blank_error_field_uses_fallback() -> Result<()> {
    let base = spawn_failing_server(StatusCode::SERVICE_UNAVAILABLE, r#"{"error":"   "}"#).await?;
    let client = VisionClient::new(base);

    let err = client.health().await.expect_err("must fail");

    assert_eq!(
        err,
        ServiceFailure::Status {
            status: 503,
            message: "Server health check failed".into(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn health_filters_and_stats_decode() -> Result<()> {
    let (base, _) = spawn_vision_server().await?;
    let client = VisionClient::new(base);

    let health = client.health().await?;
    assert_eq!(health.message, "Vision API is running perfectly!");
    assert_eq!(health.available_filters, Some(5));

    let filters = client.filters().await?;
    assert_eq!(filters.count, 2);
    assert!(filters.filters["invert"].parameters.is_none());
    assert_eq!(filters.categories["enhancement"], vec!["contrast".to_string()]);

    let stats = client.stats().await?;
    assert_eq!(stats.files.total, 10);
    assert_eq!(stats.storage.total_size_mb, 5.75);
    Ok(())
}

#[tokio::test]
async fn fetch_follows_retrieval_url() -> Result<()> {
    let (base, state) = spawn_vision_server().await?;
    let client = VisionClient::new(base.clone());
    let reference = processed_url(&base, "processed_abc123.png")?;

    let bytes = client
        .fetch(&retrieval_url(&reference, OutputFormat::Png, true))
        .await?;

    assert_eq!(bytes, b"\x89PNG-bytes".to_vec());
    let retrievals = state.retrievals.lock().await;
    assert_eq!(
        retrievals.as_slice(),
        &[(
            "processed_abc123.png".to_string(),
            Some("format=PNG&download=true".to_string())
        )]
    );
    Ok(())
}

#[tokio::test]
async fn fetch_reports_missing_file() -> Result<()> {
    let (base, _) = spawn_vision_server().await?;
    let client = VisionClient::new(base.clone());

    let err = client
        .fetch(&processed_url(&base, "missing.png")?)
        .await
        .expect_err("must fail");

    assert_eq!(
        err,
        ServiceFailure::Status {
            status: 404,
            message: "File not found".into(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn unreachable_service_is_a_transport_failure() -> Result<()> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    let client = VisionClient::new(Url::parse(&format!("http://{addr}"))?);

    let err = client.health().await.expect_err("must fail");

    assert!(matches!(err, ServiceFailure::Transport(_)));
    Ok(())
}

#[test]
fn processed_url_escapes_filename_as_one_segment() {
    let base = Url::parse("http://127.0.0.1:5000").expect("base");
    assert_eq!(
        processed_url(&base, "out1.png").expect("url").as_str(),
        "http://127.0.0.1:5000/processed/out1.png"
    );
    assert_eq!(
        processed_url(&base, "a b/../c?.png").expect("url").as_str(),
        "http://127.0.0.1:5000/processed/a%20b%2F..%2Fc%3F.png"
    );
}

#[test]
fn processed_url_keeps_base_path_prefix() {
    let with_slash = Url::parse("http://vision.local/api/?token=x").expect("base");
    let without_slash = Url::parse("http://vision.local/api").expect("base");
    for base in [with_slash, without_slash] {
        assert_eq!(
            processed_url(&base, "out.jpeg").expect("url").as_str(),
            "http://vision.local/api/processed/out.jpeg"
        );
    }
}

#[test]
fn processed_url_rejects_cannot_be_a_base() {
    let base = Url::parse("mailto:vision@example.com").expect("base");
    assert!(matches!(
        processed_url(&base, "out.png"),
        Err(ServiceFailure::Transport(_))
    ));
}

#[test]
fn retrieval_url_replaces_existing_query() {
    let reference =
        Url::parse("http://127.0.0.1:5000/processed/out1.png?format=PNG&download=true").expect("url");
    assert_eq!(
        retrieval_url(&reference, OutputFormat::Jpeg, false).as_str(),
        "http://127.0.0.1:5000/processed/out1.png?format=JPEG&download=false"
    );
}
