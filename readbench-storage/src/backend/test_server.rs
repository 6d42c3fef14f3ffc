//! A minimal HTTP server mimicking the GCS XML and JSON APIs, for testing the HTTP backends.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_LENGTH, RANGE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;

type Objects = Arc<HashMap<(String, String), Bytes>>;

/// Serves `objects` on a random local port and returns the endpoint URL.
pub async fn serve(objects: &[(&str, &str, &'static [u8])]) -> String {
    let objects: Objects = Arc::new(
        objects
            .iter()
            .map(|(bucket, key, contents)| {
                ((bucket.to_string(), key.to_string()), Bytes::from_static(contents))
            })
            .collect(),
    );

    let app = Router::new()
        .route("/storage/v1/b/{bucket}/o/{key}", get(json_object))
        .route("/ignores-ranges/{bucket}/{*key}", get(ignore_ranges))
        .route("/{bucket}/{*key}", get(xml_object))
        .with_state(objects);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    format!("http://{addr}")
}

async fn xml_object(
    State(objects): State<Objects>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    match objects.get(&(bucket, key)) {
        Some(contents) => respond(contents.clone(), &headers),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn ignore_ranges(
    State(objects): State<Objects>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    match objects.get(&(bucket, key)) {
        Some(contents) => respond(contents.clone(), &HeaderMap::new()),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn json_object(
    State(objects): State<Objects>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let Some(contents) = objects.get(&(bucket, key)) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if query.get("alt").map(String::as_str) == Some("media") {
        respond(contents.clone(), &headers)
    } else {
        let resource = format!(r#"{{"kind":"storage#object","size":"{}"}}"#, contents.len());
        resource.into_response()
    }
}

fn respond(contents: Bytes, headers: &HeaderMap) -> Response {
    let Some(range) = headers.get(RANGE) else {
        let length = contents.len().to_string();
        return ([(CONTENT_LENGTH, length)], contents).into_response();
    };

    let range = range.to_str().unwrap().strip_prefix("bytes=").unwrap();
    let (start, end) = range.split_once('-').unwrap();
    let start: usize = start.parse().unwrap();
    let end: usize = end.parse().unwrap();

    if start >= contents.len() {
        return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
    }
    let end = end.min(contents.len() - 1);
    (StatusCode::PARTIAL_CONTENT, contents.slice(start..=end)).into_response()
}
