use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency for every HTTP request.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Replaces dynamic path segments (Mongo ObjectIds, numbers) with a
/// placeholder to keep label cardinality bounded.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized = Vec::new();

    for segment in segments {
        if is_object_id_like(segment) || is_numeric_id(segment) {
            normalized.push("{id}");
        } else {
            normalized.push(segment);
        }
    }

    normalized.join("/")
}

/// Mongo ObjectIds are 24 hex characters.
fn is_object_id_like(s: &str) -> bool {
    s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_object_id() {
        assert_eq!(
            normalize_path("/api/v1/tutor/citas/68b1c2d3e4f5a6b7c8d9e0f1"),
            "/api/v1/tutor/citas/{id}"
        );
    }

    #[test]
    fn test_normalize_numeric() {
        assert_eq!(normalize_path("/admin/users/12345"), "/admin/users/{id}");
    }

    #[test]
    fn test_normalize_leaves_static_paths() {
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(
            normalize_path("/api/v1/maestro/horarios"),
            "/api/v1/maestro/horarios"
        );
    }
}
