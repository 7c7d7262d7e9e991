use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::Semaphore;

/// Admission gate bounding how many requests execute inside handlers at any
/// instant. Requests past the limit wait for a permit; nothing is shed.
pub struct RequestGate {
    permits: Semaphore,
}

impl RequestGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Semaphore::new(max_concurrent),
        }
    }
}

pub async fn limit_concurrency(
    State(gate): State<Arc<RequestGate>>,
    request: Request,
    next: Next,
) -> Response {
    // The semaphore is never closed, so acquire only fails if it were.
    let _permit = gate.permits.acquire().await.ok();
    next.run(request).await
}
