//! Echo of the resolved request context

use crate::context::RlsContext;
use crate::middleware::RlsContextExt;
use axum::Json;

/// GET /api/v1/whoami
pub async fn whoami(RlsContextExt(context): RlsContextExt) -> Json<RlsContext> {
    Json(context)
}
