use std::sync::Arc;

use axum::extract::Extension;

use crate::app::services::AppServices;
use crate::functions::{self, ApiResponse};

/// `POST /admin/redrive`: run one sweep now.
pub async fn redrive(Extension(services): Extension<Arc<AppServices>>) -> ApiResponse {
    functions::redrive_handler(
        services.dead_letter.as_ref(),
        services.primary.as_ref(),
        services.redrive,
    )
    .await
}
