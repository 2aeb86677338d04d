use crate::db::models::LoadRequest;
use crate::db::store::DocumentStore;
use crate::identity::{check_admin, Identity};

/// Core load logic — separated from the HTTP layer for testability.
///
/// Resolves what the caller is allowed to see, in priority order: verified
/// admins asking for the moderation view get the most recent version in any
/// state; named callers get approved content plus their own pending edits;
/// anonymous callers get approved content only. A `forModeration` request by
/// a non-admin falls through to the normal rules. Storage errors are logged
/// and reported as "not found", never surfaced to the caller.
pub async fn process_load(store: &dyn DocumentStore, request: LoadRequest) -> Option<String> {
    let identity = Identity::resolve(request.user.as_deref());

    let moderation_view = request.for_moderation && check_admin(store, &identity).await;

    match store
        .load_visible(request.document_id, identity.user_id(), moderation_view)
        .await
    {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("load of document {} failed: {e}", request.document_id);
            None
        }
    }
}

/// Axum handler for `POST /load`.
///
/// Responds with the raw stored content string, or JSON `null` when the
/// document is missing or not visible to the caller.
pub async fn load_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    axum::Json(request): axum::Json<LoadRequest>,
) -> axum::Json<Option<String>> {
    axum::Json(process_load(state.store.as_ref(), request).await)
}
