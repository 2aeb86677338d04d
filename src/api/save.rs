use crate::db::models::{NewDocument, SaveRequest, SaveResponse};
use crate::db::store::{DocumentStore, SaveTransaction};
use crate::error::AppError;
use crate::identity::Identity;

/// Core save logic — separated from the HTTP layer for testability.
///
/// Runs the whole save state machine inside one storage transaction:
/// duplicate detection, moderation gating, ownership-aware update vs fresh
/// insert, keyword indexing, and conflict recovery when the uniqueness
/// constraint fires concurrently. Never fails: every path degrades to a
/// structured `{success: false, ...}` response.
pub async fn process_save(store: &dyn DocumentStore, request: SaveRequest) -> SaveResponse {
    // 1. Preconditions: a present identity and an open transaction.
    let identity = Identity::resolve(request.user.as_deref());
    let Some(user) = identity.user_id() else {
        return SaveResponse::rejected();
    };

    let mut tx = match store.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::warn!("could not open a save transaction: {e}");
            return SaveResponse::rejected();
        }
    };

    // 2. Duplicate pre-check against approved documents.
    let duplicate = match tx.find_approved_duplicate(&request.document).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("duplicate pre-check failed: {e}");
            abort(tx).await;
            return SaveResponse::rejected();
        }
    };

    if let Some(existing) = duplicate {
        // The content already exists. Instead of creating a second copy, the
        // caller "likes" the existing one; owners never like their own
        // document. This is a soft failure, not an error.
        if existing.owner != user {
            if let Err(e) = tx.record_like(user, existing.id, false).await {
                tracing::warn!("failed to record like on duplicate save: {e}");
                abort(tx).await;
                return SaveResponse::rejected();
            }
        }
        if let Err(e) = tx.commit().await {
            // The response is correct either way; only the like may be lost.
            tracing::warn!("commit failed on duplicate save: {e}");
        }
        return SaveResponse::duplicate(
            Some(existing.id),
            crate::db::store::UNIQUE_DOCUMENT.to_string(),
        );
    }

    // 3. Moderation gate: admin authors publish immediately, everyone else
    //    lands in the moderation queue. The check fails closed.
    let is_admin = match tx.is_admin(user).await {
        Ok(flag) => flag,
        Err(e) => {
            tracing::warn!("admin check failed for {user}, treating as non-admin: {e}");
            false
        }
    };

    let doc = NewDocument {
        owner: user,
        title: &request.title,
        category: &request.category,
        content: &request.document,
        attachment_count: request.attachments.len() as i32,
        awaiting_moderation: !is_admin,
    };

    // 4. Update an owned identifier, or insert a fresh row.
    let document_id = match insert_or_replace(tx.as_mut(), request.document_id, &doc).await {
        Ok(id) => id,
        Err(AppError::UniqueViolation(constraint)) => {
            // Lost a race: an identical document was created between the
            // pre-check and our insert. Roll back, then recover outside the
            // original transaction.
            abort(tx).await;
            return recover_conflict(store, user, &request.document, constraint).await;
        }
        Err(e) => {
            tracing::warn!("save transaction failed: {e}");
            abort(tx).await;
            return SaveResponse::rejected();
        }
    };

    // 5. Keywords are recreated on every non-duplicate save.
    for keyword in &request.keywords {
        if let Err(e) = tx.insert_keyword(document_id, keyword).await {
            tracing::warn!("keyword insert failed: {e}");
            abort(tx).await;
            return SaveResponse::rejected();
        }
    }

    // 6. Commit. A uniqueness conflict can still surface here.
    match tx.commit().await {
        Ok(()) => SaveResponse::saved(document_id),
        Err(AppError::UniqueViolation(constraint)) => {
            recover_conflict(store, user, &request.document, constraint).await
        }
        Err(e) => {
            tracing::warn!("commit failed: {e}");
            SaveResponse::rejected()
        }
    }
}

/// Ownership-aware write: an identifier supplied by its owner replaces the
/// stored version, anything else becomes a fresh document.
async fn insert_or_replace(
    tx: &mut dyn SaveTransaction,
    document_id: Option<i64>,
    doc: &NewDocument<'_>,
) -> Result<i64, AppError> {
    if let Some(id) = document_id {
        match tx.document_owner(id).await? {
            Some(owner) if owner == doc.owner => {
                tx.replace_document(id, doc).await?;
                return Ok(id);
            }
            // Unknown identifier or someone else's document: fall through to
            // a fresh insert rather than touching it.
            _ => {}
        }
    }
    tx.insert_document(doc).await
}

/// Fallback after a uniqueness violation raced past the pre-check: point the
/// caller at the winning document and record a like against it. The winning
/// row may still be pending, hence the moderation-context like. Recovery
/// failures are logged and swallowed — the response reports the violated
/// constraint regardless.
async fn recover_conflict(
    store: &dyn DocumentStore,
    user: &str,
    content: &str,
    constraint: String,
) -> SaveResponse {
    match store.find_conflicting(content, user).await {
        Ok(Some(id)) => {
            if let Err(e) = store.record_like(user, id, true).await {
                tracing::warn!("conflict recovery could not record like: {e}");
            }
            SaveResponse::duplicate(Some(id), constraint)
        }
        Ok(None) => SaveResponse::duplicate(None, constraint),
        Err(e) => {
            tracing::warn!("conflict recovery lookup failed: {e}");
            SaveResponse::duplicate(None, constraint)
        }
    }
}

async fn abort(tx: Box<dyn SaveTransaction>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!("rollback failed: {e}");
    }
}

/// Axum handler for `POST /save`.
pub async fn save_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    axum::Json(request): axum::Json<SaveRequest>,
) -> axum::Json<SaveResponse> {
    axum::Json(process_save(state.store.as_ref(), request).await)
}
