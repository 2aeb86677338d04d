use async_trait::async_trait;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::Transaction;

use crate::db::models::{DuplicateMatch, NewDocument};
use crate::error::AppError;

/// Name of the schema constraint enforcing content uniqueness per moderation
/// state. Reported back to callers as the `constraint` field on soft
/// duplicates.
pub const UNIQUE_DOCUMENT: &str = "unique_document";

/// Storage gateway for documents, keywords, likes and the external user
/// table.
///
/// This trait allows mocking the database layer in tests. The save workflow
/// runs inside a [`SaveTransaction`]; the remaining methods execute as
/// single statements against the pool and exist for the load workflow and
/// for conflict recovery, which deliberately runs outside the original
/// transaction.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a transaction for a save workflow.
    async fn begin(&self) -> Result<Box<dyn SaveTransaction>, AppError>;

    /// Read the admin flag for a user. Callers are expected to treat any
    /// error as "not admin"; see [`crate::identity::check_admin`].
    async fn is_admin(&self, user_id: &str) -> Result<bool, AppError>;

    /// Fetch the content of a document subject to the visibility rules.
    ///
    /// With `moderation_view` (already admin-verified by the caller) the
    /// most recent version wins regardless of moderation state. A named
    /// `viewer` additionally sees their own pending documents; anonymous
    /// callers see only approved content. When both an approved and a
    /// pending row match, the pending one is preferred.
    async fn load_visible(
        &self,
        document_id: i64,
        viewer: Option<&str>,
        moderation_view: bool,
    ) -> Result<Option<String>, AppError>;

    /// Find a document with exactly this content owned by someone other
    /// than `excluding_owner`, pending versions first. Used by conflict
    /// recovery after a uniqueness violation.
    async fn find_conflicting(
        &self,
        content: &str,
        excluding_owner: &str,
    ) -> Result<Option<i64>, AppError>;

    /// Record a like outside any transaction. Duplicate likes are no-ops.
    async fn record_like(
        &self,
        user_id: &str,
        document_id: i64,
        in_moderation: bool,
    ) -> Result<(), AppError>;
}

/// One logical save operation against the store.
///
/// Dropping a transaction without committing rolls it back, so the pooled
/// connection is released exactly once on every exit path.
#[async_trait]
pub trait SaveTransaction: Send {
    /// Find an approved document whose content exactly equals `content` and
    /// that has no pending counterpart under the same identifier.
    async fn find_approved_duplicate(
        &mut self,
        content: &str,
    ) -> Result<Option<DuplicateMatch>, AppError>;

    /// Admin-flag read on the transaction's own connection, so the save
    /// workflow never checks out a second pooled connection mid-flight.
    async fn is_admin(&mut self, user_id: &str) -> Result<bool, AppError>;

    /// Current owner of the given identifier, if any version of it exists.
    async fn document_owner(&mut self, document_id: i64) -> Result<Option<String>, AppError>;

    /// Replace the stored version(s) of an owned document: the pending row
    /// and the identifier's keywords are always deleted; when the new row is
    /// itself approved (admin edit) the prior approved row is superseded as
    /// well. The new row reuses the same identifier.
    async fn replace_document(
        &mut self,
        document_id: i64,
        doc: &NewDocument<'_>,
    ) -> Result<(), AppError>;

    /// Insert a fresh document and return its store-assigned identifier.
    async fn insert_document(&mut self, doc: &NewDocument<'_>) -> Result<i64, AppError>;

    async fn insert_keyword(&mut self, document_id: i64, keyword: &str) -> Result<(), AppError>;

    /// Record a like within the transaction. Duplicate likes are no-ops.
    async fn record_like(
        &mut self,
        user_id: &str,
        document_id: i64,
        in_moderation: bool,
    ) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

/// Postgres implementation of the [`DocumentStore`].
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn begin(&self) -> Result<Box<dyn SaveTransaction>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSaveTransaction { tx }))
    }

    async fn is_admin(&self, user_id: &str) -> Result<bool, AppError> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT is_admin FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(flag.unwrap_or(false))
    }

    async fn load_visible(
        &self,
        document_id: i64,
        viewer: Option<&str>,
        moderation_view: bool,
    ) -> Result<Option<String>, AppError> {
        let content: Option<String> = if moderation_view {
            sqlx::query_scalar(
                "SELECT content FROM documents \
                 WHERE id = $1 \
                 ORDER BY awaiting_moderation DESC, created_at DESC \
                 LIMIT 1",
            )
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?
        } else if let Some(viewer) = viewer {
            sqlx::query_scalar(
                "SELECT content FROM documents \
                 WHERE id = $1 AND (NOT awaiting_moderation OR owner = $2) \
                 ORDER BY awaiting_moderation DESC, created_at DESC \
                 LIMIT 1",
            )
            .bind(document_id)
            .bind(viewer)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query_scalar(
                "SELECT content FROM documents \
                 WHERE id = $1 AND NOT awaiting_moderation \
                 ORDER BY created_at DESC \
                 LIMIT 1",
            )
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?
        };
        Ok(content)
    }

    async fn find_conflicting(
        &self,
        content: &str,
        excluding_owner: &str,
    ) -> Result<Option<i64>, AppError> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM documents \
             WHERE content = $1 AND owner <> $2 \
             ORDER BY awaiting_moderation DESC, created_at DESC \
             LIMIT 1",
        )
        .bind(content)
        .bind(excluding_owner)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn record_like(
        &self,
        user_id: &str,
        document_id: i64,
        in_moderation: bool,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO likes (user_id, document_id, in_moderation) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(document_id)
        .bind(in_moderation)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

struct PgSaveTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SaveTransaction for PgSaveTransaction {
    async fn find_approved_duplicate(
        &mut self,
        content: &str,
    ) -> Result<Option<DuplicateMatch>, AppError> {
        let row: Option<(i64, String)> = sqlx::query_as(
            "SELECT d.id, d.owner FROM documents d \
             WHERE d.content = $1 AND NOT d.awaiting_moderation \
               AND NOT EXISTS (\
                   SELECT 1 FROM documents p \
                   WHERE p.id = d.id AND p.awaiting_moderation\
               )",
        )
        .bind(content)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|(id, owner)| DuplicateMatch { id, owner }))
    }

    async fn is_admin(&mut self, user_id: &str) -> Result<bool, AppError> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT is_admin FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(flag.unwrap_or(false))
    }

    async fn document_owner(&mut self, document_id: i64) -> Result<Option<String>, AppError> {
        let owner: Option<String> =
            sqlx::query_scalar("SELECT owner FROM documents WHERE id = $1 LIMIT 1")
                .bind(document_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(owner)
    }

    async fn replace_document(
        &mut self,
        document_id: i64,
        doc: &NewDocument<'_>,
    ) -> Result<(), AppError> {
        if doc.awaiting_moderation {
            sqlx::query("DELETE FROM documents WHERE id = $1 AND awaiting_moderation")
                .bind(document_id)
                .execute(&mut *self.tx)
                .await?;
        } else {
            // An approved edit (admin author) supersedes every prior version.
            sqlx::query("DELETE FROM documents WHERE id = $1")
                .bind(document_id)
                .execute(&mut *self.tx)
                .await?;
        }
        sqlx::query("DELETE FROM keywords WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query(
            "INSERT INTO documents \
             (id, owner, title, category, content, attachment_count, awaiting_moderation) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(document_id)
        .bind(doc.owner)
        .bind(doc.title)
        .bind(doc.category)
        .bind(doc.content)
        .bind(doc.attachment_count)
        .bind(doc.awaiting_moderation)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_document(&mut self, doc: &NewDocument<'_>) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO documents \
             (owner, title, category, content, attachment_count, awaiting_moderation) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(doc.owner)
        .bind(doc.title)
        .bind(doc.category)
        .bind(doc.content)
        .bind(doc.attachment_count)
        .bind(doc.awaiting_moderation)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn insert_keyword(&mut self, document_id: i64, keyword: &str) -> Result<(), AppError> {
        sqlx::query("INSERT INTO keywords (document_id, keyword) VALUES ($1, $2)")
            .bind(document_id)
            .bind(keyword)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn record_like(
        &mut self,
        user_id: &str,
        document_id: i64,
        in_moderation: bool,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO likes (user_id, document_id, in_moderation) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(document_id)
        .bind(in_moderation)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
