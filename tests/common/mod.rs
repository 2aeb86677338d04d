#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use chrono::Utc;

use snipshare::app::{router, AppState};
use snipshare::db::models::{Document, DuplicateMatch, NewDocument, SaveResponse};
use snipshare::db::store::{DocumentStore, SaveTransaction, UNIQUE_DOCUMENT};
use snipshare::error::AppError;

/// In-memory implementation of the storage gateway, mirroring the schema
/// semantics the Postgres store relies on: the `(content, moderation state)`
/// uniqueness constraint, at most one pending row per identifier, and
/// conflict-ignore likes. Transactions are snapshot-and-swap, so rollback
/// discards everything since `begin`.
#[derive(Default, Clone)]
pub struct StoreData {
    next_id: i64,
    pub documents: Vec<Document>,
    pub keywords: Vec<(i64, String)>,
    pub likes: HashSet<(String, i64, bool)>,
    pub admins: HashSet<String>,
}

pub struct MemoryStore {
    data: Arc<Mutex<StoreData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(StoreData {
                next_id: 1,
                ..StoreData::default()
            })),
        }
    }

    pub fn grant_admin(&self, user: &str) {
        self.data.lock().unwrap().admins.insert(user.to_string());
    }

    pub fn snapshot(&self) -> StoreData {
        self.data.lock().unwrap().clone()
    }

    /// Simulate a moderation pass: the pending version of the document
    /// becomes the approved one. Moderation tooling itself lives outside
    /// this service.
    pub fn approve(&self, document_id: i64) {
        let mut data = self.data.lock().unwrap();
        data.documents
            .retain(|d| !(d.id == document_id && !d.awaiting_moderation));
        for doc in &mut data.documents {
            if doc.id == document_id {
                doc.awaiting_moderation = false;
            }
        }
    }
}

fn insert_row(data: &mut StoreData, id: i64, doc: &NewDocument<'_>) -> Result<(), AppError> {
    if data
        .documents
        .iter()
        .any(|d| d.content == doc.content && d.awaiting_moderation == doc.awaiting_moderation)
    {
        return Err(AppError::UniqueViolation(UNIQUE_DOCUMENT.to_string()));
    }
    data.documents.push(Document {
        id,
        owner: doc.owner.to_string(),
        title: doc.title.to_string(),
        category: doc.category.to_string(),
        content: doc.content.to_string(),
        attachment_count: doc.attachment_count,
        awaiting_moderation: doc.awaiting_moderation,
        created_at: Utc::now(),
    });
    Ok(())
}

/// The visibility rule shared by the load paths: pending wins over approved,
/// newest wins within a state.
fn visible_content(
    data: &StoreData,
    document_id: i64,
    viewer: Option<&str>,
    moderation_view: bool,
) -> Option<String> {
    let mut candidates: Vec<&Document> = data
        .documents
        .iter()
        .filter(|d| d.id == document_id)
        .filter(|d| {
            if moderation_view {
                true
            } else if let Some(viewer) = viewer {
                !d.awaiting_moderation || d.owner == viewer
            } else {
                !d.awaiting_moderation
            }
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.awaiting_moderation
            .cmp(&a.awaiting_moderation)
            .then(b.created_at.cmp(&a.created_at))
    });
    candidates.first().map(|d| d.content.clone())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn SaveTransaction>, AppError> {
        let staged = self.data.lock().unwrap().clone();
        Ok(Box::new(MemoryTransaction {
            shared: self.data.clone(),
            staged,
        }))
    }

    async fn is_admin(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self.data.lock().unwrap().admins.contains(user_id))
    }

    async fn load_visible(
        &self,
        document_id: i64,
        viewer: Option<&str>,
        moderation_view: bool,
    ) -> Result<Option<String>, AppError> {
        Ok(visible_content(
            &self.data.lock().unwrap(),
            document_id,
            viewer,
            moderation_view,
        ))
    }

    async fn find_conflicting(
        &self,
        content: &str,
        excluding_owner: &str,
    ) -> Result<Option<i64>, AppError> {
        let data = self.data.lock().unwrap();
        let mut matches: Vec<&Document> = data
            .documents
            .iter()
            .filter(|d| d.content == content && d.owner != excluding_owner)
            .collect();
        matches.sort_by(|a, b| {
            b.awaiting_moderation
                .cmp(&a.awaiting_moderation)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(matches.first().map(|d| d.id))
    }

    async fn record_like(
        &self,
        user_id: &str,
        document_id: i64,
        in_moderation: bool,
    ) -> Result<(), AppError> {
        self.data
            .lock()
            .unwrap()
            .likes
            .insert((user_id.to_string(), document_id, in_moderation));
        Ok(())
    }
}

struct MemoryTransaction {
    shared: Arc<Mutex<StoreData>>,
    staged: StoreData,
}

#[async_trait]
impl SaveTransaction for MemoryTransaction {
    async fn find_approved_duplicate(
        &mut self,
        content: &str,
    ) -> Result<Option<DuplicateMatch>, AppError> {
        let found = self.staged.documents.iter().find(|d| {
            d.content == content
                && !d.awaiting_moderation
                && !self
                    .staged
                    .documents
                    .iter()
                    .any(|p| p.id == d.id && p.awaiting_moderation)
        });
        Ok(found.map(|d| DuplicateMatch {
            id: d.id,
            owner: d.owner.clone(),
        }))
    }

    async fn is_admin(&mut self, user_id: &str) -> Result<bool, AppError> {
        Ok(self.staged.admins.contains(user_id))
    }

    async fn document_owner(&mut self, document_id: i64) -> Result<Option<String>, AppError> {
        Ok(self
            .staged
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .map(|d| d.owner.clone()))
    }

    async fn replace_document(
        &mut self,
        document_id: i64,
        doc: &NewDocument<'_>,
    ) -> Result<(), AppError> {
        if doc.awaiting_moderation {
            self.staged
                .documents
                .retain(|d| !(d.id == document_id && d.awaiting_moderation));
        } else {
            self.staged.documents.retain(|d| d.id != document_id);
        }
        self.staged.keywords.retain(|(id, _)| *id != document_id);
        insert_row(&mut self.staged, document_id, doc)
    }

    async fn insert_document(&mut self, doc: &NewDocument<'_>) -> Result<i64, AppError> {
        let id = self.staged.next_id;
        insert_row(&mut self.staged, id, doc)?;
        self.staged.next_id += 1;
        Ok(id)
    }

    async fn insert_keyword(&mut self, document_id: i64, keyword: &str) -> Result<(), AppError> {
        self.staged.keywords.push((document_id, keyword.to_string()));
        Ok(())
    }

    async fn record_like(
        &mut self,
        user_id: &str,
        document_id: i64,
        in_moderation: bool,
    ) -> Result<(), AppError> {
        self.staged
            .likes
            .insert((user_id.to_string(), document_id, in_moderation));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        *self.shared.lock().unwrap() = self.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        Ok(())
    }
}

/// In-memory store plus an HTTP test server wired to the real router.
pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub server: TestServer,
}

impl TestEnv {
    pub fn start() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            store: store.clone(),
        };
        let server = TestServer::new(router(state, None));
        Self { store, server }
    }

    /// POST /save with the standard wire shape.
    pub async fn save(
        &self,
        user: Option<&str>,
        document_id: Option<i64>,
        title: &str,
        content: &str,
        keywords: &[&str],
    ) -> SaveResponse {
        let response = self
            .server
            .post("/save")
            .json(&serde_json::json!({
                "user": user,
                "documentID": document_id,
                "title": title,
                "category": "general",
                "document": content,
                "attachments": [],
                "keywords": keywords,
            }))
            .await;
        response.json::<SaveResponse>()
    }

    /// POST /load with the standard wire shape.
    pub async fn load(
        &self,
        user: Option<&str>,
        document_id: i64,
        for_moderation: bool,
    ) -> Option<String> {
        let response = self
            .server
            .post("/load")
            .json(&serde_json::json!({
                "user": user,
                "documentID": document_id,
                "forModeration": for_moderation,
            }))
            .await;
        response.json::<Option<String>>()
    }
}
