//! Explicit read-through cache for comments and documents
//!
//! The cache is owned by whoever handles requests and passed into the
//! engine by reference. It never expires entries on its own: every write the
//! engine performs is followed by an explicit invalidation, and decisions
//! that change state always bypass it and read fresh.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::adapter::{Comment, Result, ReviewRequest};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Documents are read from a request's head ref, so the same path can hold
/// different text for two requests on one repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DocumentKey {
    repository: String,
    head_ref: String,
    path: String,
}

impl DocumentKey {
    fn new(request: &ReviewRequest, path: &str) -> Self {
        Self {
            repository: request.repository.clone(),
            head_ref: request.head_ref.clone(),
            path: path.to_string(),
        }
    }

    fn same_tree(&self, request: &ReviewRequest) -> bool {
        self.repository == request.repository && self.head_ref == request.head_ref
    }
}

#[derive(Debug, Default)]
pub struct ReviewCache {
    comments: Mutex<HashMap<String, Vec<Comment>>>,
    documents: Mutex<HashMap<DocumentKey, Option<String>>>,
    stats: Mutex<CacheStats>,
}

impl ReviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached comments for `request`, fetching on a miss.
    pub fn comments_or_fetch(
        &self,
        request: &ReviewRequest,
        fetch: impl FnOnce() -> Result<Vec<Comment>>,
    ) -> Result<Vec<Comment>> {
        let key = request.key();
        if let Some(hit) = lock(&self.comments).get(&key) {
            self.record(true);
            return Ok(hit.clone());
        }
        self.record(false);
        let fetched = fetch()?;
        lock(&self.comments).insert(key, fetched.clone());
        Ok(fetched)
    }

    /// Cached document text (or absence) for `path` at the request's head
    /// ref, fetching on a miss.
    pub fn document_or_fetch(
        &self,
        request: &ReviewRequest,
        path: &str,
        fetch: impl FnOnce() -> Result<Option<String>>,
    ) -> Result<Option<String>> {
        let key = DocumentKey::new(request, path);
        if let Some(hit) = lock(&self.documents).get(&key) {
            self.record(true);
            return Ok(hit.clone());
        }
        self.record(false);
        let fetched = fetch()?;
        lock(&self.documents).insert(key, fetched.clone());
        Ok(fetched)
    }

    /// Drop cached comments for one request.
    pub fn invalidate_comments(&self, request: &ReviewRequest) {
        lock(&self.comments).remove(&request.key());
    }

    /// Drop every cached document read from the request's head ref.
    pub fn invalidate_documents(&self, request: &ReviewRequest) {
        lock(&self.documents).retain(|key, _| !key.same_tree(request));
    }

    /// Drop everything cached for one request.
    pub fn invalidate(&self, request: &ReviewRequest) {
        tracing::debug!(request = %request.key(), "invalidating review cache");
        self.invalidate_comments(request);
        self.invalidate_documents(request);
    }

    pub fn stats(&self) -> CacheStats {
        *lock(&self.stats)
    }

    fn record(&self, hit: bool) {
        let mut stats = lock(&self.stats);
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
