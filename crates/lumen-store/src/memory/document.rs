//! In-memory document store with live queries.
//!
//! Every write publishes the touched collection name on a broadcast change
//! feed. Each live subscription runs as its own task that re-evaluates its
//! query whenever its collection changes and pushes the full result set.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use lumen_core::error::AppError;
use lumen_core::result::AppResult;
use lumen_core::traits::document_store::{DocumentStore, Subscription};
use lumen_core::types::document::{Document, WriteBatch, WriteOp};
use lumen_core::types::query::{Query, SortDirection};

use super::matcher;

/// Capacity of the change feed. Lagging subscribers simply re-evaluate.
const CHANGE_FEED_CAPACITY: usize = 256;

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// Change feed event.
#[derive(Debug, Clone)]
enum ChangeEvent {
    /// A collection's contents changed.
    Changed(String),
    /// Subscribers of a collection should receive an error.
    Failed(String, AppError),
}

/// Injected failures.
#[derive(Debug, Default)]
struct Faults {
    gets: AtomicBool,
    queries: AtomicBool,
    writes: AtomicBool,
}

#[derive(Debug)]
struct Inner {
    collections: RwLock<Collections>,
    changes: broadcast::Sender<ChangeEvent>,
    faults: Faults,
    query_count: AtomicU64,
    commit_count: AtomicU64,
    active: DashMap<String, usize>,
    opened: DashMap<String, usize>,
}

/// In-memory [`DocumentStore`].
///
/// Cloning is cheap and clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                changes,
                faults: Faults::default(),
                query_count: AtomicU64::new(0),
                commit_count: AtomicU64::new(0),
                active: DashMap::new(),
                opened: DashMap::new(),
            }),
        }
    }

    /// Insert or replace a document without fault injection. Meant for seeding.
    pub fn insert(&self, collection: &str, id: &str, data: Value) {
        {
            let mut collections = self.inner.write_lock();
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), data);
        }
        self.inner.notify(collection);
    }

    /// Remove a document. Returns whether it existed.
    pub fn remove(&self, collection: &str, id: &str) -> bool {
        let removed = {
            let mut collections = self.inner.write_lock();
            collections
                .get_mut(collection)
                .and_then(|docs| docs.remove(id))
                .is_some()
        };
        if removed {
            self.inner.notify(collection);
        }
        removed
    }

    /// Read a document synchronously.
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        let collections = self.inner.read_lock();
        collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(id, data.clone()))
    }

    /// All documents of a collection, ordered by id.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        let collections = self.inner.read_lock();
        collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Make one-shot `get` calls fail.
    pub fn fail_gets(&self, fail: bool) {
        self.inner.faults.gets.store(fail, Ordering::SeqCst);
    }

    /// Make one-shot queries fail.
    pub fn fail_queries(&self, fail: bool) {
        self.inner.faults.queries.store(fail, Ordering::SeqCst);
    }

    /// Make every write (set, update, commit) fail.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.faults.writes.store(fail, Ordering::SeqCst);
    }

    /// Push an error to every live subscription on `collection`.
    pub fn emit_subscription_error(&self, collection: &str, message: &str) {
        let _ = self.inner.changes.send(ChangeEvent::Failed(
            collection.to_string(),
            AppError::subscription(message.to_string()),
        ));
    }

    /// Number of one-shot queries served so far.
    pub fn query_count(&self) -> u64 {
        self.inner.query_count.load(Ordering::SeqCst)
    }

    /// Number of successfully committed batches.
    pub fn commit_count(&self) -> u64 {
        self.inner.commit_count.load(Ordering::SeqCst)
    }

    /// Live subscriptions currently running on `collection`.
    pub fn active_subscriptions(&self, collection: &str) -> usize {
        self.inner.active.get(collection).map(|n| *n).unwrap_or(0)
    }

    /// Live subscriptions ever opened on `collection`.
    pub fn subscriptions_opened(&self, collection: &str) -> usize {
        self.inner.opened.get(collection).map(|n| *n).unwrap_or(0)
    }

    fn check_writes(&self) -> AppResult<()> {
        if self.inner.faults.writes.load(Ordering::SeqCst) {
            return Err(AppError::store("Injected write failure"));
        }
        Ok(())
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, Collections> {
        self.collections.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, Collections> {
        self.collections.write().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, collection: &str) {
        // No receivers just means nobody is listening.
        let _ = self.changes.send(ChangeEvent::Changed(collection.to_string()));
    }

    fn evaluate(&self, query: &Query) -> Vec<Document> {
        let collections = self.read_lock();
        let Some(docs) = collections.get(&query.collection) else {
            return Vec::new();
        };

        let mut matched: Vec<(&String, &Value)> = docs
            .iter()
            .filter(|(_, data)| matcher::matches(data, &query.filters))
            .collect();

        if let Some(order) = &query.order_by {
            // Documents without the order field are not part of an ordered result.
            matched.retain(|(_, data)| data.get(&order.field).is_some());
            matched.sort_by(|(_, a), (_, b)| {
                let ord = matcher::compare_values(&a[&order.field], &b[&order.field]);
                match order.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        matched
            .into_iter()
            .map(|(id, data)| Document::new(id.clone(), data.clone()))
            .collect()
    }

    fn release(&self, collection: &str) {
        if let Some(mut count) = self.active.get_mut(collection) {
            *count = count.saturating_sub(1);
        }
    }
}

fn merge_patch(target: &mut Value, patch: Value) -> AppResult<()> {
    let (Value::Object(target), Value::Object(patch)) = (target, patch) else {
        return Err(AppError::validation("Update patch must be a JSON object"));
    };
    for (key, value) in patch {
        target.insert(key, value);
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        if self.inner.faults.gets.load(Ordering::SeqCst) {
            return Err(AppError::store("Injected get failure"));
        }
        Ok(self.document(collection, id))
    }

    async fn query(&self, query: &Query) -> AppResult<Vec<Document>> {
        query.validate()?;
        if self.inner.faults.queries.load(Ordering::SeqCst) {
            return Err(AppError::store("Injected query failure"));
        }
        self.inner.query_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.evaluate(query))
    }

    async fn subscribe(&self, query: Query) -> AppResult<Subscription> {
        query.validate()?;

        let (tx, token, subscription) = Subscription::channel();
        let inner = Arc::clone(&self.inner);
        let collection = query.collection.clone();
        // Register for changes before the first evaluation so nothing is missed.
        let mut changes = inner.changes.subscribe();

        *inner.active.entry(collection.clone()).or_insert(0) += 1;
        *inner.opened.entry(collection.clone()).or_insert(0) += 1;
        debug!(collection = %collection, "Live query opened");

        tokio::spawn(async move {
            if tx.send(Ok(inner.evaluate(&query))).is_ok() {
                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        event = changes.recv() => {
                            let snapshot = match event {
                                Ok(ChangeEvent::Changed(c)) if c == collection => {
                                    Ok(inner.evaluate(&query))
                                }
                                Ok(ChangeEvent::Failed(c, err)) if c == collection => Err(err),
                                Ok(_) => continue,
                                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                    trace!(collection = %collection, skipped, "Change feed lagged");
                                    Ok(inner.evaluate(&query))
                                }
                                Err(broadcast::error::RecvError::Closed) => break,
                            };
                            if tx.send(snapshot).is_err() {
                                break;
                            }
                        }
                    }
                }
            }
            inner.release(&collection);
            debug!(collection = %collection, "Live query closed");
        });

        Ok(subscription)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> AppResult<()> {
        self.check_writes()?;
        if !data.is_object() {
            return Err(AppError::validation("Document body must be a JSON object"));
        }
        self.insert(collection, id, data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> AppResult<()> {
        self.check_writes()?;
        {
            let mut collections = self.inner.write_lock();
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| {
                    AppError::not_found(format!("Document '{collection}/{id}' not found"))
                })?;
            merge_patch(doc, patch)?;
        }
        self.inner.notify(collection);
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<()> {
        self.check_writes()?;
        if batch.is_empty() {
            return Ok(());
        }

        let touched: HashSet<String> = batch
            .ops()
            .iter()
            .map(|op| op.collection().to_string())
            .collect();

        {
            let mut collections = self.inner.write_lock();

            // Stage on copies of the touched collections so a failing op
            // leaves the store untouched.
            let mut staged: HashMap<String, BTreeMap<String, Value>> = touched
                .iter()
                .map(|c| (c.clone(), collections.get(c).cloned().unwrap_or_default()))
                .collect();

            for op in batch.into_ops() {
                match op {
                    WriteOp::Set {
                        collection,
                        id,
                        data,
                    } => {
                        if !data.is_object() {
                            return Err(AppError::validation(
                                "Document body must be a JSON object",
                            ));
                        }
                        staged.entry(collection).or_default().insert(id, data);
                    }
                    WriteOp::Update {
                        collection,
                        id,
                        patch,
                    } => {
                        let doc = staged
                            .get_mut(&collection)
                            .and_then(|docs| docs.get_mut(&id))
                            .ok_or_else(|| {
                                AppError::not_found(format!(
                                    "Document '{collection}/{id}' not found"
                                ))
                            })?;
                        merge_patch(doc, patch)?;
                    }
                }
            }

            collections.extend(staged);
        }

        self.inner.commit_count.fetch_add(1, Ordering::SeqCst);
        for collection in &touched {
            self.inner.notify(collection);
        }
        Ok(())
    }
}
