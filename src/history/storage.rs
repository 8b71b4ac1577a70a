use super::plan::{ReadOutcome, ReadPlan, ReadStep, StepKind, Trigger};
use super::types::*;
use crate::config::StoreConfig;
use crate::llm::SymptomAnalysis;
use crate::store::{
    Direction, Document, DocumentStore, IndexSpec, NewDocument, Query, SqliteDocumentStore,
};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

pub const DEFAULT_MESSAGES_COLLECTION: &str = "chats";
pub const DEFAULT_SYMPTOMS_COLLECTION: &str = "symptomAnalysis";

#[derive(Debug, Default)]
struct HistoryStats {
    index_fallbacks: AtomicU64,
    legacy_fallbacks: AtomicU64,
    legacy_records_recovered: AtomicU64,
    skipped_records: AtomicU64,
}

/// Counters separating reads served normally from reads served by a fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStatsSnapshot {
    /// Reads that re-ran without ordering because an index was missing.
    pub index_fallbacks: u64,
    /// Chat reads that came back empty and queried for unpartitioned records.
    pub legacy_fallbacks: u64,
    /// Unpartitioned records returned by those legacy reads.
    pub legacy_records_recovered: u64,
    /// Stored records that could not be decoded and were left out.
    pub skipped_records: u64,
}

/// Per-user conversation and symptom-analysis history.
pub struct HistoryStore {
    store: Arc<dyn DocumentStore>,
    messages_collection: String,
    symptoms_collection: String,
    stats: HistoryStats,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            messages_collection: DEFAULT_MESSAGES_COLLECTION.to_string(),
            symptoms_collection: DEFAULT_SYMPTOMS_COLLECTION.to_string(),
            stats: HistoryStats::default(),
        }
    }

    pub fn with_collections(
        mut self,
        messages: impl Into<String>,
        symptoms: impl Into<String>,
    ) -> Self {
        self.messages_collection = messages.into();
        self.symptoms_collection = symptoms.into();
        self
    }

    /// Opens the configured database and, if asked to, provisions the composite indexes.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let store = SqliteDocumentStore::open(&config.database_path)
            .await
            .map_err(|e| Error::persistence("open_store", e))?;

        let history = Self::new(Arc::new(store)).with_collections(
            config.messages_collection.clone(),
            config.symptoms_collection.clone(),
        );

        if config.provision_indexes {
            history.provision_indexes().await?;
        }

        Ok(history)
    }

    /// Creates the composite indexes the ordered reads need.
    pub async fn provision_indexes(&self) -> Result<()> {
        let indexes = [
            IndexSpec::new(
                self.messages_collection.as_str(),
                [FIELD_USER_ID, FIELD_CONTEXT],
                FIELD_TIMESTAMP,
            ),
            IndexSpec::new(
                self.symptoms_collection.as_str(),
                [FIELD_USER_ID],
                FIELD_TIMESTAMP,
            ),
        ];

        for index in &indexes {
            self.store
                .ensure_index(index)
                .await
                .map_err(|e| Error::persistence("provision_indexes", e))?;
        }
        info!("Provisioned {} composite indexes", indexes.len());
        Ok(())
    }

    pub fn stats(&self) -> HistoryStatsSnapshot {
        HistoryStatsSnapshot {
            index_fallbacks: self.stats.index_fallbacks.load(Ordering::Relaxed),
            legacy_fallbacks: self.stats.legacy_fallbacks.load(Ordering::Relaxed),
            legacy_records_recovered: self
                .stats
                .legacy_records_recovered
                .load(Ordering::Relaxed),
            skipped_records: self.stats.skipped_records.load(Ordering::Relaxed),
        }
    }

    pub async fn append_message(
        &self,
        user_id: &str,
        content: &str,
        role: Role,
        context: Context,
    ) -> Result<()> {
        let mut data = Map::new();
        data.insert(FIELD_USER_ID.to_string(), Value::from(user_id));
        data.insert("message".to_string(), Value::from(content));
        data.insert("role".to_string(), Value::from(role.as_str()));
        data.insert(FIELD_CONTEXT.to_string(), Value::from(context.as_str()));
        data.insert(FIELD_CREATED_AT.to_string(), Value::from(client_now()));

        let id = self
            .store
            .insert(
                &self.messages_collection,
                NewDocument::new(data).with_server_timestamp(FIELD_TIMESTAMP),
            )
            .await
            .map_err(|e| Error::persistence("append_message", e))?;

        debug!(
            "Saved {} message {} for user {} ({})",
            role.as_str(),
            id,
            user_id,
            context.as_str()
        );
        Ok(())
    }

    /// The strategy chain behind [`list_messages`](Self::list_messages).
    pub fn message_plan(&self, user_id: &str, context: Context) -> ReadPlan {
        let indexed = Query::new()
            .filter(FIELD_USER_ID, user_id)
            .filter(FIELD_CONTEXT, context.as_str())
            .order_by(FIELD_TIMESTAMP, Direction::Ascending);
        let unordered = indexed.unordered();

        let plan = ReadPlan::new(self.messages_collection.as_str())
            .step(ReadStep::new(
                StepKind::Indexed,
                Trigger::First,
                indexed,
                Direction::Ascending,
            ))
            .step(ReadStep::new(
                StepKind::IndexFallback,
                Trigger::IndexMissing,
                unordered,
                Direction::Ascending,
            ));

        // Only the chat partition existed before records were tagged.
        if context != Context::Chat {
            return plan;
        }
        plan.step(
            ReadStep::new(
                StepKind::LegacyFallback,
                Trigger::Empty,
                Query::new().filter(FIELD_USER_ID, user_id),
                Direction::Ascending,
            )
            .keep(is_unpartitioned),
        )
    }

    /// Messages of one partition, oldest first.
    pub async fn list_messages(&self, user_id: &str, context: Context) -> Result<Vec<Message>> {
        let outcome = self
            .message_plan(user_id, context)
            .execute(self.store.as_ref())
            .await
            .map_err(|e| Error::persistence("list_messages", e))?;

        self.record(&outcome);
        let served_by = outcome.served_by;
        let messages: Vec<Message> = self.decode_all(outcome.documents);

        if served_by == Some(StepKind::LegacyFallback) {
            self.stats
                .legacy_records_recovered
                .fetch_add(messages.len() as u64, Ordering::Relaxed);
            info!(
                "Recovered {} unpartitioned messages for user {}",
                messages.len(),
                user_id
            );
        }
        debug!(
            "Retrieved {} {} messages for user {}",
            messages.len(),
            context.as_str(),
            user_id
        );
        Ok(messages)
    }

    /// The strategy chain behind [`list_symptom_history`](Self::list_symptom_history).
    pub fn symptom_plan(&self, user_id: &str) -> ReadPlan {
        let indexed = Query::new()
            .filter(FIELD_USER_ID, user_id)
            .order_by(FIELD_TIMESTAMP, Direction::Descending);
        let unordered = indexed.unordered();

        ReadPlan::new(self.symptoms_collection.as_str())
            .step(ReadStep::new(
                StepKind::Indexed,
                Trigger::First,
                indexed,
                Direction::Descending,
            ))
            .step(ReadStep::new(
                StepKind::IndexFallback,
                Trigger::IndexMissing,
                unordered,
                Direction::Descending,
            ))
    }

    /// Symptom analyses, most recent first.
    pub async fn list_symptom_history(&self, user_id: &str) -> Result<Vec<SymptomRecord>> {
        let outcome = self
            .symptom_plan(user_id)
            .execute(self.store.as_ref())
            .await
            .map_err(|e| Error::persistence("list_symptom_history", e))?;

        self.record(&outcome);
        let records: Vec<SymptomRecord> = self.decode_all(outcome.documents);
        debug!(
            "Retrieved {} symptom records for user {}",
            records.len(),
            user_id
        );
        Ok(records)
    }

    pub async fn save_symptom_analysis(
        &self,
        user_id: &str,
        symptoms: &str,
        analysis: &SymptomAnalysis,
    ) -> Result<()> {
        let mut data = Map::new();
        data.insert(FIELD_USER_ID.to_string(), Value::from(user_id));
        data.insert("symptoms".to_string(), Value::from(symptoms));
        data.insert("analysis".to_string(), serde_json::to_value(analysis)?);
        data.insert(FIELD_CREATED_AT.to_string(), Value::from(client_now()));

        let id = self
            .store
            .insert(
                &self.symptoms_collection,
                NewDocument::new(data).with_server_timestamp(FIELD_TIMESTAMP),
            )
            .await
            .map_err(|e| Error::persistence("save_symptom_analysis", e))?;

        debug!("Saved symptom analysis {} for user {}", id, user_id);
        Ok(())
    }

    fn record(&self, outcome: &ReadOutcome) {
        if outcome.took(StepKind::IndexFallback) {
            self.stats.index_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.took(StepKind::LegacyFallback) {
            self.stats.legacy_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Decodes records in order, leaving out any that no longer fit the schema.
    fn decode_all<T: DeserializeOwned>(&self, documents: Vec<Document>) -> Vec<T> {
        documents
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                match serde_json::from_value(doc.into_value()) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping undecodable record {}: {}", id, e);
                        self.stats.skipped_records.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                }
            })
            .collect()
    }
}

fn is_unpartitioned(doc: &Document) -> bool {
    !doc.has_field(FIELD_CONTEXT)
}
