//! Layered read strategies.
//!
//! A [`ReadPlan`] is an ordered list of query steps. The first step always
//! runs; every later step runs only when the outcome so far matches its
//! [`Trigger`]. Errors other than a missing index end the plan immediately.

use super::types::effective_timestamp_of;
use crate::store::{Direction, Document, DocumentStore, Query, StoreError, StoreResult};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Indexed,
    IndexFallback,
    LegacyFallback,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indexed => "indexed",
            Self::IndexFallback => "index_fallback",
            Self::LegacyFallback => "legacy_fallback",
        }
    }
}

/// Condition under which a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Runs first, unconditionally.
    First,
    /// Runs when the previous step failed for lack of a composite index.
    IndexMissing,
    /// Runs when the previous step succeeded with no records.
    Empty,
}

pub struct ReadStep {
    kind: StepKind,
    trigger: Trigger,
    query: Query,
    sort: Direction,
    keep: Option<fn(&Document) -> bool>,
}

impl ReadStep {
    pub fn new(kind: StepKind, trigger: Trigger, query: Query, sort: Direction) -> Self {
        Self {
            kind,
            trigger,
            query,
            sort,
            keep: None,
        }
    }

    /// Drops returned records for which `keep` is false.
    pub fn keep(mut self, keep: fn(&Document) -> bool) -> Self {
        self.keep = Some(keep);
        self
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    fn is_due(&self, state: Option<&StoreResult<Served>>) -> bool {
        match (self.trigger, state) {
            (Trigger::First, None) => true,
            (Trigger::IndexMissing, Some(Err(e))) => e.is_index_missing(),
            (Trigger::Empty, Some(Ok(served))) => served.documents.is_empty(),
            _ => false,
        }
    }

    /// Applies the record filter and the client-side effective-timestamp sort.
    fn finish(&self, mut documents: Vec<Document>) -> Vec<Document> {
        if let Some(keep) = self.keep {
            documents.retain(|d| keep(d));
        }
        // Stable: ties keep the order the store returned.
        match self.sort {
            Direction::Ascending => {
                documents.sort_by_key(|d| effective_timestamp_of(&d.data));
            }
            Direction::Descending => {
                documents.sort_by_key(|d| std::cmp::Reverse(effective_timestamp_of(&d.data)));
            }
        }
        documents
    }
}

struct Served {
    kind: StepKind,
    documents: Vec<Document>,
}

#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub documents: Vec<Document>,
    /// Step whose result was returned; `None` when the plan had no steps.
    pub served_by: Option<StepKind>,
    /// Every step that issued a query, in order.
    pub steps_taken: Vec<StepKind>,
}

impl ReadOutcome {
    pub fn took(&self, kind: StepKind) -> bool {
        self.steps_taken.contains(&kind)
    }
}

pub struct ReadPlan {
    collection: String,
    steps: Vec<ReadStep>,
}

impl ReadPlan {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: ReadStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[ReadStep] {
        &self.steps
    }

    pub async fn execute(&self, store: &dyn DocumentStore) -> StoreResult<ReadOutcome> {
        let mut state: Option<StoreResult<Served>> = None;
        let mut steps_taken = Vec::new();

        for step in &self.steps {
            if !step.is_due(state.as_ref()) {
                continue;
            }

            debug!(
                "Running {} read on {}",
                step.kind.as_str(),
                self.collection
            );
            steps_taken.push(step.kind);

            match store.query(&self.collection, &step.query).await {
                Ok(documents) => {
                    state = Some(Ok(Served {
                        kind: step.kind,
                        documents: step.finish(documents),
                    }));
                }
                Err(e @ StoreError::IndexMissing { .. }) => {
                    warn!(
                        "{} read on {} needs an index ({}), trying next strategy",
                        step.kind.as_str(),
                        self.collection,
                        e
                    );
                    state = Some(Err(e));
                }
                Err(e) => return Err(e),
            }
        }

        match state {
            Some(Ok(served)) => Ok(ReadOutcome {
                documents: served.documents,
                served_by: Some(served.kind),
                steps_taken,
            }),
            Some(Err(e)) => Err(e),
            None => Ok(ReadOutcome {
                documents: Vec::new(),
                served_by: None,
                steps_taken,
            }),
        }
    }
}
