mod plan;
mod storage;
mod types;

pub use plan::{ReadOutcome, ReadPlan, ReadStep, StepKind, Trigger};
pub use storage::{
    DEFAULT_MESSAGES_COLLECTION, DEFAULT_SYMPTOMS_COLLECTION, HistoryStatsSnapshot, HistoryStore,
};
pub use types::*;
