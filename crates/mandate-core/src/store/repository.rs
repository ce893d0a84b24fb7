use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::keys;
use crate::domain::{
    Call, CallId, CodeUnit, CodeUnitId, ContinuationToken, ScheduleId, ScheduleRecord, StepId,
    StepRecord, TaskId, TaskRecord, TemplateId, TemplateRecord,
};
use crate::ports::{KvStore, StoreError};

/// Index entry resolving a continuation token back to its step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationEntry {
    pub task_id: TaskId,
    pub step_id: StepId,
    pub ordinal: u32,
}

/// Typed access to every record kind.
///
/// Records are JSON-encoded. A missing record is `Ok(None)`; a value that
/// does not decode is [`StoreError::Corrupt`].
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn KvStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: String) -> Result<Option<T>, StoreError> {
        match self.store.get(&key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Corrupt { key, source }),
            None => Ok(None),
        }
    }

    async fn put_json<T: Serialize + Sync>(&self, key: String, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Encode {
            key: key.clone(),
            source,
        })?;
        self.store.put(&key, bytes).await
    }

    async fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, StoreError> {
        self.store
            .iterate(prefix)
            .await?
            .into_iter()
            .map(|(key, bytes)| {
                serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { key, source })
            })
            .collect()
    }

    pub async fn code_unit(&self, id: CodeUnitId) -> Result<Option<CodeUnit>, StoreError> {
        self.get_json(keys::key(keys::CODE_UNITS, id)).await
    }

    pub async fn put_code_unit(&self, unit: &CodeUnit) -> Result<(), StoreError> {
        self.put_json(keys::key(keys::CODE_UNITS, unit.id), unit).await
    }

    pub async fn call(&self, id: CallId) -> Result<Option<Call>, StoreError> {
        self.get_json(keys::key(keys::CALLS, id)).await
    }

    pub async fn put_call(&self, call: &Call) -> Result<(), StoreError> {
        self.put_json(keys::key(keys::CALLS, call.id), call).await
    }

    pub async fn step(&self, id: StepId) -> Result<Option<StepRecord>, StoreError> {
        self.get_json(keys::key(keys::STEPS, id)).await
    }

    pub async fn put_step(&self, step: &StepRecord) -> Result<(), StoreError> {
        self.put_json(keys::key(keys::STEPS, step.id), step).await
    }

    pub async fn task(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        self.get_json(keys::key(keys::TASKS, id)).await
    }

    pub async fn put_task(&self, task: &TaskRecord) -> Result<(), StoreError> {
        self.put_json(keys::key(keys::TASKS, task.id), task).await
    }

    pub async fn tasks(&self) -> Result<Vec<TaskRecord>, StoreError> {
        self.scan(keys::TASKS).await
    }

    /// Steps of `task` in ordinal order. Steps missing from the store are
    /// skipped.
    pub async fn steps_of(&self, task: &TaskRecord) -> Result<Vec<StepRecord>, StoreError> {
        let mut steps = Vec::with_capacity(task.step_ids.len());
        for step_id in &task.step_ids {
            if let Some(step) = self.step(*step_id).await? {
                steps.push(step);
            }
        }
        Ok(steps)
    }

    pub async fn template(&self, id: TemplateId) -> Result<Option<TemplateRecord>, StoreError> {
        self.get_json(keys::key(keys::TEMPLATES, id)).await
    }

    pub async fn put_template(&self, template: &TemplateRecord) -> Result<(), StoreError> {
        self.put_json(keys::key(keys::TEMPLATES, template.id), template)
            .await
    }

    pub async fn schedule(&self, id: ScheduleId) -> Result<Option<ScheduleRecord>, StoreError> {
        self.get_json(keys::key(keys::SCHEDULES, id)).await
    }

    pub async fn put_schedule(&self, schedule: &ScheduleRecord) -> Result<(), StoreError> {
        self.put_json(keys::key(keys::SCHEDULES, schedule.id), schedule)
            .await
    }

    pub async fn schedules(&self) -> Result<Vec<ScheduleRecord>, StoreError> {
        self.scan(keys::SCHEDULES).await
    }

    pub async fn continuation(
        &self,
        token: &ContinuationToken,
    ) -> Result<Option<ContinuationEntry>, StoreError> {
        self.get_json(keys::continuation(token)).await
    }

    pub async fn put_continuation(
        &self,
        token: &ContinuationToken,
        entry: &ContinuationEntry,
    ) -> Result<(), StoreError> {
        self.put_json(keys::continuation(token), entry).await
    }
}
