//! Client-side cache of the task board.
//!
//! [`TaskSyncManager`] keeps a local copy of every task. Listing, creation,
//! full update and deletion touch the cache only after the server confirms.
//! Status moves are optimistic: the cached status changes immediately and
//! the PATCH is reconciled when its response (or failure) arrives.
//!
//! # Reconciliation
//!
//! With [`ReconcileStrategy::Versioned`] every merge compares `version`: a
//! response older than the cached task is dropped, and while a newer move of
//! the same task is still in flight its optimistic status is kept. A failed
//! move reloads only the affected task.
//!
//! With [`ReconcileStrategy::FullResync`] responses overwrite the cache in
//! arrival order, and a failed move refetches the whole listing, discarding
//! every unconfirmed optimistic change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::error::SyncError;
use super::transport::TaskApi;
use crate::api::PatchTaskResponse;
use crate::domain::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus};

/// How server responses are folded into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileStrategy {
    /// Compare versions, reload single tasks on failure.
    #[default]
    Versioned,
    /// Last response wins, refetch everything on failure.
    FullResync,
}

/// The optimistic status of the latest unconfirmed move of one task.
#[derive(Debug, Clone, Copy)]
struct PendingMove {
    sequence: u64,
    status: TaskStatus,
}

#[derive(Debug, Default)]
struct CacheState {
    tasks: Vec<Task>,
    loaded: bool,
    next_sequence: u64,
    pending: HashMap<TaskId, PendingMove>,
    last_error: Option<SyncError>,
}

impl CacheState {
    fn position(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| &task.id == id)
    }

    /// Replaces the cached copy of `incoming.id`, appending it when absent.
    fn merge(&mut self, mut incoming: Task, strategy: ReconcileStrategy) {
        if strategy == ReconcileStrategy::Versioned
            && let Some(pending) = self.pending.get(&incoming.id)
        {
            incoming.status = pending.status;
        }

        match self.position(&incoming.id) {
            Some(index) => {
                let stale = strategy == ReconcileStrategy::Versioned
                    && incoming.version < self.tasks[index].version;
                if stale {
                    tracing::debug!(task_id = %incoming.id, "Ignoring stale response");
                } else {
                    self.tasks[index] = incoming;
                }
            }
            None => self.tasks.push(incoming),
        }
    }

    /// Folds a PATCH or PUT response, including any spawned successor.
    fn absorb(&mut self, response: PatchTaskResponse, strategy: ReconcileStrategy) -> Task {
        let source_id = response.task.id.clone();
        self.merge(response.task.clone(), strategy);

        if let Some(successor) = response.new_recurring_task {
            if let Some(index) = self.position(&source_id) {
                self.tasks[index].recurrence = None;
            }
            if self.position(&successor.id).is_none() {
                self.tasks.push(successor);
            }
        }
        response.task
    }

    fn replace_all(&mut self, tasks: Vec<Task>, strategy: ReconcileStrategy) {
        self.tasks = tasks;
        self.loaded = true;
        match strategy {
            ReconcileStrategy::Versioned => {
                for task in &mut self.tasks {
                    if let Some(pending) = self.pending.get(&task.id) {
                        task.status = pending.status;
                    }
                }
            }
            ReconcileStrategy::FullResync => self.pending.clear(),
        }
    }

    /// Forgets the pending move `sequence` of `id`, unless a newer one replaced it.
    fn settle(&mut self, id: &TaskId, sequence: u64) {
        if self
            .pending
            .get(id)
            .is_some_and(|pending| pending.sequence == sequence)
        {
            self.pending.remove(id);
        }
    }
}

// =============================================================================
// Task Sync Manager
// =============================================================================

/// Cloneable handle over a shared task cache.
///
/// Every failed call is returned to its caller once and also kept as
/// [`last_error`](Self::last_error). Nothing is retried.
#[derive(Clone)]
pub struct TaskSyncManager {
    api: Arc<dyn TaskApi>,
    strategy: ReconcileStrategy,
    state: Arc<Mutex<CacheState>>,
}

impl std::fmt::Debug for TaskSyncManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TaskSyncManager")
            .field("api", &"Arc<dyn TaskApi>")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl TaskSyncManager {
    /// Creates a manager with an empty cache and the default strategy.
    #[must_use]
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self::with_strategy(api, ReconcileStrategy::default())
    }

    #[must_use]
    pub fn with_strategy(api: Arc<dyn TaskApi>, strategy: ReconcileStrategy) -> Self {
        Self {
            api,
            strategy,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    #[must_use]
    pub const fn strategy(&self) -> ReconcileStrategy {
        self.strategy
    }

    /// Snapshot of the cache, in display order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.with_state(|state| state.tasks.clone())
    }

    /// The cached copy of one task.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.with_state(|state| state.position(id).map(|index| state.tasks[index].clone()))
    }

    /// Whether a listing has been loaded at least once.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.with_state(|state| state.loaded)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<SyncError> {
        self.with_state(|state| state.last_error.clone())
    }

    pub fn clear_error(&self) {
        self.with_state(|state| state.last_error = None);
    }

    /// Replaces the cache with the server listing.
    ///
    /// A successful refresh clears `last_error`.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the cache is left as it was.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let tasks = self.record(self.api.list().await)?;
        self.with_state(|state| {
            state.replace_all(tasks, self.strategy);
            state.last_error = None;
        });
        Ok(())
    }

    /// Creates a task and puts it at the front of the cache.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the cache is left as it was.
    pub async fn create_task(&self, draft: &TaskDraft) -> Result<Task, SyncError> {
        let task = self.record(self.api.create(draft).await)?;
        self.with_state(|state| {
            if state.position(&task.id).is_none() {
                state.tasks.insert(0, task.clone());
            }
        });
        Ok(task)
    }

    /// Replaces a task through `PUT`.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the cache is left as it was.
    pub async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, SyncError> {
        let response = self.record(self.api.update(id, patch).await)?;
        Ok(self.with_state(|state| state.absorb(response, self.strategy)))
    }

    /// Deletes a task and drops it from the cache.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the cache is left as it was.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), SyncError> {
        self.record(self.api.delete(id).await)?;
        self.with_state(|state| {
            state.tasks.retain(|task| &task.id != id);
            state.pending.remove(id);
        });
        Ok(())
    }

    /// Moves a task to `status`, showing the change before the server answers.
    ///
    /// On success the server copy replaces the optimistic one and a spawned
    /// successor is appended. On failure the cache is reconciled according to
    /// the strategy and the original error is returned.
    ///
    /// # Errors
    ///
    /// Returns the PATCH error, after reconciliation has run.
    pub async fn move_task(&self, id: &TaskId, status: TaskStatus) -> Result<Task, SyncError> {
        let sequence = self.with_state(|state| {
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state
                .pending
                .insert(id.clone(), PendingMove { sequence, status });
            if let Some(index) = state.position(id) {
                state.tasks[index].status = status;
            }
            sequence
        });

        let result = self.api.patch(id, &TaskPatch::status(status)).await;

        match result {
            Ok(response) => Ok(self.with_state(|state| {
                state.settle(id, sequence);
                state.absorb(response, self.strategy)
            })),
            Err(error) => {
                tracing::warn!(task_id = %id, %error, "Move failed, reconciling");
                self.with_state(|state| {
                    state.settle(id, sequence);
                    state.last_error = Some(error.clone());
                });
                self.reconcile_failed_move(id).await;
                Err(error)
            }
        }
    }

    async fn reconcile_failed_move(&self, id: &TaskId) {
        if self.strategy == ReconcileStrategy::Versioned {
            match self.api.get(id).await {
                Ok(task) => {
                    self.with_state(|state| {
                        if let Some(index) = state.position(id) {
                            let mut task = task;
                            if let Some(pending) = state.pending.get(id) {
                                task.status = pending.status;
                            }
                            if task.version >= state.tasks[index].version {
                                state.tasks[index] = task;
                            }
                        }
                    });
                    return;
                }
                Err(SyncError::NotFound(_)) => {
                    self.with_state(|state| {
                        state.tasks.retain(|task| &task.id != id);
                        state.pending.remove(id);
                    });
                    return;
                }
                Err(error) => {
                    tracing::warn!(task_id = %id, %error, "Reload failed, resynchronising");
                }
            }
        }

        tracing::warn!("Resynchronising task cache");
        match self.api.list().await {
            Ok(tasks) => self.with_state(|state| state.replace_all(tasks, self.strategy)),
            Err(error) => {
                tracing::warn!(%error, "Resynchronisation failed");
                self.with_state(|state| state.last_error = Some(error));
            }
        }
    }

    fn record<T>(&self, result: Result<T, SyncError>) -> Result<T, SyncError> {
        if let Err(error) = &result {
            self.with_state(|state| state.last_error = Some(error.clone()));
        }
        result
    }

    fn with_state<R>(&self, operation: impl FnOnce(&mut CacheState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        operation(&mut guard)
    }
}

// =============================================================================
// Tests
// =============================================================================
