//! A single invocation of an action's execute phase.
//!
//! Lifecycle: Queued -> Running -> Succeeded/Failed. Work created from a
//! skip signal starts (and stays) Skipped. Completion is broadcast through a
//! `watch` channel so any number of waiters observe it without contending
//! for the result.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ExecuteError, WorkError};
use crate::value::Value;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// The bound execute call a work runs on the worker.
pub type Job = Box<dyn FnOnce() -> Result<Value, ExecuteError> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    /// The payload returned the skip signal; execute never ran.
    Skipped,
}

impl WorkStatus {
    /// Valid transitions: Queued -> Running, Running -> Succeeded/Failed.
    pub fn can_transition_to(self, next: WorkStatus) -> bool {
        matches!(
            (self, next),
            (WorkStatus::Queued, WorkStatus::Running)
                | (WorkStatus::Running, WorkStatus::Succeeded)
                | (WorkStatus::Running, WorkStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkStatus::Succeeded | WorkStatus::Failed | WorkStatus::Skipped
        )
    }

    /// Skipped work counts as a success.
    pub fn is_success(self) -> bool {
        matches!(self, WorkStatus::Succeeded | WorkStatus::Skipped)
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkStatus::Queued => write!(f, "queued"),
            WorkStatus::Running => write!(f, "running"),
            WorkStatus::Succeeded => write!(f, "succeeded"),
            WorkStatus::Failed => write!(f, "failed"),
            WorkStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug)]
struct WorkState {
    status: WorkStatus,
    result: Value,
    error: Option<String>,
    finished_at: Option<DateTime<Utc>>,
}

/// One concrete, trackable invocation of an action.
pub struct Work {
    id: Uuid,
    sequence: u64,
    name: String,
    payload: Value,
    created_at: DateTime<Utc>,
    state: Mutex<WorkState>,
    job: Mutex<Option<Job>>,
    done: watch::Sender<bool>,
}

impl Work {
    /// Work waiting for the worker to run `job`.
    pub fn queued(name: impl Into<String>, payload: Value, job: Job) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            sequence: next_sequence(),
            name: name.into(),
            payload,
            created_at: Utc::now(),
            state: Mutex::new(WorkState {
                status: WorkStatus::Queued,
                result: Value::None,
                error: None,
                finished_at: None,
            }),
            job: Mutex::new(Some(job)),
            done: watch::Sender::new(false),
        })
    }

    /// Work already complete, with the skip payload as its result.
    pub fn skipped(name: impl Into<String>, payload: Value) -> Arc<Self> {
        let now = Utc::now();
        Arc::new(Self {
            id: Uuid::new_v4(),
            sequence: next_sequence(),
            name: name.into(),
            payload: payload.clone(),
            created_at: now,
            state: Mutex::new(WorkState {
                status: WorkStatus::Skipped,
                result: payload,
                error: None,
                finished_at: Some(now),
            }),
            job: Mutex::new(None),
            done: watch::Sender::new(true),
        })
    }

    fn state(&self) -> MutexGuard<'_, WorkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: WorkStatus) -> bool {
        let mut state = self.state();
        if !state.status.can_transition_to(next) {
            warn!(work = %self.id, from = %state.status, to = %next, "Invalid work transition");
            return false;
        }
        state.status = next;
        true
    }

    /// Run the bound job and signal completion. A panicking job counts as a
    /// failure. Running a work twice is a no-op.
    pub fn run(&self) {
        let job = self
            .job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(job) = job else {
            debug!(work = %self.id, name = %self.name, "Work has no job to run");
            return;
        };
        if !self.transition(WorkStatus::Running) {
            return;
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(outcome) => outcome,
            Err(cause) => {
                let message = cause
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "execute panicked".to_string());
                Err(ExecuteError::Failed(message))
            }
        };

        {
            let mut state = self.state();
            match outcome {
                Ok(result) => {
                    state.status = WorkStatus::Succeeded;
                    state.result = result;
                }
                Err(e) => {
                    warn!(work = %self.id, name = %self.name, error = %e, "Execute failed");
                    let description = e.to_string();
                    state.status = WorkStatus::Failed;
                    state.result = Value::Text(description.clone());
                    state.error = Some(description);
                }
            }
            state.finished_at = Some(Utc::now());
        }
        self.done.send_replace(true);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Creation order across all works. A later dispatch always has a
    /// larger sequence.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> WorkStatus {
        self.state().status
    }

    /// The execute result, or the error description for failed work.
    pub fn result(&self) -> Value {
        self.state().result.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.state().finished_at
    }

    pub fn is_complete(&self) -> bool {
        *self.done.borrow()
    }

    pub fn success(&self) -> bool {
        self.status().is_success()
    }

    pub fn failure(&self) -> bool {
        self.status() == WorkStatus::Failed
    }

    pub fn snapshot(&self) -> WorkSnapshot {
        let state = self.state();
        WorkSnapshot {
            id: self.id,
            name: self.name.clone(),
            status: state.status,
            payload: self.payload.clone(),
            result: state.result.clone(),
            error: state.error.clone(),
            created_at: self.created_at,
            finished_at: state.finished_at,
        }
    }

    // =========================================================================
    // Waiting
    // =========================================================================

    /// Wait until the work completes.
    pub async fn wait(&self) {
        let mut rx = self.done.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|done| *done).await;
    }

    pub async fn wait_timeout(&self, timeout: Duration) -> Result<(), WorkError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| WorkError::WaitTimeout(timeout))
    }

    /// Wait for completion or for `cancel`, whichever comes first. Cancelling
    /// only stops this wait; the work still runs.
    pub async fn wait_or<E>(&self, cancel: impl Future<Output = E>) -> Result<(), E> {
        tokio::select! {
            biased;
            _ = self.wait() => Ok(()),
            e = cancel => Err(e),
        }
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Work")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// A serializable view of a work, for lookup and last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkSnapshot {
    pub id: Uuid,
    pub name: String,
    pub status: WorkStatus,
    pub payload: Value,
    pub result: Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(result: Result<Value, ExecuteError>) -> Job {
        Box::new(move || result)
    }

    // =========================================================================
    // Status transitions
    // =========================================================================

    #[test]
    fn test_valid_transitions() {
        assert!(WorkStatus::Queued.can_transition_to(WorkStatus::Running));
        assert!(WorkStatus::Running.can_transition_to(WorkStatus::Succeeded));
        assert!(WorkStatus::Running.can_transition_to(WorkStatus::Failed));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!WorkStatus::Queued.can_transition_to(WorkStatus::Succeeded));
        assert!(!WorkStatus::Succeeded.can_transition_to(WorkStatus::Running));
        assert!(!WorkStatus::Failed.can_transition_to(WorkStatus::Succeeded));
        assert!(!WorkStatus::Skipped.can_transition_to(WorkStatus::Running));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&WorkStatus::Succeeded).unwrap(), "\"succeeded\"");
        assert_eq!(WorkStatus::Skipped.to_string(), "skipped");
    }

    // =========================================================================
    // Running
    // =========================================================================

    #[test]
    fn test_run_success() {
        let work = Work::queued("double", Value::from(21), job(Ok(Value::from(42))));
        assert_eq!(work.status(), WorkStatus::Queued);
        assert!(!work.is_complete());

        work.run();
        assert_eq!(work.status(), WorkStatus::Succeeded);
        assert_eq!(work.result(), Value::Integer(42));
        assert_eq!(work.payload(), &Value::Integer(21));
        assert!(work.success());
        assert!(work.is_complete());
        assert!(work.finished_at().is_some());
    }

    #[test]
    fn test_run_failure_stores_description() {
        let work = Work::queued("broken", Value::None, job(Err(ExecuteError::Failed("disk full".into()))));
        work.run();
        assert!(work.failure());
        assert!(!work.success());
        assert_eq!(work.result(), Value::from("Execute failed: disk full"));
        assert_eq!(work.error().as_deref(), Some("Execute failed: disk full"));
        assert!(work.is_complete());
    }

    #[test]
    fn test_run_panic_is_failure() {
        let work = Work::queued("panics", Value::None, Box::new(|| panic!("kaboom")));
        work.run();
        assert!(work.failure());
        assert_eq!(work.error().as_deref(), Some("Execute failed: kaboom"));
    }

    #[test]
    fn test_run_twice_is_noop() {
        let work = Work::queued("once", Value::None, job(Ok(Value::from(1))));
        work.run();
        work.run();
        assert_eq!(work.status(), WorkStatus::Succeeded);
        assert_eq!(work.result(), Value::Integer(1));
    }

    #[test]
    fn test_skipped_is_complete_with_payload() {
        let work = Work::skipped("memo", Value::from("kept"));
        assert_eq!(work.status(), WorkStatus::Skipped);
        assert!(work.is_complete());
        assert!(work.success());
        assert_eq!(work.result(), Value::from("kept"));
        work.run();
        assert_eq!(work.status(), WorkStatus::Skipped);
    }

    #[test]
    fn test_sequence_follows_creation_order() {
        let first = Work::queued("a", Value::None, job(Ok(Value::None)));
        let second = Work::skipped("a", Value::None);
        let third = Work::queued("b", Value::None, job(Ok(Value::None)));
        assert!(first.sequence() < second.sequence());
        assert!(second.sequence() < third.sequence());
    }

    #[test]
    fn test_snapshot_serializes() {
        let work = Work::queued("double", Value::from(21), job(Ok(Value::from(42))));
        work.run();
        let json = serde_json::to_value(work.snapshot()).unwrap();
        assert_eq!(json["name"], "double");
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["result"], 42);
        assert_eq!(json["error"], serde_json::Value::Null);
    }

    // =========================================================================
    // Waiting
    // =========================================================================

    #[tokio::test]
    async fn test_wait_returns_after_run() {
        let work = Work::queued("w", Value::None, job(Ok(Value::None)));
        let runner = Arc::clone(&work);
        std::thread::spawn(move || runner.run());
        work.wait_timeout(Duration::from_secs(5)).await.unwrap();
        assert!(work.is_complete());
    }

    #[tokio::test]
    async fn test_wait_on_skipped_returns_immediately() {
        let work = Work::skipped("s", Value::None);
        work.wait().await;
    }

    #[tokio::test]
    async fn test_wait_timeout_expires() {
        let work = Work::queued("never", Value::None, job(Ok(Value::None)));
        let err = work.wait_timeout(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, WorkError::WaitTimeout(_)));
        assert!(!work.is_complete());
    }

    #[tokio::test]
    async fn test_wait_or_returns_cancellation_error() {
        let work = Work::queued("never", Value::None, job(Ok(Value::None)));
        let result = work.wait_or(async { "cancelled" }).await;
        assert_eq!(result, Err("cancelled"));

        // Cancelling the wait does not stop the work.
        work.run();
        assert!(work.success());
        assert_eq!(work.wait_or(std::future::pending::<()>()).await, Ok(()));
    }
}
