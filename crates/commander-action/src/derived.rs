//! Actions derived from other actions.
//!
//! A watch re-runs a child's execute on a timer until its generated
//! `stop-<child>` command runs. A trigger unlocks a fixed set of follow-up
//! commands once its parent succeeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use commander_core::{SessionEvent, SharedConfig};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::action::{Action, ActionRef, Additions};
use crate::builder::ActionBuilder;
use crate::error::{ExecuteError, PayloadError};
use crate::registry::WeakCommands;
use crate::value::Value;

/// Stops one recurring watch task. Stopping more than once is harmless.
///
/// Ticks run under `running`, and `stop` takes the same lock, so once
/// `stop` returns no tick is in flight and none will start.
#[derive(Debug, Default)]
pub struct StopHandle {
    stopped: AtomicBool,
    notify: Notify,
    running: Mutex<()>,
}

impl StopHandle {
    /// Returns whether this call did the stopping. Waits for a tick in
    /// flight to finish.
    pub fn stop(&self) -> bool {
        let _running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        let first = !self.stopped.swap(true, Ordering::SeqCst);
        if first {
            // notify_one stores a permit, so a task not yet waiting still
            // sees it.
            self.notify.notify_one();
        }
        first
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    async fn stopped(&self) {
        self.notify.notified().await;
    }

    /// Run `tick` unless stopped. Blocks `stop` until it returns.
    fn run_tick<T>(&self, tick: impl FnOnce() -> T) -> Option<T> {
        let _running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_stopped() {
            return None;
        }
        Some(tick())
    }
}

type StopSlot = Arc<Mutex<Option<Arc<StopHandle>>>>;

/// Runs a child's execute every `interval` with the payload gathered once.
///
/// Executing the watch starts the timer and returns immediately; the
/// first tick fires one interval later. Executing it again replaces the
/// previous timer.
pub struct WatchAction {
    child: ActionRef,
    interval: Duration,
    runtime: Option<Handle>,
    slot: StopSlot,
}

impl WatchAction {
    /// Timers run on the tokio runtime current at construction.
    pub fn new(child: ActionRef, interval: Duration) -> Self {
        Self {
            child,
            interval,
            runtime: Handle::try_current().ok(),
            slot: Arc::default(),
        }
    }

    pub fn stop_name(&self) -> String {
        format!("stop-{}", self.child.name())
    }

    /// Whether a timer is currently running.
    pub fn is_running(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_stopped())
    }

    fn stop_action(&self) -> ActionRef {
        let slot = Arc::clone(&self.slot);
        let child = self.child.name();
        let stopped = child.clone();
        ActionBuilder::new()
            .name(self.stop_name())
            .description(format!("stop watching {}", child))
            .tags(["watch", child.as_str()])
            .execute_none(move |_| {
                let handle = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                match handle {
                    Some(handle) if handle.stop() => {
                        info!(child = %stopped, "Watch stopped");
                        Ok(Value::from("stopped"))
                    }
                    _ => Ok(Value::from("already stopped")),
                }
            })
            .build()
    }
}

impl Action for WatchAction {
    fn name(&self) -> String {
        format!("watch-{}", self.child.name())
    }

    fn description(&self) -> String {
        format!("run {} every {:?}", self.child.name(), self.interval)
    }

    fn payload(&self, config: &SharedConfig) -> Result<Value, PayloadError> {
        self.child.payload(config)
    }

    fn execute(&self, config: &SharedConfig, payload: Value) -> Result<Value, ExecuteError> {
        let runtime = self
            .runtime
            .clone()
            .ok_or_else(|| ExecuteError::Runtime("watch was created outside a tokio runtime".to_string()))?;
        if self.interval.is_zero() {
            return Err(ExecuteError::Failed("watch interval must be non-zero".to_string()));
        }

        let handle = Arc::new(StopHandle::default());
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Arc::clone(&handle));
        if let Some(previous) = previous {
            previous.stop();
        }

        let child = Arc::clone(&self.child);
        let config = config.clone();
        let interval = self.interval;
        runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = handle.stopped() => break,
                }
                let ticking = Arc::clone(&handle);
                let child = Arc::clone(&child);
                let config = config.clone();
                let payload = payload.clone();
                let tick = tokio::task::spawn_blocking(move || {
                    ticking.run_tick(|| child.execute(&config, payload))
                })
                .await;
                match tick {
                    Ok(None) => break,
                    Ok(Some(Ok(_))) => debug!("Watch tick finished"),
                    Ok(Some(Err(e))) => warn!(error = %e, "Watch tick failed"),
                    Err(e) => warn!(error = %e, "Watch tick panicked"),
                }
            }
            debug!("Watch task exited");
        });

        info!(child = %self.child.name(), interval = ?self.interval, "Watch started");
        Ok(Value::from(format!("watching {}", self.child.name())))
    }

    fn additions(&self, _config: &SharedConfig) -> Additions {
        let mut additions = Additions::new();
        additions.insert(self.stop_name(), self.stop_action());
        additions
    }

    fn removals(&self) -> Vec<String> {
        self.child.removals()
    }

    fn tags(&self) -> Vec<String> {
        vec!["watch".to_string(), "repeating".to_string(), self.child.name()]
    }
}

/// Wrap `child` in a [`WatchAction`].
pub fn watch(child: ActionRef, interval: Duration) -> ActionRef {
    Arc::new(WatchAction::new(child, interval))
}

/// `parent` with its additions replaced by `children`, keyed by name.
pub fn trigger(parent: ActionRef, children: Vec<ActionRef>) -> ActionRef {
    let additions: Additions = children
        .into_iter()
        .map(|child| (child.name(), child))
        .collect();
    ActionBuilder::overriding(parent).additions(additions).build()
}

/// `action` under another name, with that name added to its tags.
pub fn rename(name: impl Into<String>, action: ActionRef) -> ActionRef {
    let name = name.into();
    let tag = name.clone();
    let parent = Arc::clone(&action);
    ActionBuilder::overriding(action)
        .name(name)
        .tags_fn(move || {
            let mut tags = parent.tags();
            tags.push(tag.clone());
            tags
        })
        .build()
}

/// An action whose execute shows a fixed message.
pub fn print_action(
    weak: WeakCommands,
    name: impl Into<String>,
    message: impl Into<String>,
) -> ActionRef {
    let name = name.into();
    let message = message.into();
    let source = name.clone();
    ActionBuilder::new()
        .name(name)
        .execute_none(move |_| {
            let commands = weak.upgrade().ok_or(ExecuteError::RegistryUnavailable)?;
            commands.emit(SessionEvent::Output {
                source: source.clone(),
                text: message.clone(),
            });
            Ok(Value::Text(message.clone()))
        })
        .build()
}
