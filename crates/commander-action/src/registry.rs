//! The command registry and the dispatch protocol.
//!
//! [`Commands`] maps command keys (names and aliases) to shared actions,
//! owns the session config and the worker queue, and remembers the last
//! dispatched action not tagged `default`. Dispatching runs the payload on
//! the caller's thread, queues the execute phase, and spawns a waiter that
//! applies the action's registry deltas once its work succeeds.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};

use commander_core::{SessionEvent, SharedConfig};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::action::{same_action, Action, ActionRef, NopAction, DEFAULT_TAG};
use crate::builtin;
use crate::error::{DispatchError, PayloadError, RegistryError};
use crate::queue::WorkQueue;
use crate::scan::{Scanner, StdinScanner};
use crate::work::Work;

/// Pending works the queue holds before `submit` blocks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

const EVENT_CAPACITY: usize = 256;

/// A registry entry. Removed keys stay in the map as tombstones.
#[derive(Clone)]
enum Binding {
    Live(ActionRef),
    Removed,
}

impl Binding {
    fn live(&self) -> Option<&ActionRef> {
        match self {
            Binding::Live(action) => Some(action),
            Binding::Removed => None,
        }
    }
}

struct Inner {
    bindings: RwLock<HashMap<String, Binding>>,
    config: SharedConfig,
    queue: WorkQueue,
    last: Mutex<Option<ActionRef>>,
    events: broadcast::Sender<SessionEvent>,
    runtime: Handle,
    scanner: Arc<dyn Scanner>,
    fallback: OnceLock<ActionRef>,
}

/// Shared handle to a command registry. Clones refer to the same registry.
#[derive(Clone)]
pub struct Commands {
    inner: Arc<Inner>,
}

/// A registry handle that does not keep the registry alive. Built-in
/// commands hold one of these.
#[derive(Clone)]
pub struct WeakCommands(Weak<Inner>);

impl WeakCommands {
    pub fn upgrade(&self) -> Option<Commands> {
        self.0.upgrade().map(|inner| Commands { inner })
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

impl Commands {
    /// Create a registry with the built-in commands installed, reading
    /// operator input from stdin.
    ///
    /// Must be called inside a tokio runtime; completion waiters and
    /// watch timers are spawned on it.
    pub fn new(config: SharedConfig) -> Result<Self, RegistryError> {
        Self::with_scanner(config, Arc::new(StdinScanner))
    }

    /// Like [`Commands::new`], with built-ins reading input from `scanner`.
    pub fn with_scanner(
        config: SharedConfig,
        scanner: Arc<dyn Scanner>,
    ) -> Result<Self, RegistryError> {
        Self::with_capacity(config, DEFAULT_QUEUE_CAPACITY, scanner)
    }

    pub fn with_capacity(
        config: SharedConfig,
        capacity: usize,
        scanner: Arc<dyn Scanner>,
    ) -> Result<Self, RegistryError> {
        let runtime = Handle::try_current().map_err(|_| RegistryError::NoRuntime)?;
        let queue = WorkQueue::start(capacity)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let commands = Self {
            inner: Arc::new(Inner {
                bindings: RwLock::new(HashMap::new()),
                config,
                queue,
                last: Mutex::new(None),
                events,
                runtime,
                scanner,
                fallback: OnceLock::new(),
            }),
        };
        builtin::install(&commands);
        Ok(commands)
    }

    pub fn downgrade(&self) -> WeakCommands {
        WeakCommands(Arc::downgrade(&self.inner))
    }

    pub(crate) fn set_fallback(&self, help: ActionRef) {
        let _ = self.inner.fallback.set(help);
    }

    pub fn config(&self) -> &SharedConfig {
        &self.inner.config
    }

    /// The scanner built-in commands read operator input from.
    pub fn scanner(&self) -> Arc<dyn Scanner> {
        Arc::clone(&self.inner.scanner)
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    /// Bind `action` under its name and every alias, overwriting existing
    /// bindings.
    pub fn set<I, S>(&self, action: ActionRef, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bindings = self
            .inner
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for alias in aliases {
            bindings.insert(normalize(alias.as_ref()), Binding::Live(Arc::clone(&action)));
        }
        debug!(name = %action.name(), "Command bound");
        bindings.insert(normalize(&action.name()), Binding::Live(action));
    }

    /// Tombstone `keys`. They stay known to the registry but resolve to
    /// nothing.
    pub fn remove<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut bindings = self
            .inner
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            let key = normalize(key.as_ref());
            debug!(key = %key, "Command removed");
            bindings.insert(key, Binding::Removed);
        }
    }

    /// The live action bound to `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<ActionRef> {
        self.inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&normalize(key))
            .and_then(Binding::live)
            .cloned()
    }

    /// Resolve `key` to a dispatcher. Unknown or removed keys fall back to
    /// `help` and emit [`SessionEvent::UnknownCommand`].
    pub fn get(&self, key: &str) -> Dispatcher {
        if let Some(action) = self.lookup(key) {
            return self.wrap(action);
        }
        warn!(key = %key, "Unknown command");
        self.emit(SessionEvent::UnknownCommand {
            key: key.to_string(),
        });
        let help = self
            .lookup("help")
            .or_else(|| self.inner.fallback.get().cloned())
            .unwrap_or_else(|| Arc::new(NopAction));
        self.wrap(help)
    }

    /// A dispatcher for an action that need not be registered.
    pub fn wrap(&self, action: ActionRef) -> Dispatcher {
        Dispatcher {
            commands: self.clone(),
            action,
        }
    }

    /// Shorthand for `get(key).dispatch()`.
    pub fn dispatch(&self, key: &str) -> Result<Arc<Work>, DispatchError> {
        self.get(key).dispatch()
    }

    // =========================================================================
    // Dispatch protocol
    // =========================================================================

    fn process(&self, action: &ActionRef) -> Result<Arc<Work>, DispatchError> {
        let name = action.name();
        debug!(name = %name, "Dispatch started");
        self.emit(SessionEvent::DispatchStarted { name: name.clone() });

        let work = match action.payload(self.config()) {
            Err(PayloadError::Skip(payload)) => {
                debug!(name = %name, "Execute skipped");
                self.emit(SessionEvent::ExecuteSkipped { name: name.clone() });
                let work = Work::skipped(name.clone(), payload);
                self.inner.queue.record(Arc::clone(&work));
                work
            }
            Err(e) => return Err(e.into()),
            Ok(payload) => {
                let job_action = Arc::clone(action);
                let job_config = self.config().clone();
                let job_payload = payload.clone();
                let work = Work::queued(
                    name.clone(),
                    payload,
                    Box::new(move || job_action.execute(&job_config, job_payload)),
                );
                self.inner.queue.submit(Arc::clone(&work))?;
                work
            }
        };

        if !action.has_tag(DEFAULT_TAG) {
            *self.inner.last.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(Arc::clone(action));
        }

        let commands = self.clone();
        let action = Arc::clone(action);
        let waited = Arc::clone(&work);
        self.inner.runtime.spawn(async move {
            waited.wait().await;
            if waited.success() {
                commands.apply_deltas(action.as_ref());
            }
            debug!(name = %name, work = %waited.id(), status = %waited.status(), "Dispatch finished");
            commands.emit(SessionEvent::DispatchFinished {
                name,
                work_id: waited.id(),
            });
        });

        Ok(work)
    }

    fn apply_deltas(&self, action: &dyn Action) {
        let additions = action.additions(self.config());
        let removals = action.removals();
        if additions.is_empty() && removals.is_empty() {
            return;
        }
        debug!(
            name = %action.name(),
            additions = additions.len(),
            removals = removals.len(),
            "Applying registry deltas"
        );
        for (key, added) in additions {
            self.set(added, [key]);
        }
        self.remove(removals);
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Every key bound to a live action, sorted.
    pub fn known_commands(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, binding)| binding.live().is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    fn live_actions(&self) -> Vec<ActionRef> {
        let bindings = self
            .inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut actions: Vec<ActionRef> = Vec::new();
        for action in bindings.values().filter_map(Binding::live) {
            if !actions.iter().any(|seen| same_action(seen, action)) {
                actions.push(Arc::clone(action));
            }
        }
        actions.sort_by_key(|a| a.name());
        actions
    }

    /// Actions carrying at least one of `tags`. Aliased actions appear once.
    pub fn filter_actions<I, S>(&self, tags: I) -> Vec<ActionRef>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: BTreeSet<String> = tags.into_iter().map(|t| t.as_ref().to_string()).collect();
        self.live_actions()
            .into_iter()
            .filter(|action| action.tags().iter().any(|t| wanted.contains(t)))
            .collect()
    }

    /// Every key bound to the same action as `name`, sorted.
    pub fn aliases(&self, name: &str) -> Vec<String> {
        let Some(target) = self.lookup(name) else {
            return Vec::new();
        };
        let mut keys: Vec<String> = self
            .inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, binding)| binding.live().is_some_and(|a| same_action(a, &target)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// The union of all tags across registered actions, sorted.
    pub fn known_tags(&self) -> Vec<String> {
        let tags: BTreeSet<String> = self
            .live_actions()
            .iter()
            .flat_map(|action| action.tags())
            .collect();
        tags.into_iter().collect()
    }

    /// The most recent work of the action named `name`.
    pub fn latest_result(&self, name: &str) -> Option<Arc<Work>> {
        self.inner.queue.latest(name)
    }

    /// The last dispatched action not tagged `default`.
    pub fn last_action(&self) -> Option<ActionRef> {
        self.inner
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent work of [`Commands::last_action`].
    pub fn last_work(&self) -> Option<Arc<Work>> {
        self.last_action()
            .and_then(|action| self.latest_result(&action.name()))
    }

    // =========================================================================
    // Events and shutdown
    // =========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Stop accepting new work. Queued work still runs.
    pub fn close(&self) {
        self.inner.queue.close();
    }
}

/// A resolved command, ready to dispatch.
#[derive(Clone)]
pub struct Dispatcher {
    commands: Commands,
    action: ActionRef,
}

impl Dispatcher {
    /// Run the dispatch protocol. Returns as soon as the work is queued (or
    /// immediately completed by a skip signal).
    ///
    /// The payload phase runs on the calling thread and may block on
    /// operator input, and submitting blocks while the queue is full, so
    /// async callers should dispatch from a blocking context.
    pub fn dispatch(&self) -> Result<Arc<Work>, DispatchError> {
        self.commands.process(&self.action)
    }

    pub fn action(&self) -> &ActionRef {
        &self.action
    }

    pub fn name(&self) -> String {
        self.action.name()
    }
}
