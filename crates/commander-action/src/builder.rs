//! Building and overriding actions one capability at a time.
//!
//! [`ActionBuilder`] holds one function per capability. Starting from
//! [`ActionBuilder::overriding`] every capability delegates to the parent,
//! so replacing one of them leaves the rest of the parent's behavior intact.

use std::collections::BTreeMap;
use std::sync::Arc;

use commander_core::SharedConfig;

use crate::action::{Action, ActionRef, Additions, NopAction};
use crate::error::{ExecuteError, PayloadError};
use crate::payload::{combine_payload, fork_payload, fork_values};
use crate::scan::Scanner;
use crate::value::Value;

type TextFn = Arc<dyn Fn() -> String + Send + Sync>;
type ListFn = Arc<dyn Fn() -> Vec<String> + Send + Sync>;
type AdditionsFn = Arc<dyn Fn(&SharedConfig) -> Additions + Send + Sync>;

/// The payload capability as a standalone function.
pub type PayloadFn = Arc<dyn Fn(&SharedConfig) -> Result<Value, PayloadError> + Send + Sync>;

/// The execute capability as a standalone function.
pub type ExecuteFn =
    Arc<dyn Fn(&SharedConfig, Value) -> Result<Value, ExecuteError> + Send + Sync>;

/// An action under construction. It is itself an [`Action`], so it can be
/// registered directly or frozen with [`ActionBuilder::build`].
#[derive(Clone)]
pub struct ActionBuilder {
    name: TextFn,
    description: TextFn,
    payload: PayloadFn,
    execute: ExecuteFn,
    additions: AdditionsFn,
    removals: ListFn,
    tags: ListFn,
}

impl ActionBuilder {
    /// A builder whose capabilities all do nothing.
    pub fn new() -> Self {
        Self::overriding(Arc::new(NopAction))
    }

    /// A builder delegating every capability to `parent`.
    pub fn overriding(parent: ActionRef) -> Self {
        let name = Arc::clone(&parent);
        let description = Arc::clone(&parent);
        let payload = Arc::clone(&parent);
        let execute = Arc::clone(&parent);
        let additions = Arc::clone(&parent);
        let removals = Arc::clone(&parent);
        let tags = parent;
        Self {
            name: Arc::new(move || name.name()),
            description: Arc::new(move || description.description()),
            payload: Arc::new(move |c: &SharedConfig| payload.payload(c)),
            execute: Arc::new(move |c: &SharedConfig, p: Value| execute.execute(c, p)),
            additions: Arc::new(move |c: &SharedConfig| additions.additions(c)),
            removals: Arc::new(move || removals.removals()),
            tags: Arc::new(move || tags.tags()),
        }
    }

    /// Freeze into a shareable action handle.
    pub fn build(self) -> ActionRef {
        Arc::new(self)
    }

    // -------------------------------------------------------------------------
    // Name and description
    // -------------------------------------------------------------------------

    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = Arc::new(move || name.clone());
        self
    }

    pub fn name_fn(mut self, f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.name = Arc::new(f);
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let inner = self.name;
        self.name = Arc::new(move || format!("{}{}", prefix, inner()));
        self
    }

    pub fn name_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        let inner = self.name;
        self.name = Arc::new(move || format!("{}{}", inner(), suffix));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = Arc::new(move || description.clone());
        self
    }

    // -------------------------------------------------------------------------
    // Payload
    // -------------------------------------------------------------------------

    pub fn payload_fn(
        mut self,
        f: impl Fn(&SharedConfig) -> Result<Value, PayloadError> + Send + Sync + 'static,
    ) -> Self {
        self.payload = Arc::new(f);
        self
    }

    pub fn payload(mut self, payload: PayloadFn) -> Self {
        self.payload = payload;
        self
    }

    /// Always produce `value`.
    pub fn payload_value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.payload_fn(move |_| Ok(value.clone()))
    }

    /// Always produce the given outcome; an error becomes [`PayloadError::Failed`].
    pub fn payload_result(self, result: Result<Value, String>) -> Self {
        self.payload_fn(move |_| result.clone().map_err(PayloadError::Failed))
    }

    /// Always return the skip signal carrying `value`.
    pub fn payload_skip(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.payload_fn(move |_| Err(PayloadError::Skip(value.clone())))
    }

    /// Always return the quit signal.
    pub fn payload_quit(self) -> Self {
        self.payload_fn(|_| Err(PayloadError::Quit))
    }

    /// Ask the operator to pick one of `options` and use its payload.
    pub fn fork_payload(
        mut self,
        scanner: Arc<dyn Scanner>,
        options: BTreeMap<String, PayloadFn>,
    ) -> Self {
        self.payload = fork_payload(scanner, options);
        self
    }

    /// Ask the operator to pick one of `options` and use its value.
    pub fn fork_values(
        mut self,
        scanner: Arc<dyn Scanner>,
        options: BTreeMap<String, Value>,
    ) -> Self {
        self.payload = fork_values(scanner, options);
        self
    }

    /// Run every option and collect results (or error values) by key.
    pub fn combine_payload(mut self, options: BTreeMap<String, PayloadFn>) -> Self {
        self.payload = combine_payload(options);
        self
    }

    // -------------------------------------------------------------------------
    // Execute
    // -------------------------------------------------------------------------

    pub fn execute_fn(
        mut self,
        f: impl Fn(&SharedConfig, Value) -> Result<Value, ExecuteError> + Send + Sync + 'static,
    ) -> Self {
        self.execute = Arc::new(f);
        self
    }

    pub fn execute(mut self, execute: ExecuteFn) -> Self {
        self.execute = execute;
        self
    }

    /// Always return `result`, ignoring the payload.
    pub fn execute_value(self, result: impl Into<Value>) -> Self {
        let result = result.into();
        self.execute_fn(move |_, _| Ok(result.clone()))
    }

    /// Execute over a text payload.
    pub fn execute_text(
        self,
        f: impl Fn(&SharedConfig, String) -> Result<Value, ExecuteError> + Send + Sync + 'static,
    ) -> Self {
        self.execute_fn(move |c, p| f(c, p.into_text()?))
    }

    /// Execute over an integer payload. Decimal text is accepted.
    pub fn execute_integer(
        self,
        f: impl Fn(&SharedConfig, i64) -> Result<Value, ExecuteError> + Send + Sync + 'static,
    ) -> Self {
        self.execute_fn(move |c, p| f(c, p.as_integer()?))
    }

    /// Execute over a mapping payload.
    pub fn execute_mapping(
        self,
        f: impl Fn(&SharedConfig, BTreeMap<String, Value>) -> Result<Value, ExecuteError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.execute_fn(move |c, p| f(c, p.into_mapping()?))
    }

    /// Execute over a sequence payload.
    pub fn execute_sequence(
        self,
        f: impl Fn(&SharedConfig, Vec<Value>) -> Result<Value, ExecuteError> + Send + Sync + 'static,
    ) -> Self {
        self.execute_fn(move |c, p| f(c, p.into_sequence()?))
    }

    /// Execute for actions that take no payload.
    pub fn execute_none(
        self,
        f: impl Fn(&SharedConfig) -> Result<Value, ExecuteError> + Send + Sync + 'static,
    ) -> Self {
        self.execute_fn(move |c, p| {
            p.expect_none()?;
            f(c)
        })
    }

    /// Run the current execute, then feed its result to `next`.
    pub fn execute_then(
        self,
        next: impl Fn(&SharedConfig, Value) -> Result<Value, ExecuteError> + Send + Sync + 'static,
    ) -> Self {
        let first = Arc::clone(&self.execute);
        self.execute_fn(move |c, p| {
            let intermediate = first(c, p)?;
            next(c, intermediate)
        })
    }

    // -------------------------------------------------------------------------
    // Registry deltas and tags
    // -------------------------------------------------------------------------

    pub fn additions(mut self, additions: Additions) -> Self {
        self.additions = Arc::new(move |_: &SharedConfig| additions.clone());
        self
    }

    pub fn additions_fn(
        mut self,
        f: impl Fn(&SharedConfig) -> Additions + Send + Sync + 'static,
    ) -> Self {
        self.additions = Arc::new(f);
        self
    }

    pub fn removals<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        self.removals = Arc::new(move || keys.clone());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.tags = Arc::new(move || tags.clone());
        self
    }

    pub fn tags_fn(mut self, f: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        self.tags = Arc::new(f);
        self
    }
}

impl Default for ActionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Action for ActionBuilder {
    fn name(&self) -> String {
        (self.name)()
    }

    fn description(&self) -> String {
        (self.description)()
    }

    fn payload(&self, config: &SharedConfig) -> Result<Value, PayloadError> {
        (self.payload)(config)
    }

    fn execute(&self, config: &SharedConfig, payload: Value) -> Result<Value, ExecuteError> {
        (self.execute)(config, payload)
    }

    fn additions(&self, config: &SharedConfig) -> Additions {
        (self.additions)(config)
    }

    fn removals(&self) -> Vec<String> {
        (self.removals)()
    }

    fn tags(&self) -> Vec<String> {
        (self.tags)()
    }
}
