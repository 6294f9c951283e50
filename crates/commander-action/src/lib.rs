//! Action framework for interactive command sessions.
//!
//! Actions gather a payload synchronously, then execute on a single
//! background worker. The [`Commands`] registry resolves operator input to
//! actions, runs the dispatch protocol, and applies each action's registry
//! changes once its work succeeds.

pub mod action;
pub mod builder;
pub mod builtin;
pub mod derived;
pub mod error;
pub mod payload;
pub mod queue;
pub mod registry;
pub mod scan;
pub mod value;
pub mod work;

pub use action::{same_action, Action, ActionRef, Additions, NopAction, DEFAULT_TAG};
pub use builder::{ActionBuilder, ExecuteFn, PayloadFn};
pub use derived::{print_action, rename, trigger, watch, StopHandle, WatchAction};
pub use error::{DispatchError, ExecuteError, PayloadError, RegistryError, ShapeMismatch, WorkError};
pub use payload::{chain_mapping, chain_sequence, combine_payload, fork_payload, fork_values, retry};
pub use registry::{Commands, Dispatcher, WeakCommands};
pub use scan::{ask_all, Question, ScanError, ScanHint, Scanner, ScriptedScanner, StdinScanner};
pub use value::{Shape, Value};
pub use work::{Work, WorkSnapshot, WorkStatus};
