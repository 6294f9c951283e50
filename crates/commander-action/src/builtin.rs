//! Built-in session commands.
//!
//! Every built-in is tagged `default`, so none of them replaces the
//! registry's "last action". They hold a [`WeakCommands`] so the registry
//! can own them without a reference cycle, and they report through
//! [`SessionEvent::Output`] as well as their work result.

use std::sync::Arc;

use commander_core::error::CommanderError;
use commander_core::pretty::pretty;
use commander_core::{paths, SessionConfig, SessionEvent};

use crate::action::{ActionRef, DEFAULT_TAG};
use crate::builder::ActionBuilder;
use crate::error::{ExecuteError, PayloadError};
use crate::registry::{Commands, WeakCommands};
use crate::scan::Scanner;
use crate::value::Value;

fn registry(weak: &WeakCommands) -> Result<Commands, ExecuteError> {
    weak.upgrade().ok_or(ExecuteError::RegistryUnavailable)
}

/// Emit `text` as output of `source` and return it as a result value.
fn say(commands: &Commands, source: &str, text: String) -> Value {
    commands.emit(SessionEvent::Output {
        source: source.to_string(),
        text: text.clone(),
    });
    Value::Text(text)
}

fn bulleted<I, S>(header: &str, items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = header.to_string();
    for item in items {
        text.push_str("\n\t");
        text.push_str(item.as_ref());
    }
    text
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ExecuteError> {
    let json = serde_json::to_value(value).map_err(CommanderError::from)?;
    Ok(Value::from(json))
}

/// Register every built-in on `commands`.
pub(crate) fn install(commands: &Commands) {
    let weak = commands.downgrade();
    let scanner = commands.scanner();

    let help = help(weak.clone());
    commands.set_fallback(Arc::clone(&help));
    let builtins = [
        help,
        load(Arc::clone(&scanner)),
        save(Arc::clone(&scanner)),
        print_config(weak.clone()),
        tags(weak.clone()),
        last(weak.clone()),
        lookup(weak.clone(), Arc::clone(&scanner)),
        filter(weak.clone(), Arc::clone(&scanner)),
        aliases(weak, scanner),
        quit(),
    ];
    for action in builtins {
        commands.set(action, Vec::<String>::new());
    }
}

/// Lists the known commands.
pub fn help(weak: WeakCommands) -> ActionRef {
    ActionBuilder::new()
        .name("help")
        .description("list the known commands")
        .execute_none(move |_| {
            let commands = registry(&weak)?;
            let text = bulleted("please type a command:", commands.known_commands());
            Ok(say(&commands, "help", text))
        })
        .tags([DEFAULT_TAG, "help"])
        .build()
}

/// Replaces the session config with a JSON file.
pub fn load(scanner: Arc<dyn Scanner>) -> ActionRef {
    ActionBuilder::new()
        .name("load")
        .description("load the session config from a file")
        .payload_fn(move |_| Ok(Value::Text(scanner.scan_text("load file")?)))
        .execute_text(|config, raw| {
            let path = paths::normalize(&raw)?;
            let mut loaded = SessionConfig::load(&path)?;
            let shown = path.display().to_string();
            if loaded.file.is_none() {
                loaded.file = Some(shown.clone());
            }
            config.replace(loaded);
            Ok(Value::Text(shown))
        })
        .tags(["load", DEFAULT_TAG])
        .build()
}

/// Writes the session config to a file, defaulting to its `file` field.
pub fn save(scanner: Arc<dyn Scanner>) -> ActionRef {
    ActionBuilder::new()
        .name("save")
        .description("save the session config to a file")
        .payload_fn(move |config| {
            let current = config.read(|c| c.file.clone());
            let prompt = format!(
                "type save path, or leave empty for default.\n({})",
                current.as_deref().unwrap_or("")
            );
            let answer = scanner.scan_text(&prompt)?;
            match (answer.is_empty(), current) {
                (false, _) => Ok(Value::Text(answer)),
                (true, Some(file)) => Ok(Value::Text(file)),
                (true, None) => Err(PayloadError::Failed(
                    "no save path given and the config has no default file".to_string(),
                )),
            }
        })
        .execute_text(|config, raw| {
            let path = paths::normalize(&raw)?;
            let shown = path.display().to_string();
            let snapshot = config.update(|c| {
                c.file = Some(shown.clone());
                c.clone()
            });
            snapshot.save(&path)?;
            Ok(Value::Text(shown))
        })
        .tags(["save", DEFAULT_TAG])
        .build()
}

/// Shows the session config.
pub fn print_config(weak: WeakCommands) -> ActionRef {
    ActionBuilder::new()
        .name("print-config")
        .description("show the session config")
        .execute_none(move |config| {
            let commands = registry(&weak)?;
            let json = config.read(SessionConfig::to_json);
            say(&commands, "print-config", pretty(&json));
            Ok(Value::from(json))
        })
        .tags([DEFAULT_TAG])
        .build()
}

/// Lists every tag in use.
pub fn tags(weak: WeakCommands) -> ActionRef {
    ActionBuilder::new()
        .name("tags")
        .description("list the known tags")
        .execute_none(move |_| {
            let commands = registry(&weak)?;
            let known = commands.known_tags();
            say(&commands, "tags", bulleted("Known Tags:", &known));
            Ok(Value::Sequence(known.into_iter().map(Value::Text).collect()))
        })
        .tags([DEFAULT_TAG])
        .build()
}

/// Shows the latest work of the last non-default action. Skips when no
/// such action was dispatched yet.
pub fn last(weak: WeakCommands) -> ActionRef {
    let payload_weak = weak.clone();
    ActionBuilder::new()
        .name("last")
        .description("show the result of the last action")
        .payload_fn(move |_| {
            let commands = payload_weak
                .upgrade()
                .ok_or(PayloadError::RegistryUnavailable)?;
            if commands.last_action().is_none() {
                return Err(PayloadError::Skip(Value::None));
            }
            match commands.last_work() {
                Some(work) => {
                    let json = serde_json::to_value(work.snapshot()).map_err(CommanderError::from)?;
                    Ok(Value::from(json))
                }
                None => Ok(Value::None),
            }
        })
        .execute_fn(move |_, payload| {
            let commands = registry(&weak)?;
            say(&commands, "last", pretty(&payload));
            Ok(payload)
        })
        .tags([DEFAULT_TAG])
        .build()
}

/// Shows the latest work of a named action.
pub fn lookup(weak: WeakCommands, scanner: Arc<dyn Scanner>) -> ActionRef {
    ActionBuilder::new()
        .name("lookup")
        .description("show the latest result of a command")
        .payload_fn(move |_| {
            Ok(Value::Text(
                scanner.scan_text("lookup last result to which command?")?,
            ))
        })
        .execute_text(move |_, key| {
            let commands = registry(&weak)?;
            // Keys are matched like command input; the cache is keyed by
            // action name.
            let name = commands
                .lookup(&key)
                .map(|action| action.name())
                .unwrap_or(key);
            let Some(work) = commands.latest_result(&name) else {
                say(&commands, "lookup", format!("no result for {}", name));
                return Ok(Value::None);
            };
            let result = to_value(&work.snapshot())?;
            say(&commands, "lookup", format!("result to {}:\n{}", name, pretty(&result)));
            Ok(result)
        })
        .tags([DEFAULT_TAG])
        .build()
}

/// Lists the actions carrying any of the given tags.
pub fn filter(weak: WeakCommands, scanner: Arc<dyn Scanner>) -> ActionRef {
    ActionBuilder::new()
        .name("filter")
        .description("list commands by tag")
        .payload_fn(move |_| {
            let answer = scanner.scan_text("enter tags to filter by separated by space:")?;
            Ok(Value::Sequence(
                answer.split_whitespace().map(Value::from).collect(),
            ))
        })
        .execute_sequence(move |_, tags| {
            let commands = registry(&weak)?;
            let tags = tags
                .into_iter()
                .map(Value::into_text)
                .collect::<Result<Vec<String>, _>>()?;
            let names: Vec<String> = commands
                .filter_actions(&tags)
                .iter()
                .map(|a| a.name())
                .collect();
            let header = format!("actions in tag group [{}]:", tags.join(", "));
            say(&commands, "filter", bulleted(&header, &names));
            Ok(Value::Sequence(names.into_iter().map(Value::Text).collect()))
        })
        .tags([DEFAULT_TAG])
        .build()
}

/// Lists every key bound to the same action as a given key.
pub fn aliases(weak: WeakCommands, scanner: Arc<dyn Scanner>) -> ActionRef {
    ActionBuilder::new()
        .name("aliases")
        .description("list the keys bound to a command")
        .payload_fn(move |_| Ok(Value::Text(scanner.scan_text("alias to which command?")?)))
        .execute_text(move |_, name| {
            let commands = registry(&weak)?;
            let keys = commands.aliases(&name);
            let header = format!("commands aliased to {}:", name);
            say(&commands, "aliases", bulleted(&header, &keys));
            Ok(Value::Sequence(keys.into_iter().map(Value::Text).collect()))
        })
        .tags([DEFAULT_TAG])
        .build()
}

/// Ends the session. The payload returns the quit signal, so this never
/// produces work.
pub fn quit() -> ActionRef {
    ActionBuilder::new()
        .name("quit")
        .description("end the session")
        .payload_quit()
        .tags([DEFAULT_TAG])
        .build()
}
