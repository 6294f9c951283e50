//! The interactive session loop and the event printer.

use std::sync::Arc;
use std::time::Duration;

use commander_action::{
    watch, ActionBuilder, ActionRef, Commands, ExecuteError, ScanError, Scanner, Value,
};
use commander_core::pretty::banner;
use commander_core::SessionEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Why a session loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The operator dispatched `quit`.
    Quit,
    /// Input reached end of file.
    InputClosed,
}

/// Prompt for commands and dispatch them until `quit` or end of input.
///
/// Blocks the calling thread; run it on a blocking task.
pub fn run(commands: &Commands, scanner: &dyn Scanner, prompt: &str) -> SessionEnd {
    loop {
        let key = match scanner.scan_text(prompt) {
            Ok(key) => key,
            Err(ScanError::Closed) => return SessionEnd::InputClosed,
            Err(e) => {
                warn!(error = %e, "Failed to read command");
                continue;
            }
        };
        if key.is_empty() {
            continue;
        }
        match commands.dispatch(&key) {
            Ok(work) => debug!(work = %work.id(), name = %work.name(), "Dispatched"),
            Err(e) if e.is_quit() => return SessionEnd::Quit,
            Err(e) => println!("error: {}", e),
        }
    }
}

/// Print session events until the registry is gone.
pub async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", render(&event)),
            Err(RecvError::Lagged(missed)) => warn!(missed, "Event printer lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn render(event: &SessionEvent) -> String {
    match event {
        SessionEvent::DispatchStarted { .. } | SessionEvent::DispatchFinished { .. } => {
            banner(&event.to_string())
        }
        SessionEvent::UnknownCommand { .. } => format!("\t{}", event),
        _ => event.to_string(),
    }
}

/// An action that asks for a line of text and shows it back.
pub fn echo(commands: &Commands) -> ActionRef {
    let scanner = commands.scanner();
    let weak = commands.downgrade();
    ActionBuilder::new()
        .name("echo")
        .description("repeat a line of text")
        .payload_fn(move |_| Ok(Value::Text(scanner.scan_text("what should I echo?")?)))
        .execute_text(move |_, text| {
            let commands = weak.upgrade().ok_or(ExecuteError::RegistryUnavailable)?;
            commands.emit(SessionEvent::Output {
                source: "echo".to_string(),
                text: text.clone(),
            });
            Ok(Value::Text(text))
        })
        .tags(["demo"])
        .build()
}

/// Register `echo` and a watch over it. Running `watch-echo` unlocks
/// `stop-echo`.
pub fn register_demo(commands: &Commands, interval: Duration) {
    let echo = echo(commands);
    commands.set(Arc::clone(&echo), Vec::<String>::new());
    commands.set(watch(echo, interval), Vec::<String>::new());
}
