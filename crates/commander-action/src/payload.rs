//! Payload combinators.
//!
//! These build a [`PayloadFn`] out of other payload functions: pick one
//! interactively, run all of them, or chain them into a single value.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use commander_core::SharedConfig;

use crate::builder::PayloadFn;
use crate::error::PayloadError;
use crate::scan::Scanner;
use crate::value::Value;

/// How many times a fork asks before giving up.
pub const FORK_ATTEMPTS: usize = 3;

/// Call `f` up to `times` times (at least once), returning the first success
/// or the last error.
pub fn retry<T, E>(times: usize, f: impl FnMut(usize) -> Result<T, E>) -> Result<T, E> {
    retry_if(times, f, |_| true)
}

/// Like [`retry`], but stops early on errors `retryable` rejects.
pub fn retry_if<T, E>(
    times: usize,
    mut f: impl FnMut(usize) -> Result<T, E>,
    retryable: impl Fn(&E) -> bool,
) -> Result<T, E> {
    let times = times.max(1);
    let mut attempt = 1;
    loop {
        match f(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt < times && retryable(&e) => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

fn fork_prompt<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    let mut prompt = String::from("please pick between:");
    for key in keys {
        prompt.push_str("\n\t");
        prompt.push_str(key);
    }
    prompt
}

fn pick<'a, T>(
    scanner: &dyn Scanner,
    options: &'a BTreeMap<String, T>,
) -> Result<&'a T, PayloadError> {
    let prompt = fork_prompt(options.keys());
    retry_if(
        FORK_ATTEMPTS,
        |attempt| {
            let choice = scanner.scan_text(&prompt)?;
            options.get(&choice).ok_or(PayloadError::InvalidChoice {
                choice,
                attempts: attempt,
            })
        },
        |e| matches!(e, PayloadError::InvalidChoice { .. }),
    )
}

/// Ask the operator to choose one of `options`, then run its payload.
///
/// An unknown choice is asked again, up to [`FORK_ATTEMPTS`] times.
pub fn fork_payload(scanner: Arc<dyn Scanner>, options: BTreeMap<String, PayloadFn>) -> PayloadFn {
    Arc::new(move |config: &SharedConfig| {
        let chosen = pick(scanner.as_ref(), &options)?;
        chosen(config)
    })
}

/// Ask the operator to choose one of `options` and return its value.
pub fn fork_values(scanner: Arc<dyn Scanner>, options: BTreeMap<String, Value>) -> PayloadFn {
    Arc::new(move |_: &SharedConfig| pick(scanner.as_ref(), &options).cloned())
}

/// Run every option and collect the results into one mapping.
///
/// A failing option contributes [`Value::Error`] under its key; the
/// combined payload itself never fails.
pub fn combine_payload(options: BTreeMap<String, PayloadFn>) -> PayloadFn {
    Arc::new(move |config: &SharedConfig| {
        let combined = options
            .iter()
            .map(|(key, payload)| {
                let value = payload(config).unwrap_or_else(|e| {
                    debug!(option = %key, error = %e, "Combined payload option failed");
                    Value::Error(e.to_string())
                });
                (key.clone(), value)
            })
            .collect();
        Ok(Value::Mapping(combined))
    })
}

/// Run `first` then each of `rest`, concatenating results into a sequence.
/// Sequence results are flattened. Any error aborts.
pub fn chain_sequence(first: PayloadFn, rest: Vec<PayloadFn>) -> PayloadFn {
    Arc::new(move |config: &SharedConfig| {
        let mut items = Vec::new();
        for payload in std::iter::once(&first).chain(rest.iter()) {
            match payload(config)? {
                Value::Sequence(more) => items.extend(more),
                other => items.push(other),
            }
        }
        Ok(Value::Sequence(items))
    })
}

/// Run `first` then each of `rest`, merging mapping results. Later keys
/// win. A non-mapping result is stored under `""` for `first` and under
/// its position (starting at 1) for the rest. Any error aborts.
pub fn chain_mapping(first: PayloadFn, rest: Vec<PayloadFn>) -> PayloadFn {
    Arc::new(move |config: &SharedConfig| {
        let mut merged = BTreeMap::new();
        for (i, payload) in std::iter::once(&first).chain(rest.iter()).enumerate() {
            match payload(config)? {
                Value::Mapping(map) => merged.extend(map),
                other => {
                    let key = if i == 0 { String::new() } else { i.to_string() };
                    merged.insert(key, other);
                }
            }
        }
        Ok(Value::Mapping(merged))
    })
}
