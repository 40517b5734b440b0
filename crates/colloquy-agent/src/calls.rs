//! Tool-call reconstruction — reassembles streamed fragments into complete,
//! executable calls.
//!
//! The endpoint streams each call in pieces: the first fragment for a slot
//! carries the call id and function name, later fragments append argument
//! text. Fragments for different slots interleave freely; a `CallSet` drains
//! the fragment sequence exactly once and exposes the completed calls in
//! slot order.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::mpsc;

use colloquy_core::types::CallRef;
use colloquy_providers::traits::{CallFragment, ClientError};

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

/// A malformed fragment sequence. These are endpoint contract violations and
/// fail the round rather than being silently dropped.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReassemblyError {
    #[error("call slot {slot} ended without a function name")]
    MissingName { slot: usize },
    #[error("call slot {slot} ended without a call id")]
    MissingId { slot: usize },
    #[error("call slot {slot} received conflicting {field}: '{first}' then '{second}'")]
    Conflict {
        slot: usize,
        field: &'static str,
        first: String,
        second: String,
    },
}

/// Malformed argument text on one specific call.
#[derive(Debug, thiserror::Error)]
#[error("call {id} ({name}): malformed arguments: {detail}")]
pub struct ArgumentError {
    pub id: String,
    pub name: String,
    pub detail: String,
}

// ─────────────────────────────────────────────
// CallSet
// ─────────────────────────────────────────────

#[derive(Default)]
struct Slot {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// The completed tool calls of one round, in ascending slot order.
///
/// Built by draining the fragment sequence once; reads after that never
/// touch the stream again.
#[derive(Debug, Clone, Default)]
pub struct CallSet {
    calls: Vec<CallRef>,
}

impl CallSet {
    /// Drain the demultiplexed fragment queue and assemble the call set.
    ///
    /// A transport error surfaced on the queue aborts reassembly.
    pub async fn collect(
        mut rx: mpsc::UnboundedReceiver<Result<Vec<CallFragment>, ClientError>>,
    ) -> anyhow::Result<CallSet> {
        let mut groups = Vec::new();
        while let Some(item) = rx.recv().await {
            groups.push(item?);
        }
        Ok(Self::assemble(groups)?)
    }

    /// Assemble a call set from fragment groups in emission order.
    pub fn assemble(
        groups: impl IntoIterator<Item = Vec<CallFragment>>,
    ) -> Result<CallSet, ReassemblyError> {
        let mut slots: BTreeMap<usize, Slot> = BTreeMap::new();

        for group in groups {
            for fragment in group {
                let slot = slots.entry(fragment.slot).or_default();
                if let Some(id) = fragment.id {
                    check_once(fragment.slot, "call id", &mut slot.id, id)?;
                }
                if let Some(name) = fragment.name {
                    check_once(fragment.slot, "function name", &mut slot.name, name)?;
                }
                if let Some(chunk) = fragment.arguments {
                    slot.arguments.push_str(&chunk);
                }
            }
        }

        let mut calls = Vec::with_capacity(slots.len());
        for (index, slot) in slots {
            let name = slot.name.ok_or(ReassemblyError::MissingName { slot: index })?;
            let id = slot.id.ok_or(ReassemblyError::MissingId { slot: index })?;
            calls.push(CallRef::new(id, name, slot.arguments));
        }
        Ok(CallSet { calls })
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Iterate completed calls in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &CallRef> {
        self.calls.iter()
    }

    /// The call set as an owned list, for attaching to an assistant message.
    pub fn to_vec(&self) -> Vec<CallRef> {
        self.calls.clone()
    }
}

/// Establish a once-only field, tolerating byte-identical repeats (some
/// endpoints resend the id on every fragment) but rejecting conflicts.
fn check_once(
    slot: usize,
    field: &'static str,
    current: &mut Option<String>,
    incoming: String,
) -> Result<(), ReassemblyError> {
    match current {
        None => {
            *current = Some(incoming);
            Ok(())
        }
        Some(existing) if *existing == incoming => Ok(()),
        Some(existing) => Err(ReassemblyError::Conflict {
            slot,
            field,
            first: existing.clone(),
            second: incoming,
        }),
    }
}

// ─────────────────────────────────────────────
// Argument parsing
// ─────────────────────────────────────────────

/// Parse a call's argument text into named values.
///
/// Parsed lazily, on first use per call. JSON is tried first; YAML (a JSON
/// superset) is the fallback for the sloppy payloads some models emit. A
/// failure is attributed to this call only.
pub fn parse_arguments(
    call: &CallRef,
) -> Result<HashMap<String, serde_json::Value>, ArgumentError> {
    let text = call.arguments().trim();
    if text.is_empty() {
        return Ok(HashMap::new());
    }

    let json_err = match serde_json::from_str(text) {
        Ok(parsed) => return Ok(parsed),
        Err(e) => e,
    };
    match serde_yaml::from_str(text) {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(ArgumentError {
            id: call.id.clone(),
            name: call.name().to_string(),
            detail: json_err.to_string(),
        }),
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
