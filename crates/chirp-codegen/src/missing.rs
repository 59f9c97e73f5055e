//! [`MissingReferenceHandler`] – how the host answers for missing documents.
//!
//! When a sequence references an expression or sequence file that does not
//! exist, the compiler stops and asks the host.  An editor shows a dialog; a
//! command-line host applies a fixed policy or prompts on the terminal.
//!
//! Three ready-made handlers exist:
//!
//! - any `FnMut(&str, &str) -> Decision` closure,
//! - a bare [`Decision`], which answers the same way every time,
//! - [`ScriptedResponses`], which replays a queue of answers and records
//!   every question it was asked.

use std::collections::VecDeque;

use chirp_types::Decision;

/// Decides whether compilation continues past a missing reference.
pub trait MissingReferenceHandler {
    /// `referenced` is the file name as written in the document;
    /// `enclosing` names the sequence that references it.
    fn on_missing(&mut self, referenced: &str, enclosing: &str) -> Decision;
}

impl<F> MissingReferenceHandler for F
where
    F: FnMut(&str, &str) -> Decision,
{
    fn on_missing(&mut self, referenced: &str, enclosing: &str) -> Decision {
        self(referenced, enclosing)
    }
}

impl MissingReferenceHandler for Decision {
    fn on_missing(&mut self, _referenced: &str, _enclosing: &str) -> Decision {
        *self
    }
}

/// Replays queued answers in order, then falls back to a fixed answer.
#[derive(Debug, Clone)]
pub struct ScriptedResponses {
    responses: VecDeque<Decision>,
    fallback: Decision,
    asked: Vec<(String, String)>,
}

impl ScriptedResponses {
    pub fn new(responses: impl IntoIterator<Item = Decision>, fallback: Decision) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            fallback,
            asked: Vec::new(),
        }
    }

    /// Every `(referenced, enclosing)` pair asked so far.
    pub fn asked(&self) -> &[(String, String)] {
        &self.asked
    }
}

impl MissingReferenceHandler for ScriptedResponses {
    fn on_missing(&mut self, referenced: &str, enclosing: &str) -> Decision {
        self.asked
            .push((referenced.to_string(), enclosing.to_string()));
        self.responses.pop_front().unwrap_or(self.fallback)
    }
}
