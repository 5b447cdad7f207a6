//! Output redirection.
//!
//! Handlers never write to a fixed sink; they write to whatever sink is
//! active. Capturing a subtree (key values, static resources, templates,
//! lookahead) pushes a fresh buffer, decodes into it and pops it again. The
//! stack is an arena of [`NodeList`]s: index 0 is the main output, the last
//! element is the active sink.

use crate::node::NodeList;
use crate::{Error, Result};

#[derive(Debug)]
pub struct WriterStack {
    sinks: Vec<NodeList>,
}

impl Default for WriterStack {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterStack {
    pub fn new() -> Self {
        Self { sinks: vec![NodeList::new()] }
    }

    /// Number of side buffers currently pushed.
    pub fn depth(&self) -> usize {
        self.sinks.len() - 1
    }

    pub fn is_redirected(&self) -> bool {
        self.sinks.len() > 1
    }

    /// Redirects output into a new side buffer.
    pub fn push_writer(&mut self) {
        self.sinks.push(NodeList::new());
    }

    /// Ends the innermost redirection and returns what was captured.
    pub fn pop_writer(&mut self) -> Result<NodeList> {
        if self.sinks.len() == 1 {
            return Err(Error::structural("redirected output", "main sink"));
        }
        self.sinks.pop().ok_or_else(|| Error::structural("redirected output", "no sink"))
    }

    /// The sink handlers write to.
    pub fn active(&mut self) -> &mut NodeList {
        let last = self.sinks.len() - 1;
        &mut self.sinks[last]
    }

    /// The main output, regardless of redirection.
    pub fn main(&mut self) -> &mut NodeList {
        &mut self.sinks[0]
    }

    pub fn main_ref(&self) -> &NodeList {
        &self.sinks[0]
    }

    /// Drops every side buffer. Used after a fatal error.
    pub fn unwind(&mut self) {
        self.sinks.truncate(1);
    }
}
