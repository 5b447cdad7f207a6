//! Scope stack.
//!
//! Ein Frame pro offenem Objekt. Frames werden nicht freigegeben sondern in
//! einen Pool zurueckgelegt und beim naechsten `push` zurueckgesetzt.

use crate::node::NamespaceDecl;
use crate::schema::{MemberRef, TypeRef};

use super::deferred::KeyPayload;

/// How the frame came to be and whether its open member was synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFlags {
    #[default]
    None,
    /// Frame of a synthesized `GetObject` + `x:Items` preamble.
    ImplicitWrapper,
    /// The open member was injected and has to be closed implicitly.
    HasImplicitMember,
}

/// What the record that opened the current member says about its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionHint {
    #[default]
    None,
    /// `PropertyIListStart` / `PropertyArrayStart`
    List,
    /// `PropertyIDictionaryStart`
    Dictionary,
}

#[derive(Debug, Default)]
pub struct Frame {
    /// `None` only for wrapper frames over a member without value type.
    pub ty: Option<TypeRef>,
    pub member: Option<MemberRef>,
    pub hint: CollectionHint,
    /// The open member already received an object.
    pub member_has_items: bool,
    pub namespaces: Vec<NamespaceDecl>,
    pub flags: FrameFlags,
    /// Vom Parent geerbt.
    pub freeze: bool,
    /// Override from a `ContentProperty` record.
    pub content_property: Option<MemberRef>,
    /// Emitted as `x:ConnectionId` right before the object ends.
    pub connection_id: Option<i32>,
    /// Key of a deferred entry, emitted right after the object starts.
    pub pending_key: Option<KeyPayload>,
    /// Element was flagged to be created from the text that follows.
    pub create_from_text: bool,
    /// A deferred region was read inside this object.
    pub deferred: bool,
}

impl Frame {
    fn reset(&mut self) {
        self.ty = None;
        self.member = None;
        self.hint = CollectionHint::None;
        self.member_has_items = false;
        self.namespaces.clear();
        self.flags = FrameFlags::None;
        self.freeze = false;
        self.content_property = None;
        self.connection_id = None;
        self.pending_key = None;
        self.create_from_text = false;
        self.deferred = false;
    }

    pub fn is_wrapper(&self) -> bool {
        self.flags == FrameFlags::ImplicitWrapper
    }

    pub fn has_implicit_member(&self) -> bool {
        self.flags == FrameFlags::HasImplicitMember
    }

    pub fn type_name(&self) -> String {
        self.ty.as_ref().map(|t| t.to_string()).unwrap_or_else(|| "<unknown>".into())
    }
}

#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
    pool: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Opens a new scope. The immutability flag is inherited from the parent.
    pub fn push(&mut self) -> &mut Frame {
        let freeze = self.frames.last().is_some_and(|f| f.freeze);
        let mut frame = self.pool.pop().unwrap_or_default();
        frame.freeze = freeze;
        self.frames.push(frame);
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Closes the innermost scope; returns false when none was open.
    pub fn pop(&mut self) -> bool {
        match self.frames.pop() {
            Some(mut frame) => {
                frame.reset();
                self.pool.push(frame);
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// The frame below the current one.
    pub fn previous(&self) -> Option<&Frame> {
        let n = self.frames.len();
        if n < 2 { None } else { self.frames.get(n - 2) }
    }

    /// Namespace bound to `prefix` in the innermost scope that binds it.
    pub fn lookup_namespace(&self, prefix: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .flat_map(|f| f.namespaces.iter())
            .find(|ns| ns.prefix == prefix)
            .map(|ns| ns.namespace.as_str())
    }

    pub fn pooled(&self) -> usize {
        self.pool.len()
    }
}
