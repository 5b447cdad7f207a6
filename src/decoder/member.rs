//! Member scopes: implicit members, collection preambles and extension objects.
//!
//! Ein Objekt, das ohne offenen Member in einem Parent auftaucht, bekommt
//! einen impliziten Member. Ist der Member eine Collection, die das Objekt
//! nicht direkt aufnehmen kann, wird ein `GetObject` + `x:Items` Preamble
//! eingeschoben und ueber einen Wrapper-Frame verwaltet.

use std::rc::Rc;

use crate::node::{NodeList, NodeWriter, Value, transform};
use crate::schema::{MemberInfo, MemberKind, MemberRef, TypeInfo, TypeRef, directive};
use crate::{Error, Result};

use super::deferred::KeyPayload;
use super::frame::{CollectionHint, Frame, FrameFlags};
use super::Decoder;

/// Where an incoming object goes relative to the open member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Placement {
    Direct,
    /// `GetObject` + `x:Items` before the object.
    Preamble,
    /// Markup extension in a dictionary: decide after the subtree was read.
    Lookahead,
}

/// Positional argument of a synthesized extension object.
#[derive(Debug, Clone)]
pub(super) enum PositionalArg {
    Text(String),
    Type(TypeRef),
    /// `Owner.Name`
    Static(String),
}

pub(super) fn placement(member: &MemberInfo, hint: CollectionHint, incoming: &TypeInfo) -> Placement {
    if member.kind() == MemberKind::Directive {
        return Placement::Direct;
    }
    if member.is_read_only() {
        return Placement::Preamble;
    }
    let extension = incoming.is_markup_extension();
    if extension {
        let dictionary = hint == CollectionHint::Dictionary
            || member.value_type().is_some_and(|t| t.is_dictionary());
        return if dictionary { Placement::Lookahead } else { Placement::Direct };
    }
    match member.value_type() {
        Some(value_type) if value_type.is_assignable_from(incoming) => Placement::Direct,
        Some(_) => Placement::Preamble,
        None if hint != CollectionHint::None => Placement::Preamble,
        None => Placement::Direct,
    }
}

/// Member content goes to when the frame has none open.
///
/// Reihenfolge: `x:Initialization` fuer Text in create-from-text Objekten,
/// Content-Property (Record vor Typ), `x:Items` fuer Collections und
/// Dictionaries, `x:Initialization` fuer Typen mit Literal-Konvertierung.
pub(super) fn implicit_member(frame: &Frame, for_text: bool) -> Result<MemberRef> {
    if for_text && frame.create_from_text {
        return Ok(MemberInfo::directive(directive::INITIALIZATION));
    }
    if let Some(member) = &frame.content_property {
        return Ok(Rc::clone(member));
    }
    let Some(ty) = &frame.ty else {
        return Err(Error::NoDefaultMember { type_name: frame.type_name() });
    };
    if let Some(name) = ty.content_property() {
        return Ok(MemberInfo::property(Rc::clone(ty), name, MemberKind::Regular));
    }
    if ty.is_collection() || ty.is_dictionary() {
        return Ok(MemberInfo::directive(directive::ITEMS));
    }
    if ty.has_literal_conversion() {
        return Ok(MemberInfo::directive(directive::INITIALIZATION));
    }
    Err(Error::NoDefaultMember { type_name: ty.to_string() })
}

/// True when the root object of `nodes` sets `x:Key` itself.
pub(super) fn has_top_level_key(nodes: &NodeList) -> bool {
    use crate::node::Node;

    let mut depth = 0usize;
    for node in nodes {
        match node {
            Node::StartObject(_) | Node::GetObject => depth += 1,
            Node::EndObject => depth = depth.saturating_sub(1),
            Node::StartMember(m) if depth == 1 && m.is_directive(directive::KEY) => return true,
            _ => {}
        }
    }
    false
}

impl Decoder {
    /// Closes whatever stands between the frame and a new explicit member.
    pub(super) fn prepare_member_slot(&mut self, found: &'static str) -> Result<()> {
        if self.frames.current().is_some_and(Frame::is_wrapper) {
            self.close_wrapper();
        }
        let Some(frame) = self.frames.current_mut() else {
            return Err(Error::structural("object scope", found));
        };
        if let Some(member) = &frame.member {
            if !frame.has_implicit_member() {
                return Err(Error::structural(format!("end of member {member}"), found));
            }
            self.writers.active().end_member();
            frame.member = None;
            frame.flags = FrameFlags::None;
            frame.hint = CollectionHint::None;
        }
        Ok(())
    }

    pub(super) fn open_member(
        &mut self,
        member: MemberRef,
        hint: CollectionHint,
        found: &'static str,
    ) -> Result<()> {
        self.prepare_member_slot(found)?;
        let Some(frame) = self.frames.current_mut() else {
            return Err(Error::structural("object scope", found));
        };
        frame.member = Some(Rc::clone(&member));
        frame.hint = hint;
        frame.member_has_items = false;
        self.writers.active().start_member(member);
        Ok(())
    }

    /// Resolves property `attribute_id` against the owner and opens it.
    pub(super) fn open_property(&mut self, attribute_id: i16, hint: CollectionHint) -> Result<MemberRef> {
        self.prepare_member_slot("property")?;
        let context = self.frames.current().and_then(|f| f.ty.clone());
        let member = self.resolver_mut().resolve_property(attribute_id, context.as_deref())?;
        self.open_member(Rc::clone(&member), hint, "property")?;
        Ok(member)
    }

    /// Ends the explicit member of the current object.
    pub(super) fn close_member(&mut self, found: &'static str) -> Result<()> {
        if self.frames.current().is_some_and(Frame::is_wrapper) {
            self.close_wrapper();
        }
        let Some(frame) = self.frames.current_mut() else {
            return Err(Error::structural("object scope", found));
        };
        if frame.member.is_none() || frame.has_implicit_member() {
            return Err(Error::structural("open member", found));
        }
        self.writers.active().end_member();
        frame.member = None;
        frame.hint = CollectionHint::None;
        Ok(())
    }

    /// Injects an implicit member unless one is open. No-op at document level.
    pub(super) fn ensure_member(&mut self, for_text: bool, found: &'static str) -> Result<()> {
        let Some(frame) = self.frames.current_mut() else {
            return if for_text { Err(Error::structural("object scope", found)) } else { Ok(()) };
        };
        if frame.member.is_some() {
            return Ok(());
        }
        let member = implicit_member(frame, for_text)?;
        log::trace!("implicit member {member} on {}", frame.type_name());
        frame.member = Some(Rc::clone(&member));
        frame.flags = FrameFlags::HasImplicitMember;
        frame.member_has_items = false;
        self.writers.active().start_member(member);
        Ok(())
    }

    /// `GetObject` + `x:Items` over the open member's current value.
    pub(super) fn emit_preamble(&mut self) {
        let value_type = self
            .frames
            .current()
            .and_then(|f| f.member.as_ref())
            .and_then(|m| m.value_type().cloned());
        let items = MemberInfo::directive(directive::ITEMS);
        let out = self.writers.active();
        out.get_object();
        out.start_member(Rc::clone(&items));
        let wrapper = self.frames.push();
        wrapper.ty = value_type;
        wrapper.member = Some(items);
        wrapper.flags = FrameFlags::ImplicitWrapper;
    }

    pub(super) fn close_wrapper(&mut self) {
        let out = self.writers.active();
        out.end_member();
        out.end_object();
        self.frames.pop();
    }

    /// Reads a markup extension bound for a dictionary into a side buffer.
    /// The preamble is emitted only when the extension sets `x:Key` itself.
    pub(super) fn lookahead_extension(&mut self, ty: TypeRef, flags: u8) -> Result<()> {
        let depth = self.frames.depth();
        self.writers.push_writer();
        self.open_object(ty, flags);
        self.run_until_depth(depth)?;
        let buffered = self.writers.pop_writer()?;
        if has_top_level_key(&buffered) {
            self.emit_preamble();
        }
        transform(&buffered, self.writers.active());
        Ok(())
    }

    /// Emits `SO(ext) SM(x:PositionalParameters) <arg> EM EO`.
    pub(super) fn extension_object(&mut self, ext: TypeRef, arg: PositionalArg) {
        let language = self.resolver.borrow().language().clone();
        let out = self.writers.active();
        out.start_object(Rc::clone(&ext));
        out.start_member(MemberInfo::directive(directive::POSITIONAL_PARAMETERS));
        match arg {
            PositionalArg::Text(text) => out.value(Value::Text(text)),
            PositionalArg::Type(ty) if ext.same_type(&language.type_extension) => out.value(Value::Type(ty)),
            PositionalArg::Type(ty) => nested_extension(out, language.type_extension, Value::Type(ty)),
            PositionalArg::Static(name) if ext.same_type(&language.static_extension) => {
                out.value(Value::Text(name));
            }
            PositionalArg::Static(name) => nested_extension(out, language.static_extension, Value::Text(name)),
        }
        out.end_member();
        out.end_object();
    }

    /// Writes the entry key as `x:Key` into the object just opened.
    pub(super) fn flush_pending_key(&mut self) {
        let Some(key) = self.frames.current_mut().and_then(|f| f.pending_key.take()) else {
            return;
        };
        self.writers.active().start_member(MemberInfo::directive(directive::KEY));
        match key {
            KeyPayload::String(text) => self.writers.active().value(Value::Text(text)),
            KeyPayload::Type(ty) => {
                let ext = self.resolver.borrow().language().type_extension.clone();
                self.extension_object(ext, PositionalArg::Type(ty));
            }
            KeyPayload::Nodes(nodes) => transform(nodes.iter(), self.writers.active()),
        }
        self.writers.active().end_member();
    }
}

fn nested_extension(out: &mut NodeList, ext: TypeRef, value: Value) {
    out.start_object(ext);
    out.start_member(MemberInfo::directive(directive::POSITIONAL_PARAMETERS));
    out.value(value);
    out.end_member();
    out.end_object();
}
