//! Streaming template tokenizer
//!
//! Walks the XML event stream of one resource and emits `TemplateToken`s in
//! document order. Closing behavior is driven by an explicit stack of
//! end-tag actions so that inert wrappers (`container`, `body`) never emit
//! an `EndElement` while real elements always do.

use std::collections::HashSet;
use std::mem;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

use crate::template::ComponentTemplate;
use crate::token::{Location, TemplateToken, TokenKind};
use crate::{ParseError, TemplateResource, TEMPLATE_NS};

/// What to do when the end tag of an open element arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndTagAction {
    /// Emit an `EndElement` token.
    EmitEnd,
    /// Emit nothing (transparent wrapper or discarded body content).
    Ignore,
    /// Leave the body placeholder; emits nothing.
    CloseBody,
}

/// Attributes of one start tag, split into component metadata and ordinary
/// markup attributes.
#[derive(Debug, Default)]
struct ScannedAttributes {
    id: Option<String>,
    component_type: Option<String>,
    mixins: Option<String>,
    ordinary: Vec<(String, String)>,
}

/// Reusable, single-threaded template tokenizer.
///
/// Every `parse` call starts from fully reset state, including after an
/// error return, so one instance can tokenize any number of resources in
/// sequence.
#[derive(Debug, Default)]
pub struct TemplateParser {
    tokens: Vec<TemplateToken>,
    component_ids: HashSet<String>,
    text_buffer: String,
    text_location: Option<Location>,
    end_actions: Vec<EndTagAction>,
    in_body: bool,
    body_logged: bool,
    resource: Option<Arc<str>>,
    lines: LineIndex,
}

impl TemplateParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenize one resource into a `ComponentTemplate`.
    pub fn parse(
        &mut self,
        resource: &dyn TemplateResource,
    ) -> Result<ComponentTemplate, ParseError> {
        self.reset();

        let identity: Arc<str> = Arc::from(resource.identity());
        let source = resource.read().map_err(|source| ParseError::Resource {
            identity: identity.to_string(),
            source,
        })?;

        tracing::debug!(resource = %identity, "tokenizing template");

        self.resource = Some(identity.clone());
        self.lines = LineIndex::new(&source);

        let mut reader = NsReader::from_str(&source);
        reader.config_mut().expand_empty_elements = true;

        loop {
            let pos = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
            let (ns, event) = match reader.read_resolved_event() {
                Ok(pair) => pair,
                Err(source) => {
                    return Err(ParseError::Xml {
                        location: self.location(pos),
                        source,
                    })
                }
            };
            let framework =
                matches!(&ns, ResolveResult::Bound(Namespace(n)) if *n == TEMPLATE_NS.as_bytes());

            match event {
                Event::Start(e) => self.start_element(&reader, framework, &e, pos)?,
                Event::Empty(e) => {
                    // Unreachable while expand_empty_elements is set, but a
                    // self-closing tag is just a start immediately closed.
                    self.start_element(&reader, framework, &e, pos)?;
                    self.end_element();
                }
                Event::End(_) => self.end_element(),
                Event::Text(t) => {
                    let content = t.unescape().map_err(|source| ParseError::Xml {
                        location: self.location(pos),
                        source,
                    })?;
                    self.text(&content, pos);
                }
                Event::CData(c) => {
                    let content = String::from_utf8_lossy(&c).into_owned();
                    self.cdata(content, pos);
                }
                Event::Comment(c) => {
                    let content = String::from_utf8_lossy(&c).into_owned();
                    self.comment(&content, pos);
                }
                Event::DocType(d) => {
                    let content = String::from_utf8_lossy(&d).into_owned();
                    self.doctype(&content, pos);
                }
                Event::Decl(_) | Event::PI(_) => {}
                Event::Eof => break,
            }
        }

        self.flush_text();

        let template = ComponentTemplate::new(
            identity,
            mem::take(&mut self.tokens),
            mem::take(&mut self.component_ids),
        );
        tracing::debug!(
            resource = template.resource(),
            tokens = template.tokens().len(),
            "template tokenized"
        );
        Ok(template)
    }

    fn reset(&mut self) {
        self.tokens.clear();
        self.component_ids.clear();
        self.text_buffer.clear();
        self.text_location = None;
        self.end_actions.clear();
        self.in_body = false;
        self.body_logged = false;
        self.resource = None;
        self.lines = LineIndex::default();
    }

    fn location(&self, offset: usize) -> Location {
        let resource = self
            .resource
            .clone()
            .unwrap_or_else(|| Arc::from("<unset>"));
        self.lines.location(resource, offset)
    }

    fn emit(&mut self, kind: TokenKind, offset: usize) {
        let location = self.location(offset);
        self.tokens.push(TemplateToken::new(kind, Some(location)));
    }

    // --- character content -------------------------------------------------

    fn text(&mut self, content: &str, pos: usize) {
        if self.in_body {
            if !content.trim().is_empty() {
                self.note_body_content(pos);
            }
            return;
        }
        if self.text_buffer.is_empty() {
            self.text_location = Some(self.location(pos));
        }
        self.text_buffer.push_str(content);
    }

    fn cdata(&mut self, content: String, pos: usize) {
        if self.in_body {
            self.note_body_content(pos);
            return;
        }
        self.flush_text();
        self.emit(TokenKind::Cdata { content }, pos);
    }

    fn comment(&mut self, content: &str, pos: usize) {
        if self.in_body {
            return;
        }
        self.flush_text();
        // DOM-style comment nodes conventionally pad with one space on each
        // side; strip exactly that pad.
        let content = content.strip_prefix(' ').unwrap_or(content);
        let content = content.strip_suffix(' ').unwrap_or(content);
        self.emit(
            TokenKind::Comment {
                content: content.to_string(),
            },
            pos,
        );
    }

    fn doctype(&mut self, content: &str, pos: usize) {
        self.flush_text();
        let (name, public_id, system_id) = parse_doctype(content);
        self.emit(
            TokenKind::Dtd {
                name,
                public_id,
                system_id,
            },
            pos,
        );
    }

    /// Drain the coalesced text buffer, splitting out `${...}` expansions.
    ///
    /// The scan is non-greedy: each `${` closes at the *first* following
    /// `}`, so two expansions on one line never merge. An unterminated
    /// marker stays literal text.
    fn flush_text(&mut self) {
        if self.text_buffer.is_empty() {
            return;
        }
        let text = mem::take(&mut self.text_buffer);
        let location = self.text_location.take();

        let mut rest = text.as_str();
        loop {
            let Some(start) = rest.find("${") else {
                break;
            };
            let Some(close) = rest[start + 2..].find('}') else {
                break;
            };
            let prefix = &rest[..start];
            if !prefix.is_empty() {
                self.tokens.push(TemplateToken::new(
                    TokenKind::Text {
                        content: prefix.to_string(),
                    },
                    location.clone(),
                ));
            }
            let expression = rest[start + 2..start + 2 + close].trim().to_string();
            self.tokens.push(TemplateToken::new(
                TokenKind::Expansion { expression },
                location.clone(),
            ));
            rest = &rest[start + 2 + close + 1..];
        }
        if !rest.is_empty() {
            self.tokens.push(TemplateToken::new(
                TokenKind::Text {
                    content: rest.to_string(),
                },
                location,
            ));
        }
    }

    // --- elements ----------------------------------------------------------

    fn start_element<R>(
        &mut self,
        reader: &NsReader<R>,
        framework: bool,
        e: &BytesStart<'_>,
        pos: usize,
    ) -> Result<(), ParseError> {
        if self.in_body {
            self.note_body_content(pos);
            self.end_actions.push(EndTagAction::Ignore);
            return Ok(());
        }

        let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

        if framework {
            return self.start_framework_element(reader, &local, e, pos);
        }

        self.flush_text();
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let attrs = self.scan_attributes(reader, e, false, pos)?;

        if attrs.id.is_some() || attrs.component_type.is_some() {
            if let Some(id) = &attrs.id {
                self.component_ids.insert(id.clone());
            }
            self.emit(
                TokenKind::StartComponent {
                    element_name: Some(name),
                    id: attrs.id,
                    component_type: attrs.component_type,
                    mixins: attrs.mixins,
                },
                pos,
            );
        } else if attrs.mixins.is_some() {
            return Err(ParseError::MixinsRequireIdOrType {
                location: self.location(pos),
            });
        } else {
            self.emit(TokenKind::StartElement { name }, pos);
        }

        self.emit_attributes(attrs.ordinary, pos);
        self.end_actions.push(EndTagAction::EmitEnd);
        Ok(())
    }

    fn start_framework_element<R>(
        &mut self,
        reader: &NsReader<R>,
        local: &str,
        e: &BytesStart<'_>,
        pos: usize,
    ) -> Result<(), ParseError> {
        if local.eq_ignore_ascii_case("body") {
            self.flush_text();
            self.emit(TokenKind::Body, pos);
            self.in_body = true;
            self.body_logged = false;
            self.end_actions.push(EndTagAction::CloseBody);
            return Ok(());
        }

        if local.eq_ignore_ascii_case("container") {
            self.flush_text();
            self.end_actions.push(EndTagAction::Ignore);
            return Ok(());
        }

        if local.eq_ignore_ascii_case("block") {
            self.flush_text();
            let attrs = self.scan_attributes(reader, e, true, pos)?;
            self.emit(TokenKind::Block { id: attrs.id }, pos);
            self.end_actions.push(EndTagAction::EmitEnd);
            return Ok(());
        }

        if local.eq_ignore_ascii_case("parameter") {
            self.flush_text();
            let attrs = self.scan_attributes(reader, e, true, pos)?;
            let name = attrs
                .ordinary
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("name"))
                .and_then(|(_, value)| non_blank(value));
            let Some(name) = name else {
                return Err(ParseError::MissingParameterName {
                    location: self.location(pos),
                });
            };
            self.emit(TokenKind::Parameter { name }, pos);
            self.end_actions.push(EndTagAction::EmitEnd);
            return Ok(());
        }

        // Any other namespaced element names a component type; dots in the
        // local name become slashes, reassembled into a dotted name
        // downstream.
        self.flush_text();
        let attrs = self.scan_attributes(reader, e, true, pos)?;
        if attrs.component_type.is_some() {
            return Err(ParseError::UnexpectedTypeAttribute {
                location: self.location(pos),
            });
        }
        if let Some(id) = &attrs.id {
            self.component_ids.insert(id.clone());
        }
        self.emit(
            TokenKind::StartComponent {
                element_name: None,
                id: attrs.id,
                component_type: Some(local.replace('.', "/")),
                mixins: attrs.mixins,
            },
            pos,
        );
        self.emit_attributes(attrs.ordinary, pos);
        self.end_actions.push(EndTagAction::EmitEnd);
        Ok(())
    }

    fn end_element(&mut self) {
        match self.end_actions.pop() {
            Some(EndTagAction::EmitEnd) => {
                self.flush_text();
                self.tokens
                    .push(TemplateToken::new(TokenKind::EndElement, None));
            }
            Some(EndTagAction::Ignore) => {
                if !self.in_body {
                    self.flush_text();
                }
            }
            Some(EndTagAction::CloseBody) => {
                self.in_body = false;
            }
            // The markup parser rejects unbalanced end tags before we see
            // them.
            None => debug_assert!(false, "end tag with no open element"),
        }
    }

    fn emit_attributes(&mut self, ordinary: Vec<(String, String)>, pos: usize) {
        for (name, value) in ordinary {
            self.emit(TokenKind::Attribute { name, value }, pos);
        }
    }

    fn scan_attributes<R>(
        &self,
        reader: &NsReader<R>,
        e: &BytesStart<'_>,
        framework_element: bool,
        pos: usize,
    ) -> Result<ScannedAttributes, ParseError> {
        let mut scanned = ScannedAttributes::default();

        for attr in e.attributes() {
            let attr = attr.map_err(|source| ParseError::Xml {
                location: self.location(pos),
                source: quick_xml::Error::from(source),
            })?;

            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }

            let (ns, local_name) = reader.resolve_attribute(attr.key);
            let in_template_ns =
                matches!(&ns, ResolveResult::Bound(Namespace(n)) if *n == TEMPLATE_NS.as_bytes());
            let unqualified = matches!(&ns, ResolveResult::Unbound);

            let local = String::from_utf8_lossy(local_name.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|source| ParseError::Xml {
                    location: self.location(pos),
                    source,
                })?
                .into_owned();

            // Reserved metadata keys are recognized in the template
            // namespace anywhere, and unqualified on framework elements.
            let metadata = in_template_ns || (framework_element && unqualified);
            if metadata && local.eq_ignore_ascii_case("id") {
                scanned.id = non_blank(&value);
            } else if metadata && local.eq_ignore_ascii_case("type") {
                scanned.component_type = non_blank(&value);
            } else if metadata && local.eq_ignore_ascii_case("mixins") {
                scanned.mixins = non_blank(&value);
            } else {
                let name = if in_template_ns {
                    local
                } else {
                    String::from_utf8_lossy(attr.key.as_ref()).into_owned()
                };
                scanned.ordinary.push((name, value));
            }
        }

        Ok(scanned)
    }

    fn note_body_content(&mut self, pos: usize) {
        if self.body_logged {
            return;
        }
        self.body_logged = true;
        tracing::warn!(
            location = %self.location(pos),
            "content inside a body placeholder does not render and is discarded"
        );
    }
}

/// Blank attribute values normalize to absent.
fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split a doctype declaration into name / PUBLIC id / SYSTEM id.
fn parse_doctype(content: &str) -> (String, Option<String>, Option<String>) {
    let content = content.trim();
    let name_end = content
        .find(char::is_whitespace)
        .unwrap_or(content.len());
    let name = content[..name_end].to_string();
    let rest = content[name_end..].trim_start();

    if rest.len() >= 6 && rest[..6].eq_ignore_ascii_case("PUBLIC") {
        let rest = &rest[6..];
        if let Some((public_id, rest)) = take_quoted(rest) {
            let system_id = take_quoted(rest).map(|(id, _)| id);
            return (name, Some(public_id), system_id);
        }
    } else if rest.len() >= 6 && rest[..6].eq_ignore_ascii_case("SYSTEM") {
        let system_id = take_quoted(&rest[6..]).map(|(id, _)| id);
        return (name, None, system_id);
    }
    (name, None, None)
}

fn take_quoted(s: &str) -> Option<(String, &str)> {
    let s = s.trim_start();
    let mut chars = s.chars();
    let quote = chars.next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &s[1..];
    let end = rest.find(quote)?;
    Some((rest[..end].to_string(), &rest[end + 1..]))
}

/// Byte-offset to line/column translation for one source string.
#[derive(Debug, Default)]
struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self { line_starts }
    }

    fn location(&self, resource: Arc<str>, offset: usize) -> Location {
        if self.line_starts.is_empty() {
            return Location::new(resource, 1, 1);
        }
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let column = offset - self.line_starts[line - 1] + 1;
        Location::new(resource, line, column)
    }
}
