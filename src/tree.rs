/// Typed tree for the notes parts of a WordprocessingML package.
///
/// A notes part is a single namespace-qualified root element
/// (`<w:footnotes>` or `<w:endnotes>`) holding an ordered sequence of note
/// elements. [`NotesRoot`] is the in-memory form of that tree: it owns the
/// children in document order and knows how to rebuild itself from part
/// bytes and how to serialize back, re-emitting the XML declaration and the
/// namespace declaration the bare root element would otherwise lose.
///
/// Note bodies are kept as raw inner XML, byte-equivalent to the input, so
/// content the model does not interpret (tables, drawings, revision marks)
/// survives a read/commit cycle untouched.
use crate::error::{PartError, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

/// The WordprocessingML main namespace.
pub const WML_NAMESPACE: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Which notes part a tree belongs to.
///
/// Footnotes and endnotes share one schema shape; the kind only selects
/// element names and the part's content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    /// `/word/footnotes.xml`
    Footnote,
    /// `/word/endnotes.xml`
    Endnote,
}

impl NoteKind {
    /// Local name of the root element (`footnotes` / `endnotes`).
    #[inline]
    pub fn root_tag(&self) -> &'static [u8] {
        match self {
            Self::Footnote => b"footnotes",
            Self::Endnote => b"endnotes",
        }
    }

    /// Local name of one note element (`footnote` / `endnote`).
    #[inline]
    pub fn note_tag(&self) -> &'static [u8] {
        match self {
            Self::Footnote => b"footnote",
            Self::Endnote => b"endnote",
        }
    }

    /// Content type of the part in the package manifest.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Footnote => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.footnotes+xml"
            },
            Self::Endnote => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.endnotes+xml"
            },
        }
    }

    /// Default partname inside the package.
    pub fn default_partname(&self) -> &'static str {
        match self {
            Self::Footnote => "/word/footnotes.xml",
            Self::Endnote => "/word/endnotes.xml",
        }
    }

    fn root_open(&self) -> &'static str {
        match self {
            Self::Footnote => {
                r#"<w:footnotes xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#
            },
            Self::Endnote => {
                r#"<w:endnotes xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#
            },
        }
    }

    fn root_close(&self) -> &'static str {
        match self {
            Self::Footnote => "</w:footnotes>",
            Self::Endnote => "</w:endnotes>",
        }
    }

    fn qualified_note_tag(&self) -> &'static str {
        match self {
            Self::Footnote => "w:footnote",
            Self::Endnote => "w:endnote",
        }
    }
}

/// The `w:type` attribute of a note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteType {
    /// Normal note with content (no `w:type` attribute on the wire)
    #[default]
    Normal,
    /// Separator note (visual separator)
    Separator,
    /// Continuation separator
    ContinuationSeparator,
    /// Continuation notice
    ContinuationNotice,
}

impl NoteType {
    /// Parse note type from the XML attribute value.
    pub fn from_xml(s: &str) -> Self {
        match s {
            "separator" => Self::Separator,
            "continuationSeparator" => Self::ContinuationSeparator,
            "continuationNotice" => Self::ContinuationNotice,
            _ => Self::Normal,
        }
    }

    /// Attribute value on the wire; `None` for `Normal`, which is implied.
    pub fn as_xml(&self) -> Option<&'static str> {
        match self {
            Self::Normal => None,
            Self::Separator => Some("separator"),
            Self::ContinuationSeparator => Some("continuationSeparator"),
            Self::ContinuationNotice => Some("continuationNotice"),
        }
    }

    /// Check if this is a normal content note (not a separator).
    #[inline]
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }
}

/// One note element: identifier, type, and the raw inner XML of its body.
///
/// Identifiers are not unique by schema; separator notes conventionally use
/// -1 and 0, content notes positive values. A detached `NoteNode` owns its
/// body; once pushed into a [`NotesRoot`] the root owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteNode {
    id: i64,
    note_type: NoteType,
    body_xml: Vec<u8>,
}

impl NoteNode {
    /// Create a note with an empty body.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            note_type: NoteType::Normal,
            body_xml: Vec::new(),
        }
    }

    /// Create a note from raw body XML (the content between the note's
    /// opening and closing tags).
    pub fn with_body(id: i64, body_xml: Vec<u8>) -> Self {
        Self {
            id,
            note_type: NoteType::Normal,
            body_xml,
        }
    }

    /// Get the note identifier (`w:id`).
    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Set the note identifier.
    pub fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    /// Get the note type.
    #[inline]
    pub fn note_type(&self) -> NoteType {
        self.note_type
    }

    /// Set the note type.
    pub fn set_note_type(&mut self, note_type: NoteType) {
        self.note_type = note_type;
    }

    /// Raw inner XML of the note body.
    #[inline]
    pub fn body_xml(&self) -> &[u8] {
        &self.body_xml
    }

    /// Replace the note body with raw inner XML.
    pub fn set_body_xml(&mut self, body_xml: Vec<u8>) {
        self.body_xml = body_xml;
    }

    pub(crate) fn body_xml_mut(&mut self) -> &mut Vec<u8> {
        &mut self.body_xml
    }

    fn write_to(&self, out: &mut Vec<u8>, kind: NoteKind) {
        let mut idbuf = itoa::Buffer::new();
        out.push(b'<');
        out.extend_from_slice(kind.qualified_note_tag().as_bytes());
        if let Some(t) = self.note_type.as_xml() {
            out.extend_from_slice(b" w:type=\"");
            out.extend_from_slice(t.as_bytes());
            out.push(b'"');
        }
        out.extend_from_slice(b" w:id=\"");
        out.extend_from_slice(idbuf.format(self.id).as_bytes());
        out.push(b'"');
        if self.body_xml.is_empty() {
            out.extend_from_slice(b"/>");
        } else {
            out.push(b'>');
            out.extend_from_slice(&self.body_xml);
            out.extend_from_slice(b"</");
            out.extend_from_slice(kind.qualified_note_tag().as_bytes());
            out.push(b'>');
        }
    }
}

/// Root tree of one notes part: the ordered note children in document order.
#[derive(Debug, Clone)]
pub struct NotesRoot {
    kind: NoteKind,
    children: Vec<NoteNode>,
}

impl NotesRoot {
    /// Create an empty root for a new part.
    pub fn new(kind: NoteKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    /// Which notes part this tree belongs to.
    #[inline]
    pub fn kind(&self) -> NoteKind {
        self.kind
    }

    /// The note children, in document order.
    #[inline]
    pub fn children(&self) -> &[NoteNode] {
        &self.children
    }

    pub(crate) fn child_mut(&mut self, index: usize) -> Option<&mut NoteNode> {
        self.children.get_mut(index)
    }

    /// Append a child, returning its index in document order.
    pub fn push(&mut self, node: NoteNode) -> usize {
        self.children.push(node);
        self.children.len() - 1
    }

    /// Parse a whole part from its serialized bytes.
    ///
    /// The root element's local name must match `kind`; anything else is
    /// corrupt content, as is a note without a `w:id` attribute or a
    /// top-level element that is not a note. Each note's inner XML is
    /// captured verbatim-equivalent (text and attribute values stay in
    /// their escaped wire form).
    pub fn parse(kind: NoteKind, bytes: &[u8]) -> Result<Self> {
        // No text trimming: note bodies must survive byte-equivalent, and
        // text outside a note is dropped by the `in_note` guard anyway.
        let mut reader = Reader::from_reader(bytes);

        let note_tag = kind.note_tag();
        let mut children = Vec::new();
        let mut saw_root = false;
        let mut in_note = false;
        let mut depth = 0;
        let mut current_id: Option<i64> = None;
        let mut current_type = NoteType::Normal;
        let mut current_body = Vec::with_capacity(4096);
        let mut buf = Vec::with_capacity(1024);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    if !saw_root {
                        if e.local_name().as_ref() != kind.root_tag() {
                            return Err(corrupt_root(kind, e.local_name().as_ref()));
                        }
                        saw_root = true;
                    } else if !in_note {
                        if e.local_name().as_ref() != note_tag {
                            return Err(unexpected_child(e.local_name().as_ref()));
                        }
                        in_note = true;
                        depth = 1;
                        current_body.clear();
                        let (id, note_type) = note_attrs(&e)?;
                        current_id = id;
                        current_type = note_type;
                    } else {
                        depth += 1;
                        write_open_tag(&mut current_body, &e, false);
                    }
                },
                Ok(Event::End(e)) => {
                    if in_note {
                        if e.local_name().as_ref() == note_tag && depth == 1 {
                            children.push(finish_note(
                                current_id.take(),
                                current_type,
                                std::mem::take(&mut current_body),
                            )?);
                            in_note = false;
                        } else {
                            depth -= 1;
                            current_body.extend_from_slice(b"</");
                            current_body.extend_from_slice(e.name().as_ref());
                            current_body.push(b'>');
                        }
                    }
                },
                Ok(Event::Empty(e)) => {
                    if !saw_root {
                        // An empty `<w:footnotes/>` root is legal
                        if e.local_name().as_ref() != kind.root_tag() {
                            return Err(corrupt_root(kind, e.local_name().as_ref()));
                        }
                        break;
                    } else if !in_note {
                        if e.local_name().as_ref() != note_tag {
                            return Err(unexpected_child(e.local_name().as_ref()));
                        }
                        let (id, note_type) = note_attrs(&e)?;
                        children.push(finish_note(id, note_type, Vec::new())?);
                    } else {
                        write_open_tag(&mut current_body, &e, true);
                    }
                },
                Ok(Event::Text(e)) if in_note => {
                    current_body.extend_from_slice(e.as_ref());
                },
                Ok(Event::CData(e)) if in_note => {
                    current_body.extend_from_slice(b"<![CDATA[");
                    current_body.extend_from_slice(e.as_ref());
                    current_body.extend_from_slice(b"]]>");
                },
                // Entity and character references come through as their own
                // events; write them back in wire form
                Ok(Event::GeneralRef(e)) if in_note => {
                    current_body.push(b'&');
                    current_body.extend_from_slice(&e);
                    current_body.push(b';');
                },
                Ok(Event::Comment(e)) if in_note => {
                    current_body.extend_from_slice(b"<!--");
                    current_body.extend_from_slice(e.as_ref());
                    current_body.extend_from_slice(b"-->");
                },
                Ok(Event::PI(e)) if in_note => {
                    current_body.extend_from_slice(b"<?");
                    current_body.extend_from_slice(&e);
                    current_body.extend_from_slice(b"?>");
                },
                Ok(Event::Eof) => {
                    if !saw_root {
                        return Err(PartError::CorruptContent(
                            "no root element found".to_string(),
                        ));
                    }
                    break;
                },
                Err(e) => {
                    return Err(PartError::CorruptContent(format!(
                        "XML error at offset {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(Self { kind, children })
    }

    /// Serialize the tree back to part bytes.
    ///
    /// Emits the XML declaration and the namespace-qualified root element;
    /// the in-memory root is a bare element, so the framing that makes the
    /// part re-openable is added here. Output is deterministic for a given
    /// tree.
    pub fn to_bytes(&self) -> Vec<u8> {
        let body_len: usize = self.children.iter().map(|n| n.body_xml.len() + 64).sum();
        let mut out = Vec::with_capacity(XML_DECL.len() + body_len + 128);
        out.extend_from_slice(XML_DECL.as_bytes());
        out.extend_from_slice(self.kind.root_open().as_bytes());
        for note in &self.children {
            note.write_to(&mut out, self.kind);
        }
        out.extend_from_slice(self.kind.root_close().as_bytes());
        out
    }
}

fn corrupt_root(kind: NoteKind, got: &[u8]) -> PartError {
    PartError::CorruptContent(format!(
        "expected <w:{}> root, got <{}>",
        String::from_utf8_lossy(kind.root_tag()),
        String::from_utf8_lossy(got)
    ))
}

fn unexpected_child(got: &[u8]) -> PartError {
    PartError::CorruptContent(format!(
        "unexpected element <{}> in notes part",
        String::from_utf8_lossy(got)
    ))
}

/// Read `w:id` and `w:type` from a note element's attributes.
fn note_attrs(e: &quick_xml::events::BytesStart<'_>) -> Result<(Option<i64>, NoteType)> {
    let mut id = None;
    let mut note_type = NoteType::Normal;
    for attr in e.attributes().flatten() {
        match attr.key.local_name().as_ref() {
            b"id" => {
                id = atoi_simd::parse::<i64>(&attr.value).ok();
                if id.is_none() {
                    return Err(PartError::CorruptContent(format!(
                        "invalid note id: {}",
                        String::from_utf8_lossy(&attr.value)
                    )));
                }
            },
            b"type" => {
                let type_str = String::from_utf8_lossy(&attr.value);
                note_type = NoteType::from_xml(&type_str);
            },
            _ => {},
        }
    }
    Ok((id, note_type))
}

fn finish_note(id: Option<i64>, note_type: NoteType, body: Vec<u8>) -> Result<NoteNode> {
    let id = id.ok_or_else(|| PartError::CorruptContent("note without w:id".to_string()))?;
    let mut node = NoteNode::with_body(id, body);
    node.set_note_type(note_type);
    Ok(node)
}

/// Reconstruct an element's opening tag (or empty-element tag) into the raw
/// body buffer. Attribute values are written in their escaped wire form.
fn write_open_tag(out: &mut Vec<u8>, e: &quick_xml::events::BytesStart<'_>, empty: bool) {
    out.push(b'<');
    out.extend_from_slice(e.name().as_ref());
    for attr in e.attributes().flatten() {
        out.push(b' ');
        out.extend_from_slice(attr.key.as_ref());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(&attr.value);
        out.push(b'"');
    }
    if empty {
        out.extend_from_slice(b"/>");
    } else {
        out.push(b'>');
    }
}
