/// Collection part for footnotes and endnotes.
///
/// [`NotesPart`] looks after the collection of notes for one part of the
/// document: it owns the part's [`NotesRoot`] tree and an ordered entry list
/// kept in lockstep with the root's children. Callers reach individual notes
/// through borrowed [`Note`] / [`NoteMut`] handles; a handle stores an index
/// into the backing store, never a raw alias, so mutation through a handle
/// and serialization through the root always see the same node.
///
/// # Example
///
/// ```
/// use wmlpart::{NoteKind, NotesPart, PartLifecycle};
///
/// let mut part = NotesPart::new(NoteKind::Footnote);
/// part.add_note_with_text(1, "First footnote");
/// part.add_note_with_text(2, "Second footnote");
///
/// assert_eq!(part.note_by_id(2).unwrap().text()?, "Second footnote");
///
/// let mut bytes = Vec::new();
/// part.on_commit(&mut bytes)?;
///
/// let mut reopened = NotesPart::new(NoteKind::Footnote);
/// reopened.on_read(&mut bytes.as_slice())?;
/// assert_eq!(reopened.len(), 2);
/// # Ok::<(), wmlpart::PartError>(())
/// ```
use crate::error::{PartError, Result};
use crate::part::PartLifecycle;
use crate::tree::{NoteKind, NoteNode, NoteType, NotesRoot};
use crate::xmlutil::{escape_xml, unescape_xml};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Read, Write};

/// One entry in the collection's list: which root child it projects.
///
/// With no removal operation the projection is currently the identity, but
/// the list is what the lookup and order semantics are defined over, and it
/// is what `set_notes` rebuilds when the backing tree is swapped.
#[derive(Debug, Clone, Copy)]
struct Entry {
    node: usize,
}

/// The notes collection part.
///
/// Constructed either empty, for a brand-new document whose entries are
/// populated through the add operations, or populated from an existing
/// package part via [`PartLifecycle::on_read`].
#[derive(Debug)]
pub struct NotesPart {
    root: NotesRoot,
    entries: Vec<Entry>,
    /// Partname of the owning document part, when known. An identifier
    /// rather than a reference: the part may be built before its document.
    document: Option<String>,
}

impl NotesPart {
    /// Create an empty part for a new document.
    pub fn new(kind: NoteKind) -> Self {
        Self {
            root: NotesRoot::new(kind),
            entries: Vec::new(),
            document: None,
        }
    }

    /// Which notes part this is.
    #[inline]
    pub fn kind(&self) -> NoteKind {
        self.root.kind()
    }

    /// Number of notes in the part.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the part has no notes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read view over all notes, in document order.
    pub fn notes(&self) -> impl ExactSizeIterator<Item = Note<'_>> {
        (0..self.entries.len()).map(move |idx| Note { part: self, idx })
    }

    /// Get the note at `index` in document order.
    pub fn note(&self, index: usize) -> Option<Note<'_>> {
        (index < self.entries.len()).then_some(Note { part: self, idx: index })
    }

    /// Get a mutable handle to the note at `index` in document order.
    pub fn note_mut(&mut self, index: usize) -> Option<NoteMut<'_>> {
        (index < self.entries.len()).then_some(NoteMut { part: self, idx: index })
    }

    /// Get the first note whose identifier equals `id`, in document order.
    ///
    /// Identifiers are not unique; duplicates resolve to the first
    /// occurrence. A miss is `None`, never an error.
    pub fn note_by_id(&self, id: i64) -> Option<Note<'_>> {
        let idx = self.position_of_id(id)?;
        Some(Note { part: self, idx })
    }

    /// Mutable variant of [`note_by_id`](Self::note_by_id).
    pub fn note_by_id_mut(&mut self, id: i64) -> Option<NoteMut<'_>> {
        let idx = self.position_of_id(id)?;
        Some(NoteMut { part: self, idx })
    }

    fn position_of_id(&self, id: i64) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| self.root.children()[entry.node].id() == id)
    }

    /// Add a note to the part.
    ///
    /// The node is moved into the root and a handle bound to the newly
    /// owned child is returned, so mutation through the handle is visible
    /// on the next commit. To copy a note out of another part, clone its
    /// node explicitly: `part.add_note(other.node().clone())`.
    pub fn add_note(&mut self, node: NoteNode) -> NoteMut<'_> {
        let node_idx = self.root.push(node);
        self.entries.push(Entry { node: node_idx });
        let idx = self.entries.len() - 1;
        NoteMut { part: self, idx }
    }

    /// Add a note with a single paragraph of text.
    pub fn add_note_with_text(&mut self, id: i64, text: &str) -> NoteMut<'_> {
        let mut handle = self.add_note(NoteNode::new(id));
        handle.append_paragraph(text);
        handle
    }

    /// Replace the backing tree wholesale.
    ///
    /// The entry list is rebuilt from the new root's children, so the order
    /// invariant holds whether or not entries already existed. The new root
    /// must be of the same kind as this part.
    pub fn set_notes(&mut self, root: NotesRoot) -> Result<()> {
        if root.kind() != self.root.kind() {
            return Err(PartError::InvalidFormat(format!(
                "cannot back a {:?} part with a {:?} tree",
                self.root.kind(),
                root.kind()
            )));
        }
        self.root = root;
        self.rebuild_entries();
        Ok(())
    }

    /// The backing tree.
    #[inline]
    pub fn root(&self) -> &NotesRoot {
        &self.root
    }

    /// Partname of the owning document part, if set.
    pub fn document_part(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Associate this part with its owning document part.
    pub fn set_document_part(&mut self, partname: impl Into<String>) {
        self.document = Some(partname.into());
    }

    fn rebuild_entries(&mut self) {
        self.entries = (0..self.root.children().len())
            .map(|node| Entry { node })
            .collect();
    }
}

impl PartLifecycle for NotesPart {
    /// Populate the part from its serialized bytes.
    ///
    /// The stream is read to the end, then parsed; entries are rebuilt from
    /// the parsed children in document order. Nothing is installed until the
    /// parse succeeds, so a corrupt part never leaves partial content
    /// behind.
    fn on_read(&mut self, stream: &mut dyn Read) -> Result<()> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        let root = NotesRoot::parse(self.root.kind(), &bytes)?;
        self.root = root;
        self.rebuild_entries();
        Ok(())
    }

    /// Serialize the current tree to the stream.
    ///
    /// Serializes from the root, so every mutation made through handles or
    /// add operations is reflected. The byte buffer is built first; a write
    /// failure leaves the in-memory model untouched.
    fn on_commit(&self, stream: &mut dyn Write) -> Result<()> {
        let bytes = self.root.to_bytes();
        stream.write_all(&bytes)?;
        stream.flush()?;
        Ok(())
    }
}

/// Read handle to one note.
///
/// A thin projection over one child of the part's root: the identifier and
/// type are read through the node on every call, never cached, and the
/// handle holds no serialization logic of its own.
#[derive(Clone, Copy)]
pub struct Note<'a> {
    part: &'a NotesPart,
    idx: usize,
}

impl<'a> Note<'a> {
    /// The note identifier (`w:id`).
    pub fn id(&self) -> i64 {
        self.node().id()
    }

    /// The note type.
    pub fn note_type(&self) -> NoteType {
        self.node().note_type()
    }

    /// Position of this note in the part, in document order.
    #[inline]
    pub fn index(&self) -> usize {
        self.idx
    }

    /// The underlying tree node.
    pub fn node(&self) -> &'a NoteNode {
        let entry = self.part.entries[self.idx];
        &self.part.root.children()[entry.node]
    }

    /// Raw inner XML of the note body.
    pub fn body_xml(&self) -> &'a [u8] {
        self.node().body_xml()
    }

    /// Extract the concatenated text content of the note body.
    pub fn text(&self) -> Result<String> {
        let body = self.body_xml();
        let mut reader = Reader::from_reader(body);
        reader.config_mut().trim_text(true);

        let mut result = String::with_capacity(body.len() / 8);
        let mut in_text = false;
        let mut buf = Vec::with_capacity(512);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    if e.local_name().as_ref() == b"t" {
                        in_text = true;
                    }
                },
                Ok(Event::Text(e)) if in_text => {
                    let text = std::str::from_utf8(e.as_ref())
                        .map_err(|err| PartError::Xml(err.to_string()))?;
                    result.push_str(text);
                },
                // References are separate events; re-spell them so the final
                // unescape pass resolves the standard five and leaves the
                // rest (numeric, unknown) in textual form
                Ok(Event::GeneralRef(e)) if in_text => {
                    let name = std::str::from_utf8(&e)
                        .map_err(|err| PartError::Xml(err.to_string()))?;
                    result.push('&');
                    result.push_str(name);
                    result.push(';');
                },
                Ok(Event::End(e)) => {
                    if e.local_name().as_ref() == b"t" {
                        in_text = false;
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(PartError::Xml(e.to_string())),
                _ => {},
            }
            buf.clear();
        }

        Ok(unescape_xml(&result))
    }
}

impl std::fmt::Debug for Note<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Note")
            .field("id", &self.id())
            .field("note_type", &self.note_type())
            .field("index", &self.idx)
            .finish()
    }
}

/// Write handle to one note.
///
/// Mutations go straight to the node owned by the part's root, so they are
/// visible through the root and on the next commit.
pub struct NoteMut<'a> {
    part: &'a mut NotesPart,
    idx: usize,
}

impl<'a> NoteMut<'a> {
    /// The note identifier (`w:id`).
    pub fn id(&self) -> i64 {
        self.as_note().id()
    }

    /// Position of this note in the part, in document order.
    #[inline]
    pub fn index(&self) -> usize {
        self.idx
    }

    /// Reborrow as a read handle.
    pub fn as_note(&self) -> Note<'_> {
        Note {
            part: self.part,
            idx: self.idx,
        }
    }

    /// Extract the concatenated text content of the note body.
    pub fn text(&self) -> Result<String> {
        self.as_note().text()
    }

    /// Set the note identifier.
    pub fn set_id(&mut self, id: i64) {
        self.node_mut().set_id(id);
    }

    /// Set the note type.
    pub fn set_note_type(&mut self, note_type: NoteType) {
        self.node_mut().set_note_type(note_type);
    }

    /// Replace the note body with raw inner XML.
    pub fn set_body_xml(&mut self, body_xml: Vec<u8>) {
        self.node_mut().set_body_xml(body_xml);
    }

    /// Append a paragraph with a single text run to the note body.
    pub fn append_paragraph(&mut self, text: &str) {
        let body = self.node_mut().body_xml_mut();
        body.extend_from_slice(b"<w:p><w:r><w:t xml:space=\"preserve\">");
        body.extend_from_slice(escape_xml(text).as_bytes());
        body.extend_from_slice(b"</w:t></w:r></w:p>");
    }

    fn node_mut(&mut self) -> &mut NoteNode {
        let entry = self.part.entries[self.idx];
        self.part
            .root
            .child_mut(entry.node)
            .expect("entry list out of sync with tree")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn commit_bytes(part: &NotesPart) -> Vec<u8> {
        let mut bytes = Vec::new();
        part.on_commit(&mut bytes).unwrap();
        bytes
    }

    fn reopen(kind: NoteKind, bytes: &[u8]) -> NotesPart {
        let mut part = NotesPart::new(kind);
        part.on_read(&mut &bytes[..]).unwrap();
        part
    }

    #[test]
    fn test_fresh_document() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        part.add_note_with_text(10, "ten");
        part.add_note_with_text(20, "twenty");
        part.add_note_with_text(30, "thirty");

        assert_eq!(part.len(), 3);
        let ids: Vec<i64> = part.notes().map(|n| n.id()).collect();
        assert_eq!(ids, vec![10, 20, 30]);

        let second = part.note_by_id(20).unwrap();
        assert_eq!(second.index(), 1);
        assert_eq!(second.text().unwrap(), "twenty");

        let reopened = reopen(NoteKind::Footnote, &commit_bytes(&part));
        assert_eq!(reopened.len(), 3);
        for (a, b) in part.notes().zip(reopened.notes()) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.body_xml(), b.body_xml());
        }
    }

    #[test]
    fn test_lookup_first_match_with_duplicates() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        part.add_note_with_text(5, "first five");
        part.add_note_with_text(5, "second five");

        let hit = part.note_by_id(5).unwrap();
        assert_eq!(hit.index(), 0);
        assert_eq!(hit.text().unwrap(), "first five");
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        part.add_note(NoteNode::new(0));
        assert!(part.note_by_id(0).is_some());
        assert!(part.note_by_id(99).is_none());
    }

    #[test]
    fn test_idempotent_commit() {
        let mut part = NotesPart::new(NoteKind::Endnote);
        part.add_note_with_text(1, "one");
        part.add_note_with_text(2, "two");
        let first = commit_bytes(&part);
        let second = commit_bytes(&part);
        assert_eq!(first, second);

        // Also byte-identical after a read/commit cycle of our own output
        let reopened = reopen(NoteKind::Endnote, &first);
        assert_eq!(commit_bytes(&reopened), first);
    }

    #[test]
    fn test_corrupt_content_leaves_part_empty() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        let err = part.on_read(&mut &b"<w:broken"[..]).unwrap_err();
        assert!(matches!(err, PartError::CorruptContent(_)));
        assert!(part.is_empty());
        assert!(part.root().children().is_empty());
    }

    #[test]
    fn test_corrupt_content_wrong_schema() {
        let xml = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#;
        let mut part = NotesPart::new(NoteKind::Footnote);
        let err = part.on_read(&mut xml.as_bytes()).unwrap_err();
        assert!(matches!(err, PartError::CorruptContent(_)));
        assert!(part.is_empty());
    }

    #[test]
    fn test_on_read_consumes_stream() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        part.add_note_with_text(1, "x");
        let bytes = commit_bytes(&part);

        let mut cursor = std::io::Cursor::new(bytes.clone());
        let mut reopened = NotesPart::new(NoteKind::Footnote);
        reopened.on_read(&mut cursor).unwrap();
        assert_eq!(cursor.position() as usize, bytes.len());
    }

    #[test]
    fn test_mutation_via_handle_visible_on_commit() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        part.add_note_with_text(1, "before");

        let mut handle = part.note_by_id_mut(1).unwrap();
        handle.set_body_xml(Vec::new());
        handle.append_paragraph("after");

        let reopened = reopen(NoteKind::Footnote, &commit_bytes(&part));
        assert_eq!(reopened.note_by_id(1).unwrap().text().unwrap(), "after");
    }

    #[test]
    fn test_set_id_via_handle_visible_to_lookup() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        part.add_note_with_text(1, "note");
        part.note_mut(0).unwrap().set_id(42);
        assert!(part.note_by_id(1).is_none());
        assert_eq!(part.note_by_id(42).unwrap().index(), 0);
    }

    #[test]
    fn test_add_note_copied_from_other_part() {
        let mut source = NotesPart::new(NoteKind::Footnote);
        source.add_note_with_text(9, "shared");

        let mut dest = NotesPart::new(NoteKind::Footnote);
        dest.add_note(source.note_by_id(9).unwrap().node().clone());

        assert_eq!(dest.note_by_id(9).unwrap().text().unwrap(), "shared");
        // The copy is independent of the source part
        dest.note_by_id_mut(9).unwrap().set_id(10);
        assert_eq!(source.note_by_id(9).unwrap().id(), 9);
    }

    #[test]
    fn test_set_notes_rebuilds_entries() {
        let mut root = NotesRoot::new(NoteKind::Footnote);
        root.push(NoteNode::new(-1));
        root.push(NoteNode::new(1));

        let mut part = NotesPart::new(NoteKind::Footnote);
        part.add_note(NoteNode::new(77));
        part.set_notes(root).unwrap();

        assert_eq!(part.len(), 2);
        let ids: Vec<i64> = part.notes().map(|n| n.id()).collect();
        assert_eq!(ids, vec![-1, 1]);
        assert!(part.note_by_id(77).is_none());
    }

    #[test]
    fn test_set_notes_kind_mismatch() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        let err = part.set_notes(NotesRoot::new(NoteKind::Endnote)).unwrap_err();
        assert!(matches!(err, PartError::InvalidFormat(_)));
    }

    #[test]
    fn test_document_back_reference() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        assert_eq!(part.document_part(), None);
        part.set_document_part("/word/document.xml");
        assert_eq!(part.document_part(), Some("/word/document.xml"));
    }

    #[test]
    fn test_text_unescapes_entities() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        part.add_note_with_text(1, "a & b < c");
        assert_eq!(part.note_by_id(1).unwrap().text().unwrap(), "a & b < c");
    }

    #[test]
    fn test_text_from_parsed_body_with_entities() {
        let xml = r#"<w:footnotes xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:footnote w:id="1"><w:p><w:r><w:t>a &amp; b &lt; c</w:t></w:r></w:p></w:footnote></w:footnotes>"#;
        let part = reopen(NoteKind::Footnote, xml.as_bytes());
        assert_eq!(part.note_by_id(1).unwrap().text().unwrap(), "a & b < c");
    }

    #[test]
    fn test_text_leaves_unknown_refs_textual() {
        let mut part = NotesPart::new(NoteKind::Footnote);
        let mut handle = part.add_note(NoteNode::new(1));
        handle.set_body_xml(b"<w:p><w:r><w:t>x &foo; &#233; y</w:t></w:r></w:p>".to_vec());
        assert_eq!(
            part.note_by_id(1).unwrap().text().unwrap(),
            "x &foo; &#233; y"
        );
    }

    #[test]
    fn test_text_double_escaped_ampersand() {
        // Literal "&amp;" in the text is "&amp;amp;" on the wire
        let mut part = NotesPart::new(NoteKind::Footnote);
        part.add_note_with_text(1, "&amp;");
        let body = part.note_by_id(1).unwrap().body_xml().to_vec();
        assert!(body.windows(9).any(|w| w == b"&amp;amp;"));
        assert_eq!(part.note_by_id(1).unwrap().text().unwrap(), "&amp;");
    }

    #[test]
    fn test_dyn_dispatch_over_part_kinds() {
        let mut footnotes = NotesPart::new(NoteKind::Footnote);
        footnotes.add_note_with_text(1, "f");
        let mut endnotes = NotesPart::new(NoteKind::Endnote);
        endnotes.add_note_with_text(1, "e");

        let parts: Vec<Box<dyn PartLifecycle>> = vec![Box::new(footnotes), Box::new(endnotes)];
        let mut outputs = Vec::new();
        for part in &parts {
            let mut bytes = Vec::new();
            part.on_commit(&mut bytes).unwrap();
            outputs.push(bytes);
        }
        assert!(String::from_utf8(outputs[0].clone()).unwrap().contains("<w:footnotes"));
        assert!(String::from_utf8(outputs[1].clone()).unwrap().contains("<w:endnotes"));
    }

    proptest! {
        /// entries()[i] always mirrors the i-th root child, for any add
        /// sequence.
        #[test]
        fn prop_order_invariant(ids in prop::collection::vec(-50i64..50, 0..12)) {
            let mut part = NotesPart::new(NoteKind::Footnote);
            for id in &ids {
                part.add_note(NoteNode::new(*id));
            }
            prop_assert_eq!(part.len(), part.root().children().len());
            for (i, note) in part.notes().enumerate() {
                prop_assert_eq!(note.id(), part.root().children()[i].id());
                prop_assert_eq!(note.id(), ids[i]);
            }
        }

        /// Lookup returns the first match in list order, or None.
        #[test]
        fn prop_lookup_first_match(ids in prop::collection::vec(-5i64..5, 0..16), probe in -5i64..5) {
            let mut part = NotesPart::new(NoteKind::Footnote);
            for id in &ids {
                part.add_note(NoteNode::new(*id));
            }
            let expected = ids.iter().position(|&id| id == probe);
            prop_assert_eq!(part.note_by_id(probe).map(|n| n.index()), expected);
        }

        /// Commit then reopen preserves count, ids, types, bodies, order.
        #[test]
        fn prop_round_trip(notes in prop::collection::vec((-50i64..50, "[a-zA-Z<& ]{0,12}"), 0..8)) {
            let mut part = NotesPart::new(NoteKind::Footnote);
            for (id, text) in &notes {
                part.add_note_with_text(*id, text);
            }
            let mut bytes = Vec::new();
            part.on_commit(&mut bytes).unwrap();

            let mut reopened = NotesPart::new(NoteKind::Footnote);
            reopened.on_read(&mut bytes.as_slice()).unwrap();

            prop_assert_eq!(reopened.len(), part.len());
            for (a, b) in part.notes().zip(reopened.notes()) {
                prop_assert_eq!(a.id(), b.id());
                prop_assert_eq!(a.note_type(), b.note_type());
                prop_assert_eq!(a.body_xml(), b.body_xml());
                prop_assert_eq!(a.text().unwrap(), b.text().unwrap());
            }
        }
    }
}
