//! wmlpart - object model for the notes parts of WordprocessingML documents
//!
//! A .docx package is a ZIP of named parts, each holding one typed XML
//! substructure. This crate models the footnotes and endnotes parts: it
//! parses a part's bytes into a typed tree, keeps a collection-style view
//! over the tree's children in permanent lockstep with it, lets callers
//! mutate notes through either view, and serializes the tree back with the
//! namespace framing the part needs to be re-openable.
//!
//! The package layer itself (ZIP access, part addressing, content types) is
//! out of scope; it drives each part through the two callbacks of
//! [`PartLifecycle`].
//!
//! # Example - Authoring a footnotes part
//!
//! ```
//! use wmlpart::{NoteKind, NotesPart, PartLifecycle};
//!
//! let mut footnotes = NotesPart::new(NoteKind::Footnote);
//! footnotes.add_note_with_text(1, "See chapter 3.");
//! footnotes.add_note_with_text(2, "Disputed by later sources.");
//!
//! let mut bytes = Vec::new();
//! footnotes.on_commit(&mut bytes)?;
//! # Ok::<(), wmlpart::PartError>(())
//! ```
//!
//! # Example - Reading an existing part
//!
//! ```
//! use wmlpart::{NoteKind, NotesPart, PartLifecycle};
//!
//! let xml = br#"<w:footnotes xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:footnote w:id="1"><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:footnote></w:footnotes>"#;
//!
//! let mut footnotes = NotesPart::new(NoteKind::Footnote);
//! footnotes.on_read(&mut &xml[..])?;
//!
//! for note in footnotes.notes() {
//!     println!("Footnote {}: {}", note.id(), note.text()?);
//! }
//! # Ok::<(), wmlpart::PartError>(())
//! ```

pub mod error;
pub mod notes;
pub mod part;
pub mod tree;
pub mod xmlutil;

pub use error::{PartError, Result};
pub use notes::{Note, NoteMut, NotesPart};
pub use part::PartLifecycle;
pub use tree::{NoteKind, NoteNode, NoteType, NotesRoot, WML_NAMESPACE};
