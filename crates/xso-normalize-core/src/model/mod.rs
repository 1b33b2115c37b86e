//! Typed model of the document, its definitions graph and the dictionary.

pub mod dictionary;
pub mod document;
pub mod reference;
pub mod xso;

pub use dictionary::{CreateOptions, DictEntry, Dictionary, EntryKind};
pub use document::{Definitions, Document};
pub use reference::{DefRef, RefFlavor};
pub use xso::{AdditionalProperties, Discriminator, RefObject, Xml, Xso, TEMPORARY_KEYS};
