//! E-book format adapters.
//!
//! Every supported format is presented through the same capability set,
//! the [`Ebook`] trait: prepare once ([`initialize`](Ebook::initialize)),
//! read metadata and content, release resources once
//! ([`cleanup`](Ebook::cleanup)).
//!
//! [`Epub`] reads the standard packaging format directly. [`Azw`] handles
//! Kindle archives by converting them to EPUB once up front (delegating
//! the actual unpacking to an external KindleUnpack executable) and then
//! forwarding every call to an internal [`Epub`] — composition over the
//! converted output, not inheritance from it.

mod azw;
mod epub;
pub mod error;
mod models;
#[cfg(test)]
mod testutil;
mod unpack;

pub use crate::azw::Azw;
pub use crate::epub::Epub;
pub use crate::models::{BookMetadata, TocEntry};

use crate::error::Result;

/// Capability set shared by every book format adapter.
///
/// Lifecycle is linear: construct, [`initialize`](Self::initialize) once,
/// read, [`cleanup`](Self::cleanup) at most once. Accessors called outside
/// that window fail with
/// [`Uninitialized`](crate::error::ErrorKind::Uninitialized).
pub trait Ebook {
    /// Absolute path or URL the book was opened from.
    fn path(&self) -> &str;
    /// Prepare the book for reading. Must be called before any accessor.
    fn initialize(&mut self) -> Result<()>;
    /// Book-level metadata (title, creator, ...).
    fn get_meta(&self) -> Result<&BookMetadata>;
    /// Reading-order content keys, resolvable by
    /// [`get_raw_text`](Self::get_raw_text).
    fn contents(&self) -> Result<&[String]>;
    /// Table-of-contents entries, indexing into [`contents`](Self::contents).
    fn toc_entries(&self) -> Result<&[TocEntry]>;
    /// Raw markup of a single content document.
    fn get_raw_text(&mut self, content: &str) -> Result<String>;
    /// Media type and bytes of an image resource.
    fn get_img_bytestr(&mut self, path: &str) -> Result<(String, Vec<u8>)>;
    /// Release any resources owned by the adapter.
    fn cleanup(&mut self) -> Result<()>;
}
