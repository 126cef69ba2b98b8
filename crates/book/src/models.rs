/// Book-level metadata, as far as the packaging format declares it.
///
/// Every field is optional; formats routinely omit most of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub identifier: Option<String>,
}

/// A table-of-contents entry pointing at a reading-order document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Human-readable label from the navigation document.
    pub label: String,
    /// Index into the adapter's content list.
    pub content_index: usize,
}
