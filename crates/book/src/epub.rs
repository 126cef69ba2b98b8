//! EPUB adapter: the standard packaging format every other adapter
//! ultimately normalizes to.
//!
//! Deliberately thin: it resolves the OPF package document via
//! `META-INF/container.xml`, reads Dublin Core metadata, the manifest and
//! spine, and NCX navigation labels when the spine declares them. Content
//! documents and images are served straight out of the zip archive.

use crate::error::{ErrorKind, Result};
use crate::models::{BookMetadata, TocEntry};
use crate::Ebook;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;
use zip::result::ZipError;

/// Standard-format e-book backed by a local `.epub` file.
pub struct Epub {
    path: String,
    abspath: PathBuf,
    state: Option<Loaded>,
}

struct Loaded {
    archive: ZipArchive<File>,
    meta: BookMetadata,
    contents: Vec<String>,
    toc: Vec<TocEntry>,
}

impl Epub {
    /// Open an adapter over an EPUB file on local disk. Remote books are
    /// resolved through `folio-fetch` before construction.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let abspath = std::path::absolute(path.into()).map_err(ErrorKind::Io)?;
        Ok(Self { path: abspath.display().to_string(), abspath, state: None })
    }

    fn loaded(&self) -> Result<&Loaded> {
        match &self.state {
            Some(state) => Ok(state),
            None => exn::bail!(ErrorKind::Uninitialized),
        }
    }

    fn loaded_mut(&mut self) -> Result<&mut Loaded> {
        match &mut self.state {
            Some(state) => Ok(state),
            None => exn::bail!(ErrorKind::Uninitialized),
        }
    }
}

impl Ebook for Epub {
    fn path(&self) -> &str {
        &self.path
    }

    fn initialize(&mut self) -> Result<()> {
        let file = File::open(&self.abspath).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound(self.abspath.clone()),
            _ => ErrorKind::Io(e),
        })?;
        let mut archive = ZipArchive::new(file).map_err(|e| map_zip_error(e, &self.abspath))?;

        let container = read_entry_string(&mut archive, "META-INF/container.xml")?;
        let opf_path = rootfile_path(&container)?;
        let opf_dir = opf_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("").to_string();
        let package = parse_opf(&read_entry_string(&mut archive, &opf_path)?)?;

        let contents: Vec<String> = package
            .spine
            .iter()
            .filter_map(|idref| package.manifest.get(idref))
            .map(|href| resolve_href(&opf_dir, href))
            .collect();
        let toc = match package.toc_id.as_ref().and_then(|id| package.manifest.get(id)) {
            Some(href) => {
                let ncx = read_entry_string(&mut archive, &resolve_href(&opf_dir, href))?;
                parse_ncx(&ncx, &opf_dir, &contents)?
            },
            None => Vec::new(),
        };
        tracing::debug!(
            path = %self.path,
            documents = contents.len(),
            toc_entries = toc.len(),
            "EPUB package loaded"
        );
        self.state = Some(Loaded { archive, meta: package.meta, contents, toc });
        Ok(())
    }

    fn get_meta(&self) -> Result<&BookMetadata> {
        Ok(&self.loaded()?.meta)
    }

    fn contents(&self) -> Result<&[String]> {
        Ok(&self.loaded()?.contents)
    }

    fn toc_entries(&self) -> Result<&[TocEntry]> {
        Ok(&self.loaded()?.toc)
    }

    fn get_raw_text(&mut self, content: &str) -> Result<String> {
        let state = self.loaded_mut()?;
        let mut entry = state.archive.by_name(content).map_err(|e| map_zip_error(e, Path::new(content)))?;
        let mut text = String::new();
        entry.read_to_string(&mut text).map_err(ErrorKind::Io)?;
        Ok(text)
    }

    fn get_img_bytestr(&mut self, path: &str) -> Result<(String, Vec<u8>)> {
        let media_type = mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string();
        let state = self.loaded_mut()?;
        let mut entry = state.archive.by_name(path).map_err(|e| map_zip_error(e, Path::new(path)))?;
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(ErrorKind::Io)?;
        Ok((media_type, bytes))
    }

    fn cleanup(&mut self) -> Result<()> {
        // Nothing on disk belongs to this adapter; just drop the archive.
        self.state = None;
        Ok(())
    }
}

fn map_zip_error(err: ZipError, path: &Path) -> ErrorKind {
    match err {
        ZipError::FileNotFound => ErrorKind::NotFound(path.to_path_buf()),
        ZipError::Io(e) => ErrorKind::Io(e),
        other => ErrorKind::Malformed(other.to_string()),
    }
}

fn read_entry_string(archive: &mut ZipArchive<File>, name: &str) -> Result<String> {
    let mut entry = archive.by_name(name).map_err(|e| map_zip_error(e, Path::new(name)))?;
    let mut text = String::new();
    entry.read_to_string(&mut text).map_err(ErrorKind::Io)?;
    Ok(text)
}

/// First declared attribute named `name` (namespace-insensitively), unescaped.
fn attr_value(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| ErrorKind::Malformed(e.to_string()))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr.unescape_value().map_err(|e| ErrorKind::Malformed(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Locate the OPF package document inside `META-INF/container.xml`.
fn rootfile_path(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Err(e) => exn::bail!(ErrorKind::Malformed(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attr_value(&e, b"full-path")? {
                    return Ok(path);
                }
            },
            Ok(_) => {},
        }
    }
    exn::bail!(ErrorKind::Malformed("container.xml declares no rootfile".to_string()))
}

struct Package {
    meta: BookMetadata,
    /// Manifest id -> href (relative to the OPF directory).
    manifest: HashMap<String, String>,
    /// Reading order, as manifest ids.
    spine: Vec<String>,
    /// Manifest id of the NCX navigation document, if declared.
    toc_id: Option<String>,
}

fn parse_opf(xml: &str) -> Result<Package> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut meta = BookMetadata::default();
    let mut manifest = HashMap::new();
    let mut spine = Vec::new();
    let mut toc_id = None;
    let mut in_metadata = false;
    let mut current_field: Option<Vec<u8>> = None;
    loop {
        match reader.read_event() {
            Err(e) => exn::bail!(ErrorKind::Malformed(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"spine" => toc_id = attr_value(&e, b"toc")?,
                b"item" => collect_item(&e, &mut manifest)?,
                b"itemref" => collect_itemref(&e, &mut spine)?,
                name if in_metadata && is_meta_field(name) => {
                    current_field = Some(name.to_vec());
                },
                _ => {},
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => collect_item(&e, &mut manifest)?,
                b"itemref" => collect_itemref(&e, &mut spine)?,
                b"spine" => toc_id = attr_value(&e, b"toc")?,
                _ => {},
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"metadata" {
                    in_metadata = false;
                }
                if current_field.as_deref() == Some(e.local_name().as_ref()) {
                    current_field = None;
                }
            },
            Ok(Event::Text(t)) => {
                if let Some(name) = &current_field {
                    let text = t.unescape().map_err(|e| ErrorKind::Malformed(e.to_string()))?;
                    if let Some(field) = meta_field(&mut meta, name) {
                        // First declaration wins; EPUBs may repeat elements.
                        field.get_or_insert_with(|| text.into_owned());
                    }
                }
            },
            Ok(_) => {},
        }
    }
    if spine.is_empty() {
        exn::bail!(ErrorKind::Malformed("package declares an empty spine".to_string()));
    }
    Ok(Package { meta, manifest, spine, toc_id })
}

fn collect_item(element: &BytesStart<'_>, manifest: &mut HashMap<String, String>) -> Result<()> {
    if let (Some(id), Some(href)) = (attr_value(element, b"id")?, attr_value(element, b"href")?) {
        manifest.insert(id, href);
    }
    Ok(())
}

fn collect_itemref(element: &BytesStart<'_>, spine: &mut Vec<String>) -> Result<()> {
    if let Some(idref) = attr_value(element, b"idref")? {
        spine.push(idref);
    }
    Ok(())
}

fn is_meta_field(local_name: &[u8]) -> bool {
    matches!(
        local_name,
        b"title" | b"creator" | b"description" | b"publisher" | b"language" | b"identifier"
    )
}

fn meta_field<'a>(meta: &'a mut BookMetadata, local_name: &[u8]) -> Option<&'a mut Option<String>> {
    match local_name {
        b"title" => Some(&mut meta.title),
        b"creator" => Some(&mut meta.creator),
        b"description" => Some(&mut meta.description),
        b"publisher" => Some(&mut meta.publisher),
        b"language" => Some(&mut meta.language),
        b"identifier" => Some(&mut meta.identifier),
        _ => None,
    }
}

/// Pull `navLabel`/`content` pairs out of an NCX document, matched back to
/// indices in the reading order. Unmatched entries are dropped.
fn parse_ncx(xml: &str, opf_dir: &str, contents: &[String]) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut toc = Vec::new();
    let mut in_label = false;
    let mut pending_label: Option<String> = None;
    loop {
        match reader.read_event() {
            Err(e) => exn::bail!(ErrorKind::Malformed(e.to_string())),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"navLabel" => in_label = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"navLabel" => in_label = false,
            Ok(Event::Text(t)) if in_label => {
                let text = t.unescape().map_err(|e| ErrorKind::Malformed(e.to_string()))?;
                pending_label = Some(text.into_owned());
            },
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"content" => {
                let Some(src) = attr_value(&e, b"src")? else { continue };
                let src = src.split('#').next().unwrap_or(&src);
                let resolved = resolve_href(opf_dir, src);
                if let (Some(label), Some(index)) =
                    (pending_label.take(), contents.iter().position(|c| *c == resolved))
                {
                    toc.push(TocEntry { label, content_index: index });
                }
            },
            Ok(_) => {},
        }
    }
    Ok(toc)
}

/// Resolve a manifest href against the OPF directory, collapsing `.` and
/// `..` components. Zip entry names always use forward slashes.
fn resolve_href(base: &str, href: &str) -> String {
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    for part in href.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            p => parts.push(p),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_minimal_epub;
    use rstest::rstest;

    #[rstest]
    #[case("", "chapter.xhtml", "chapter.xhtml")]
    #[case("OEBPS", "text/chapter.xhtml", "OEBPS/text/chapter.xhtml")]
    #[case("OEBPS", "./toc.ncx", "OEBPS/toc.ncx")]
    #[case("OEBPS/text", "../images/cover.png", "OEBPS/images/cover.png")]
    fn test_resolve_href(#[case] base: &str, #[case] href: &str, #[case] expected: &str) {
        assert_eq!(resolve_href(base, href), expected);
    }

    #[test]
    fn test_rootfile_path() {
        let xml = r#"<?xml version="1.0"?>
            <container xmlns="urn:oasis:names:tc:opendocument:xmlns:container" version="1.0">
              <rootfiles>
                <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
              </rootfiles>
            </container>"#;
        assert_eq!(rootfile_path(xml).unwrap(), "OEBPS/content.opf");
        let err = rootfile_path("<container/>").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed(_)));
    }

    #[test]
    fn test_initialize_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_minimal_epub(&path);

        let mut epub = Epub::new(&path).unwrap();
        epub.initialize().unwrap();

        let meta = epub.get_meta().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Minimal Book"));
        assert_eq!(meta.creator.as_deref(), Some("A. Author"));
        assert_eq!(meta.language.as_deref(), Some("en"));

        let contents = epub.contents().unwrap().to_vec();
        assert_eq!(contents, vec!["OEBPS/text/chapter1.xhtml".to_string()]);

        let toc = epub.toc_entries().unwrap().to_vec();
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].label, "Chapter One");
        assert_eq!(toc[0].content_index, 0);

        let text = epub.get_raw_text(&contents[0]).unwrap();
        assert!(text.contains("Hello, reader."));

        let (mime, bytes) = epub.get_img_bytestr("OEBPS/images/cover.png").unwrap();
        assert_eq!(mime, "image/png");
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_accessors_before_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_minimal_epub(&path);
        let epub = Epub::new(&path).unwrap();
        let err = epub.get_meta().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Uninitialized));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut epub = Epub::new(dir.path().join("gone.epub")).unwrap();
        let err = epub.initialize().unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_garbage_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.epub");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        let mut epub = Epub::new(&path).unwrap();
        let err = epub.initialize().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed(_)));
    }

    #[test]
    fn test_missing_entry_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_minimal_epub(&path);
        let mut epub = Epub::new(&path).unwrap();
        epub.initialize().unwrap();
        let err = epub.get_raw_text("OEBPS/text/chapter99.xhtml").unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_cleanup_releases_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.epub");
        write_minimal_epub(&path);
        let mut epub = Epub::new(&path).unwrap();
        epub.initialize().unwrap();
        epub.cleanup().unwrap();
        let err = epub.contents().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Uninitialized));
    }
}
