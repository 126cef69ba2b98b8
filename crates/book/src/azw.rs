//! AZW/KF8 adapter: Kindle archives presented through the EPUB machinery.

use crate::Ebook;
use crate::epub::Epub;
use crate::error::{ErrorKind, Result};
use crate::models::{BookMetadata, TocEntry};
use crate::unpack::KindleUnpack;
use folio_fetch::FileCache;
use std::path::{Path, PathBuf};
use tracing::instrument;
use url::Url;

/// Kindle book adapter.
///
/// Construction resolves the input (local paths become absolute, URLs stay
/// unfetched) and allocates a private temporary workspace.
/// [`initialize`](Ebook::initialize) materializes the input through the
/// injected [`FileCache`], converts it once with KindleUnpack, and from
/// then on forwards every call to an internal [`Epub`] built over the
/// converted output.
///
/// Lifecycle is strictly linear: `Created -> Initialized -> Cleaned up`.
/// [`cleanup`](Ebook::cleanup) removes the entire workspace and must be
/// called exactly once per successfully initialized adapter; a second call
/// fails with [`NotFound`](ErrorKind::NotFound). A *failed* `initialize`
/// releases the workspace itself and leaves the adapter unusable.
pub struct Azw {
    source: String,
    workspace: PathBuf,
    converted: PathBuf,
    cache: FileCache,
    unpacker: Option<KindleUnpack>,
    delegate: Option<Epub>,
}

impl Azw {
    /// Create an adapter for `path_or_url`, downloading (later) through the
    /// given cache. The input is not fetched or inspected yet.
    pub fn new(path_or_url: &str, cache: FileCache) -> Result<Self> {
        let source = resolve_source(path_or_url)?;
        let basename = basename(&source)?;
        // The TempDir guard removes the workspace again if anything below fails.
        let workspace = tempfile::Builder::new().prefix("folio-").tempdir().map_err(ErrorKind::Io)?;
        let converted = workspace.path().join("mobi8").join(format!("{basename}.epub"));
        Ok(Self {
            source,
            workspace: workspace.keep(),
            converted,
            cache,
            unpacker: None,
            delegate: None,
        })
    }

    /// The private workspace the converted book lives in until
    /// [`cleanup`](Ebook::cleanup).
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    fn convert(&self) -> Result<Epub> {
        let local = self.cache.ensure_cached(&self.source).map_err(ErrorKind::fetch)?;
        let discovered;
        let unpacker = match &self.unpacker {
            Some(unpacker) => unpacker,
            None => {
                discovered = KindleUnpack::discover()?;
                &discovered
            },
        };
        unpacker.execute(&local, &self.workspace)?;
        if !self.converted.exists() {
            exn::bail!(ErrorKind::Conversion(format!(
                "no converted output at {}",
                self.converted.display()
            )));
        }
        let mut delegate = Epub::new(&self.converted)?;
        delegate.initialize()?;
        Ok(delegate)
    }

    fn delegate(&self) -> Result<&Epub> {
        match &self.delegate {
            Some(delegate) => Ok(delegate),
            None => exn::bail!(ErrorKind::Uninitialized),
        }
    }

    fn delegate_mut(&mut self) -> Result<&mut Epub> {
        match &mut self.delegate {
            Some(delegate) => Ok(delegate),
            None => exn::bail!(ErrorKind::Uninitialized),
        }
    }
}

impl Ebook for Azw {
    fn path(&self) -> &str {
        &self.source
    }

    #[instrument(skip(self), fields(source = %self.source))]
    fn initialize(&mut self) -> Result<()> {
        match self.convert() {
            Ok(delegate) => {
                self.delegate = Some(delegate);
                Ok(())
            },
            Err(err) => {
                // A failed initialize releases the workspace it allocated.
                if let Err(e) = std::fs::remove_dir_all(&self.workspace) {
                    tracing::warn!(
                        workspace = %self.workspace.display(),
                        error = %e,
                        "could not release workspace after failed initialize"
                    );
                }
                self.delegate = None;
                Err(err)
            },
        }
    }

    fn get_meta(&self) -> Result<&BookMetadata> {
        self.delegate()?.get_meta()
    }

    fn contents(&self) -> Result<&[String]> {
        self.delegate()?.contents()
    }

    fn toc_entries(&self) -> Result<&[TocEntry]> {
        self.delegate()?.toc_entries()
    }

    fn get_raw_text(&mut self, content: &str) -> Result<String> {
        self.delegate_mut()?.get_raw_text(content)
    }

    fn get_img_bytestr(&mut self, path: &str) -> Result<(String, Vec<u8>)> {
        self.delegate_mut()?.get_img_bytestr(path)
    }

    fn cleanup(&mut self) -> Result<()> {
        self.delegate = None;
        std::fs::remove_dir_all(&self.workspace).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(self.workspace.clone()),
            _ => ErrorKind::Io(e),
        })?;
        Ok(())
    }
}

/// Absolute form of a local path; URLs pass through untouched (they are
/// fetched lazily in `initialize`).
fn resolve_source(path_or_url: &str) -> Result<String> {
    match Url::parse(path_or_url) {
        Ok(_) => Ok(path_or_url.to_string()),
        Err(_) => {
            let abs = std::path::absolute(Path::new(path_or_url)).map_err(ErrorKind::Io)?;
            Ok(abs.display().to_string())
        },
    }
}

/// Base filename of the input without its extension; names the converted
/// output inside the workspace.
fn basename(source: &str) -> Result<String> {
    let name = source.rsplit('/').next().unwrap_or(source);
    match Path::new(name).file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) if !stem.is_empty() => Ok(stem.to_string()),
        _ => exn::bail!(ErrorKind::Malformed(format!("no usable filename in `{source}`"))),
    }
}
