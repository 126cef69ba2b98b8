use crate::error::{ErrorKind, Result};
use crate::http;
use crate::scp::Scp;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::instrument;
use url::Url;

/// Where cached downloads live.
enum CacheDir {
    /// Caller-supplied directory; persists across the reading session.
    Persistent(PathBuf),
    /// Process-private directory, removed when the cache is dropped.
    Temporary(TempDir),
}

impl CacheDir {
    fn path(&self) -> &Path {
        match self {
            Self::Persistent(path) => path,
            Self::Temporary(dir) => dir.path(),
        }
    }
}

/// URL-keyed cache of downloaded files.
///
/// Maps local paths, `file://` URIs, HTTP(S) URLs, and SSH-style remote
/// paths onto a guaranteed-local filesystem path, downloading each distinct
/// remote URL at most once per cache lifetime. Existence of the target file
/// on disk *is* the memoization signal; there is no manifest, no TTL, and
/// no invalidation beyond deleting the file externally.
///
/// Not safe for concurrent use: the existence check and the download are
/// not performed under any lock, so two overlapping requests for the same
/// derived filename race. The reader is single-threaded, so this is a
/// documented limitation rather than a guarded path.
pub struct FileCache {
    dir: CacheDir,
}

impl FileCache {
    /// Create a cache over a caller-supplied directory, creating it if it
    /// does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            std::fs::create_dir_all(&dir).map_err(ErrorKind::Io)?;
        }
        Ok(Self { dir: CacheDir::Persistent(dir) })
    }

    /// Create a cache over a process-private temporary directory. Cached
    /// downloads are lost when the cache is dropped.
    pub fn temporary() -> Result<Self> {
        let dir = tempfile::tempdir().map_err(ErrorKind::Io)?;
        Ok(Self { dir: CacheDir::Temporary(dir) })
    }

    /// The directory cached downloads are written into.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Resolve `path_or_url` to a local absolute path, downloading and
    /// memoizing if necessary.
    ///
    /// - No scheme: returned as an absolute local path, untouched.
    /// - `file://`: the absolute form of the URI's path component.
    /// - `http`/`https`/`ssh`: downloaded into the cache directory under
    ///   the URL's final path segment, unless that file already exists.
    ///
    /// The derived filename is *only* the final path segment, so two
    /// distinct URLs sharing a final segment collide and the second request
    /// silently resolves to the first's content. Known limitation,
    /// preserved deliberately.
    ///
    /// No timeout is enforced beyond the transport's defaults; a slow
    /// remote blocks the calling thread for the duration.
    ///
    /// # Errors
    /// [`UnsupportedScheme`](ErrorKind::UnsupportedScheme) for any other
    /// scheme; [`Network`](ErrorKind::Network),
    /// [`ToolNotFound`](ErrorKind::ToolNotFound) or
    /// [`Download`](ErrorKind::Download) when the dispatch target fails.
    #[instrument(skip(self))]
    pub fn ensure_cached(&self, path_or_url: &str) -> Result<PathBuf> {
        let Ok(url) = Url::parse(path_or_url) else {
            // Anything that isn't URL-shaped is a plain filesystem path.
            return absolute(Path::new(path_or_url));
        };
        match url.scheme() {
            "file" => absolute(Path::new(url.path())),
            "http" | "https" | "ssh" => {
                let target = self.dir().join(derived_filename(&url)?);
                if target.exists() {
                    tracing::debug!(target = %target.display(), "cache hit");
                    return absolute(&target);
                }
                match url.scheme() {
                    "ssh" => Scp::discover()?.download(&url, &target)?,
                    _ => http::download(&url, &target)?,
                }
                absolute(&target)
            },
            scheme => exn::bail!(ErrorKind::UnsupportedScheme(scheme.to_string())),
        }
    }
}

/// The URL's final path segment, used verbatim as the cache filename.
fn derived_filename(url: &Url) -> Result<&str> {
    match url.path_segments().and_then(|mut segments| segments.next_back()) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidUrl(url.to_string())),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path).map_err(ErrorKind::Io)?)
}
