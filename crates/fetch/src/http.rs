//! Blocking HTTP(S) download into the cache directory.

use crate::error::{ErrorKind, Result};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use url::Url;

/// Identifying user-agent, embedding the crate version.
const USER_AGENT: &str = concat!("folio/v", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.8";

/// Issue a GET for `url` and materialize the body at `target`.
///
/// The body is streamed to a temporary sibling file and renamed into place
/// only once fully written, so a transport failure never leaves a partial
/// file under the final name. Failures are surfaced as
/// [`Network`](ErrorKind::Network) without retry.
pub(crate) fn download(url: &Url, target: &Path) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ErrorKind::Network(e.to_string()))?;
    let mut response = client
        .get(url.as_str())
        .header(reqwest::header::ACCEPT, ACCEPT)
        .header(reqwest::header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| ErrorKind::Network(e.to_string()))?;
    let parent = target.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent).map_err(ErrorKind::Io)?;
    io::copy(&mut response, &mut tmp).map_err(ErrorKind::Io)?;
    tmp.persist(target).map_err(|e| ErrorKind::Io(e.error))?;
    tracing::debug!(url = %url, target = %target.display(), "downloaded over HTTP");
    Ok(())
}
