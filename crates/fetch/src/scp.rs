//! SSH download via the system `scp` executable.
//!
//! Remote shells disagree on whether the remote path should arrive quoted.
//! The download is attempted with the raw path first and retried once with
//! the path shell-quoted; which form a given server accepts is
//! environment-dependent, so both are kept.

use crate::error::{ErrorKind, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;
use url::Url;

/// A discovered `scp` executable.
#[derive(Debug)]
pub(crate) struct Scp {
    path: PathBuf,
}

impl Scp {
    pub(crate) fn discover() -> Result<Self> {
        Self::discover_in(std::env::var_os("PATH"))
    }

    fn discover_in(paths: Option<OsString>) -> Result<Self> {
        match which::which_in("scp", paths, ".") {
            Ok(path) => Ok(Self { path }),
            Err(_) => {
                tracing::info!("scp executable not found in PATH");
                exn::bail!(ErrorKind::ToolNotFound("scp"))
            },
        }
    }

    #[cfg(test)]
    pub(crate) fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Copy the file named by `url` to `target`.
    ///
    /// Downloads to a temporary sibling first and renames into place only
    /// on success, so a failed attempt never leaves a partial file under
    /// the final name (or any leftover under a temporary one).
    pub(crate) fn download(&self, url: &Url, target: &Path) -> Result<()> {
        let host = remote_host(url)?;
        let parent = target.parent().unwrap_or(Path::new("."));
        let tmp = NamedTempFile::new_in(parent).map_err(ErrorKind::Io)?;
        let remote = url.path();
        let mut errmsg = String::new();
        for path in [remote.to_string(), shell_quote(remote)] {
            let mut cmd = Command::new(&self.path);
            if let Some(port) = url.port() {
                cmd.args(["-P", &port.to_string()]);
            }
            let output = cmd
                .arg("-Tq")
                .arg(format!("{host}:{path}"))
                .arg(tmp.path())
                .output()
                .map_err(ErrorKind::Io)?;
            if output.status.success() {
                tmp.persist(target).map_err(|e| ErrorKind::Io(e.error))?;
                tracing::debug!(url = %url, target = %target.display(), "downloaded over SSH");
                return Ok(());
            }
            errmsg = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::debug!(attempt = %path, stderr = %errmsg, "scp attempt failed");
        }
        exn::bail!(ErrorKind::Download(format!("failed to download {url}: {errmsg}")))
    }
}

fn remote_host(url: &Url) -> Result<String> {
    let Some(host) = url.host_str() else {
        exn::bail!(ErrorKind::InvalidUrl(url.to_string()));
    };
    match url.username() {
        "" => Ok(host.to_string()),
        user => Ok(format!("{user}@{host}")),
    }
}

/// Quote `s` for consumption by a POSIX remote shell.
fn shell_quote(s: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c);
    if !s.is_empty() && s.chars().all(safe) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}
