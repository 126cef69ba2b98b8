use crate::error::{ErrorKind, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Represents a KindleUnpack executable.
#[derive(Debug)]
pub(crate) struct KindleUnpack {
    path: PathBuf,
}

impl KindleUnpack {
    pub(crate) fn discover() -> Result<Self> {
        Self::discover_in(std::env::var_os("PATH"))
    }

    fn discover_in(paths: Option<OsString>) -> Result<Self> {
        // Check for direct executables; distributions package the script
        // under a couple of different names.
        let executables = ["kindleunpack", "kindle-unpack", "kindleunpack.py"];
        for exe in executables {
            if let Ok(path) = which::which_in(exe, paths.as_ref(), ".") {
                return Ok(Self { path });
            }
        }
        tracing::info!("KindleUnpack executable not found in PATH");
        exn::bail!(ErrorKind::ToolNotFound("kindleunpack"))
    }

    #[cfg(test)]
    pub(crate) fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Unpack `input` into `workspace`, requesting the KF8 (mobi8) layout
    /// and HD images. The tool's own console output is discarded; stderr is
    /// kept for the error message.
    pub(crate) fn execute(&self, input: &Path, workspace: &Path) -> Result<()> {
        let output = Command::new(&self.path)
            .args(["--epub_version", "A", "-i"])
            .arg(input)
            .arg(workspace)
            .stdout(Stdio::null())
            .output()
            .map_err(ErrorKind::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            exn::bail!(ErrorKind::Conversion(format!(
                "kindleunpack exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        tracing::debug!(input = %input.display(), workspace = %workspace.display(), "book unpacked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_without_converter_on_path() {
        let empty = tempfile::tempdir().unwrap();
        let err = KindleUnpack::discover_in(Some(empty.path().into())).unwrap_err();
        assert!(matches!(&*err, ErrorKind::ToolNotFound("kindleunpack")));
        assert!(!err.is_retryable());
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_accepts_alternate_executable_name() {
        use std::os::unix::fs::PermissionsExt;
        let bin = tempfile::tempdir().unwrap();
        let exe = bin.path().join("kindle-unpack");
        std::fs::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        let unpacker = KindleUnpack::discover_in(Some(bin.path().into())).unwrap();
        assert_eq!(unpacker.path, exe);
    }
}
