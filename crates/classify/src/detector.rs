use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Anything able to classify the paths listed (one per line) in a file.
///
/// Both calls answer with one `<path>: <value>` line per listed path.
#[async_trait]
pub trait Detector: Send + Sync {
    /// MIME lines: `<path>: type/subtype; charset=encoding`.
    async fn mime(&self, listing: &Path) -> Result<String>;
    /// Free-text description lines: `<path>: <description>`.
    async fn describe(&self, listing: &Path) -> Result<String>;
}

/// The `file` command.
#[derive(Clone, Debug)]
pub struct FileCommand {
    path: PathBuf,
}

impl FileCommand {
    /// Look the `file` executable up on `PATH`.
    pub fn discover() -> Result<Self> {
        match which::which("file") {
            Ok(path) => {
                tracing::debug!(file = %path.display(), "Discovered file command");
                Ok(Self { path })
            },
            Err(_) => {
                tracing::info!("file executable not found in PATH");
                exn::bail!(ErrorKind::CommandNotFound);
            },
        }
    }

    /// Use an explicit executable instead of searching `PATH`.
    pub fn at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            exn::bail!(ErrorKind::CommandNotFound);
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn execute(&self, args: &[&str], listing: &Path) -> Result<String> {
        let output = Command::new(&self.path)
            .args(args)
            .arg("-f")
            .arg(listing)
            .kill_on_drop(true)
            .output()
            .await
            .or_raise(|| ErrorKind::Invocation(format!("failed to run {}", self.path.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            exn::bail!(ErrorKind::Invocation(format!("{} ({})", output.status, stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Detector for FileCommand {
    async fn mime(&self, listing: &Path) -> Result<String> {
        self.execute(&["-p", "-r", "--mime"], listing).await
    }

    async fn describe(&self, listing: &Path) -> Result<String> {
        self.execute(&["-p", "-r"], listing).await
    }
}
