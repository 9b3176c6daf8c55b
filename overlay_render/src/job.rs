//! Render jobs - one external process plus its temporary file set.
//!
//! A `RenderJob` is a scoped handle: the process and the directory holding
//! its input and output files live exactly as long as the job. Finishing,
//! cancelling or dropping the job always reaps the process and deletes the
//! directory, so no renderer outlives the region that asked for it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Instant;

use tempfile::TempDir;

use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::template::RenderRequest;

/// File stem shared by every file in a job directory.
const STEM: &str = "expression";

/// A rendered image, loaded into memory before the job's files are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    data: Arc<[u8]>,
}

impl RenderedImage {
    /// Wraps raw image bytes.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// Returns the encoded image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the encoded size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the image holds no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of polling a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// The process has not exited yet.
    Running,
    /// The process exited successfully and produced an image.
    Succeeded(RenderedImage),
    /// The process failed or produced nothing usable.
    Failed(String),
}

/// A running external render.
#[derive(Debug)]
pub struct RenderJob {
    /// The renderer process; `None` once it has been reaped.
    child: Option<Child>,
    /// Temporary directory with the input and output files; `None` once deleted.
    workdir: Option<TempDir>,
    /// Where the renderer is expected to write its image.
    output: PathBuf,
    /// When the process was started.
    started: Instant,
}

impl RenderJob {
    /// Writes the source document and starts the render command.
    ///
    /// The command runs through `sh -c` in the job directory with all
    /// standard streams closed. On Unix it gets its own process group so a
    /// pipeline is terminated as a whole.
    pub fn spawn(request: &RenderRequest, config: &RenderConfig) -> Result<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("markup-overlay-")
            .tempdir()
            .map_err(|e| RenderError::io("creating render directory", e))?;

        let input = workdir.path().join(format!("{STEM}.tex"));
        fs::write(&input, request.document(config))
            .map_err(|e| RenderError::io("writing render input", e))?;

        let output = workdir.path().join(format!("{STEM}.png"));
        let command_line = request.command(config, workdir.path(), STEM);

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&command_line)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        // If spawning fails the TempDir drops here and removes the input file
        let child = command.spawn().map_err(RenderError::Spawn)?;

        log::debug!(
            "Started renderer pid {} in {}",
            child.id(),
            workdir.path().display()
        );
        log::trace!("Render command: {}", command_line);

        Ok(Self {
            child: Some(child),
            workdir: Some(workdir),
            output,
            started: Instant::now(),
        })
    }

    /// Returns the process ID while the process has not been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Returns the job directory while it still exists.
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_ref().map(TempDir::path)
    }

    /// Returns when the process was started.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Returns true once the process has been reaped.
    pub fn is_finished(&self) -> bool {
        self.child.is_none()
    }

    /// Checks the process without blocking.
    ///
    /// Once a terminal status is returned the process is reaped and the
    /// job's files are gone; later polls report a failure.
    pub fn poll(&mut self) -> JobStatus {
        let Some(child) = self.child.as_mut() else {
            return JobStatus::Failed("job already finished".to_string());
        };

        let status = match child.try_wait() {
            Ok(None) => return JobStatus::Running,
            Ok(Some(status)) => status,
            Err(e) => {
                self.terminate();
                return JobStatus::Failed(format!("failed to query renderer: {}", e));
            }
        };
        self.child = None;

        let result = if !status.success() {
            JobStatus::Failed(format!("renderer exited with {}", status))
        } else {
            match fs::read(&self.output) {
                Ok(bytes) if !bytes.is_empty() => JobStatus::Succeeded(RenderedImage::new(bytes)),
                Ok(_) => JobStatus::Failed("renderer produced an empty image".to_string()),
                Err(e) => JobStatus::Failed(format!(
                    "cannot read {}: {}",
                    self.output.display(),
                    e
                )),
            }
        };

        self.remove_files();
        result
    }

    /// Kills the process and deletes the job's files.
    pub fn cancel(mut self) {
        self.terminate();
    }

    fn terminate(&mut self) {
        if let Some(mut child) = self.child.take() {
            let pid = child.id();

            #[cfg(unix)]
            {
                // The process group id equals the leader's pid.
                // SAFETY: killpg has no memory-safety preconditions.
                unsafe {
                    libc::killpg(pid as libc::pid_t, libc::SIGKILL);
                }
            }

            let _ = child.kill();
            // Reap so no zombie is left behind
            let _ = child.wait();
            log::debug!("Killed renderer pid {}", pid);
        }
        self.remove_files();
    }

    fn remove_files(&mut self) {
        if let Some(dir) = self.workdir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                log::warn!("Failed to remove render files in {}: {}", path.display(), e);
            }
        }
    }
}

impl Drop for RenderJob {
    fn drop(&mut self) {
        self.terminate();
    }
}
