use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::BatchError;
use crate::fstools::{classify_file, DirEntryCategory};
use crate::transcode_task::TranscodeTask;

pub mod probe;
pub mod progress;

const ENCODER_NAME: &str = "ffmpeg";

/// Handle to a user-supplied ffmpeg executable.
#[derive(Clone, Debug)]
pub struct Encoder {
    path: PathBuf,
}

impl Encoder {
    /// Uses `explicit` when given, otherwise looks `ffmpeg` up on `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, BatchError> {
        match explicit {
            Some(path) => match classify_file(path) {
                DirEntryCategory::RegularFile => Ok(Encoder { path: path.to_path_buf() }),
                _ => Err(BatchError::ToolNotFound(format!("{}", path.display()))),
            },
            None => which::which(ENCODER_NAME)
                .map(|path| Encoder { path })
                .map_err(|err| BatchError::ToolNotFound(format!("{}: {}", ENCODER_NAME, err))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_installed(&self) -> bool {
        let cmd = Command::new(&self.path)
            .arg("-version")
            .output();
        match cmd {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    /// `-y -i <input> {-b:a|-b:v} <bitrate> <output>`
    pub fn args(&self, task: &TranscodeTask) -> Vec<PathBuf> {
        fn pbs(s: &str) -> PathBuf { PathBuf::from(s) }

        vec![
            pbs("-y"),
            pbs("-i"), task.source.clone(),
            pbs(task.kind.bitrate_flag()), pbs(&task.bitrate.encoder_value()),
            task.destination.clone(),
        ]
    }

    pub fn command(&self, task: &TranscodeTask) -> Command {
        let mut cmd = Command::new(&self.path);
        cmd.args(self.args(task));
        cmd
    }
}
