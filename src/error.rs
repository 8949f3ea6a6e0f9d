use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputParseError {
    #[error("Unsupported bitrate {0:?}. Allowed: 64, 80, 96, 112, 128, 144, 160, 192, 224, 256, 288, 320 kbps.")]
    InvalidBitrate(String),

    #[error("No media files selected.")]
    NoInputs,
}

/// Conditions that stop a batch before any file is touched.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("ffmpeg not found: {0}")]
    ToolNotFound(String),

    #[error("Permission denied for output folder {path:?}: {msg}")]
    PermissionDenied { path: PathBuf, msg: String },

    #[error("A batch is already running.")]
    AlreadyRunning,

    #[error("Unable to start the batch worker: {0}")]
    Worker(#[source] io::Error),
}

impl BatchError {
    pub fn permission_denied(path: &PathBuf, msg: &str) -> Self {
        BatchError::PermissionDenied {
            path: PathBuf::from(path),
            msg: String::from(msg),
        }
    }
}

/// Failure of a single file. Never fatal to the batch.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("There was an error executing ffmpeg for {path:?}: {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("There was an error waiting for the ffmpeg process for {path:?}: {source}")]
    Wait {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ffmpeg exited with {code} for {path:?}")]
    Exit { path: PathBuf, code: i32 },

    #[error("ffmpeg did not exit successfully for {path:?}")]
    Terminated { path: PathBuf },
}

impl TranscodeError {
    pub fn path(&self) -> &PathBuf {
        match self {
            TranscodeError::Launch { path, .. } => path,
            TranscodeError::Wait { path, .. } => path,
            TranscodeError::Exit { path, .. } => path,
            TranscodeError::Terminated { path } => path,
        }
    }

    /// Short reason without the path, for status text that already names the file.
    pub fn reason(&self) -> String {
        match self {
            TranscodeError::Launch { source, .. } => format!("{}", source),
            TranscodeError::Wait { source, .. } => format!("{}", source),
            TranscodeError::Exit { code, .. } => format!("exited with {}", code),
            TranscodeError::Terminated { .. } => String::from("did not exit successfully"),
        }
    }
}
