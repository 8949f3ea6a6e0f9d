use std::fmt::Display;

/// Overall batch completion plus the current status line. Progress never
/// moves backwards within a run; `reset` starts a new run at zero.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressState {
    progress: f64,
    message: String,
}

impl ProgressState {
    pub fn new() -> Self {
        ProgressState {
            progress: 0.0,
            message: String::new(),
        }
    }

    pub fn reset(&mut self, message: &str) {
        self.progress = 0.0;
        self.message = String::from(message);
    }

    /// Returns the progress actually recorded, which is `progress` clamped
    /// to [0, 1] and never below the previous value.
    pub fn advance(&mut self, progress: f64, message: &str) -> f64 {
        let clamped = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        self.progress = f64::max(self.progress, clamped);
        self.message = String::from(message);
        self.progress
    }

    pub fn set_message(&mut self, message: &str) {
        self.message = String::from(message);
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn percent(&self) -> u32 {
        (self.progress * 100.0) as u32
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AbortReason {
    ToolNotFound,
    PermissionDenied,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Aborted(AbortReason),
}

#[derive(Clone, Debug, PartialEq)]
pub enum FileState {
    Starting,
    Streaming,
    Finished,
    Failed,
}

impl Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileState::Starting => "starting",
            FileState::Streaming => "streaming",
            FileState::Finished => "finished",
            FileState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}
