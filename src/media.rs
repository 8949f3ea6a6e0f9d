use std::fmt::Display;
use std::path::Path;

const AUDIO_EXTENSIONS: [&str; 2] = ["mp3", "m4a"];

// mp3, mpeg-4 movie/audio, wav and the quicktime family
const ACCEPTED_EXTENSIONS: [&str; 7] = ["mp3", "mp4", "m4v", "mov", "qt", "m4a", "wav"];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Anything not on the audio allow-list is treated as video, including
    /// extensions we have never heard of.
    pub fn classify(path: &Path) -> Self {
        match extension(path) {
            Some(ext) if AUDIO_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }

    pub fn bitrate_flag(&self) -> &'static str {
        match self {
            MediaKind::Audio => "-b:a",
            MediaKind::Video => "-b:v",
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

pub fn is_accepted(path: &Path) -> bool {
    match extension(path) {
        Some(ext) => ACCEPTED_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
