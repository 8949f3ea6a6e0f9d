use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BatchError;

/// Stand-in for a measured duration. Every input is assumed to run this long
/// unless the ffprobe source is chosen, so progress for longer inputs hits
/// 100% early and shorter inputs never reach it before the file ends.
pub const PLACEHOLDER_DURATION_SECS: f64 = 60.0;

const PROBE_NAME: &str = "ffprobe";

/// Where the per-file duration used for progress comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum DurationSource {
    Fixed(f64),
    Probe(PathBuf),
}

impl Default for DurationSource {
    fn default() -> Self {
        DurationSource::Fixed(PLACEHOLDER_DURATION_SECS)
    }
}

impl DurationSource {
    /// Finds ffprobe: `explicit`, then a sibling of the encoder, then `PATH`.
    pub fn locate_probe(explicit: Option<&Path>, encoder: &Path) -> Result<Self, BatchError> {
        if let Some(path) = explicit {
            return match path.is_file() {
                true => Ok(DurationSource::Probe(path.to_path_buf())),
                false => Err(BatchError::ToolNotFound(format!("{}", path.display()))),
            };
        }

        if let Some(dir) = encoder.parent() {
            let sibling = dir.join(PROBE_NAME);
            if sibling.is_file() {
                return Ok(DurationSource::Probe(sibling));
            }
        }

        which::which(PROBE_NAME)
            .map(DurationSource::Probe)
            .map_err(|err| BatchError::ToolNotFound(format!("{}: {}", PROBE_NAME, err)))
    }

    pub fn resolve(&self, input: &Path) -> Option<f64> {
        match self {
            DurationSource::Fixed(secs) => Some(*secs),
            DurationSource::Probe(ffprobe) => match probe_duration(ffprobe, input) {
                Ok(secs) => {
                    debug!("probed duration of {:?}: {}s", input, secs);
                    Some(secs)
                },
                Err(err) => {
                    warn!("unable to probe duration of {:?} ({}); assuming {}s", input, err, PLACEHOLDER_DURATION_SECS);
                    Some(PLACEHOLDER_DURATION_SECS)
                },
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct FFProbeJsonOutput {
    pub format: FFProbeJsonFormat,
}

#[derive(Serialize, Deserialize, Debug)]
struct FFProbeJsonFormat {
    pub duration: Option<String>,
}

pub fn probe_duration(ffprobe: &Path, path: &Path) -> Result<f64, Box<dyn Error>> {
    let output = Command::new(ffprobe)
        .args([
            Path::new("-v"),
            Path::new("error"),
            Path::new("-show_entries"),
            Path::new("format=duration"),
            Path::new("-of"),
            Path::new("json"),
            path,
        ])
        .output()?;
    if output.status.success() {
        let utf8 = String::from_utf8(output.stdout)?;
        parse_probe_output(&utf8)
    } else {
        Err(Box::new(io::Error::new(io::ErrorKind::Other, format!("ffprobe exited with {}", output.status))))
    }
}

fn parse_probe_output(json: &str) -> Result<f64, Box<dyn Error>> {
    let deserialized = serde_json::from_str::<FFProbeJsonOutput>(json)?;
    match deserialized.format.duration {
        Some(duration) => Ok(duration.parse::<f64>()?),
        None => Err(Box::new(io::Error::new(io::ErrorKind::InvalidData, "ffprobe reported no duration"))),
    }
}
