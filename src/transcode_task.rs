use std::path::{Path, PathBuf};

use crate::bitrate::Bitrate;
use crate::error::InputParseError;
use crate::fstools::output_path;
use crate::media::MediaKind;

/// One user-initiated run: the inputs in the order they were picked, the
/// bitrate and the destination. Immutable once built.
#[derive(Clone, Debug)]
pub struct TranscodeJob {
    inputs: Vec<PathBuf>,
    bitrate: Bitrate,
    destination: PathBuf,
}

impl TranscodeJob {
    pub fn new(inputs: Vec<PathBuf>, bitrate: Bitrate, destination: PathBuf) -> Result<Self, InputParseError> {
        if inputs.is_empty() {
            return Err(InputParseError::NoInputs);
        }
        Ok(TranscodeJob { inputs, bitrate, destination })
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn bitrate(&self) -> Bitrate {
        self.bitrate
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn tasks_into(&self, destination: &Path) -> Vec<TranscodeTask> {
        self.inputs
            .iter()
            .enumerate()
            .map(|(index, source)| TranscodeTask::new(index, source.clone(), destination, self.bitrate))
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct TranscodeTask {
    pub index: usize,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: MediaKind,
    pub bitrate: Bitrate,
}

impl TranscodeTask {
    pub fn new(index: usize, source: PathBuf, destination_dir: &Path, bitrate: Bitrate) -> Self {
        TranscodeTask {
            index,
            destination: output_path(destination_dir, &source),
            kind: MediaKind::classify(&source),
            source,
            bitrate,
        }
    }

    pub fn file_name(&self) -> String {
        match self.source.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.source.display().to_string(),
        }
    }
}
