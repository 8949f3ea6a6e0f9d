use std::io::Read;
use std::process::Stdio;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::error::TranscodeError;
use crate::ffmpeg::Encoder;
use crate::ffmpeg::progress::{chunk_progress, ChunkReader};
use crate::transcode_state::FileState;
use crate::transcode_task::TranscodeTask;

/// Runs the encoder for one task at a time.
pub struct Transcoder<'a> {
    encoder: &'a Encoder,
}

impl<'a> Transcoder<'a> {
    pub fn new(encoder: &'a Encoder) -> Self {
        Transcoder { encoder }
    }

    /// Starts the encoder, feeds `on_progress` the per-file fraction for every
    /// chunk of output that carries a time marker, and blocks until it exits.
    pub fn transcode<F>(&self, task: &TranscodeTask, duration: Option<f64>, mut on_progress: F) -> Result<(), TranscodeError>
    where
        F: FnMut(f64),
    {
        let mut state = FileState::Starting;
        debug!("{} {}", self.encoder.path().display(),
            self.encoder.args(task).iter().map(|s| format!("{:?}", s)).collect::<Vec<String>>().join(" "));

        let mut child = self.encoder.command(task)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TranscodeError::Launch { path: task.source.clone(), source })?;

        // stdout and stderr land in one channel, in arrival order
        let (tx, rx) = mpsc::channel();
        let mut readers = vec![];
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_chunks(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_chunks(stderr, tx.clone()));
        }
        drop(tx);

        for chunk in rx {
            if state == FileState::Starting {
                state = FileState::Streaming;
                debug!("{}: {}", task.file_name(), state);
            }
            if let Some(progress) = chunk_progress(&chunk, duration) {
                on_progress(progress);
            }
        }

        let status = child.wait();
        for reader in readers {
            let _ = reader.join();
        }

        let status = status.map_err(|source| TranscodeError::Wait { path: task.source.clone(), source })?;
        let result = match status.success() {
            true => Ok(()),
            false => match status.code() {
                Some(code) => Err(TranscodeError::Exit { path: task.source.clone(), code }),
                None => Err(TranscodeError::Terminated { path: task.source.clone() }),
            },
        };

        state = match result {
            Ok(_) => FileState::Finished,
            Err(_) => FileState::Failed,
        };
        info!("{}: {}", task.file_name(), state);
        result
    }
}

fn forward_chunks<R>(stream: R, tx: Sender<String>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        for chunk in ChunkReader::new(stream) {
            if tx.send(chunk).is_err() {
                break;
            }
        }
    })
}
