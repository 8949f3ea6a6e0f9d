use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{info, warn};

use crate::error::BatchError;
use crate::ffmpeg::Encoder;
use crate::ffmpeg::probe::DurationSource;
use crate::ffmpeg::progress::overall_progress;
use crate::fstools::OutputDirectory;
use crate::transcode_state::{AbortReason, BatchState, ProgressState};
use crate::transcode_task::TranscodeJob;
use crate::transcoder::Transcoder;

pub const STARTING_MESSAGE: &str = "Starting compression...";
pub const TOOL_NOT_FOUND_MESSAGE: &str = "ffmpeg not found.";
pub const PERMISSION_DENIED_MESSAGE: &str = "Permission denied for output folder.";
pub const COMPLETE_MESSAGE: &str = "Compression complete";

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    pub progress: f64,
    pub message: String,
}

/// Receives `(progress, message)` pairs from a running batch. Called from
/// the batch's own thread, possibly many times a second.
pub trait ProgressSink {
    fn update(&mut self, progress: f64, message: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(f64, &str) + ?Sized,
{
    fn update(&mut self, progress: f64, message: &str) {
        (*self)(progress, message)
    }
}

/// Hands updates to another thread. A hung-up receiver is ignored so the
/// batch still runs to completion.
pub struct ChannelSink(Sender<ProgressUpdate>);

impl From<Sender<ProgressUpdate>> for ChannelSink {
    fn from(tx: Sender<ProgressUpdate>) -> Self {
        ChannelSink(tx)
    }
}

impl ProgressSink for ChannelSink {
    fn update(&mut self, progress: f64, message: &str) {
        let _ = self.0.send(ProgressUpdate {
            progress,
            message: String::from(message),
        });
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub attempted: usize,
    pub outputs: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs every file of a job through the encoder, one after another, in the
/// order given.
pub struct BatchProcessor {
    duration: DurationSource,
    progress: ProgressState,
    state: BatchState,
}

impl BatchProcessor {
    pub fn new(duration: DurationSource) -> Self {
        BatchProcessor {
            duration,
            progress: ProgressState::new(),
            state: BatchState::Idle,
        }
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn run_batch<S>(&mut self, job: &TranscodeJob, encoder_path: Option<&Path>, sink: &mut S) -> Result<BatchReport, BatchError>
    where
        S: ProgressSink + ?Sized,
    {
        self.progress.reset(STARTING_MESSAGE);
        sink.update(self.progress.progress(), self.progress.message());

        let encoder = match Encoder::locate(encoder_path) {
            Ok(encoder) => encoder,
            Err(err) => return Err(self.abort(err, AbortReason::ToolNotFound, TOOL_NOT_FOUND_MESSAGE, sink)),
        };

        // held until the end of this function, error paths included
        let output_dir = match OutputDirectory::acquire(job.destination()) {
            Ok(dir) => dir,
            Err(err) => return Err(self.abort(err, AbortReason::PermissionDenied, PERMISSION_DENIED_MESSAGE, sink)),
        };

        self.state = BatchState::Running;
        info!("compressing {} file(s) at {} into {:?}", job.len(), job.bitrate(), output_dir.path());

        let transcoder = Transcoder::new(&encoder);
        let total = job.len();
        let mut report = BatchReport::default();
        for task in job.tasks_into(output_dir.path()) {
            if let Err(err) = output_dir.verify() {
                for output in &report.outputs {
                    warn!("kept {:?} from before the output folder went away", output);
                }
                return Err(self.abort(err, AbortReason::PermissionDenied, PERMISSION_DENIED_MESSAGE, sink));
            }

            info!("[{}/{}] {} {:?} -> {:?}", task.index + 1, total, task.kind, task.source, task.destination);
            report.attempted += 1;
            let name = task.file_name();
            let duration = self.duration.resolve(&task.source);
            let progress = &mut self.progress;
            let result = transcoder.transcode(&task, duration, |file_progress| {
                let overall = progress.advance(overall_progress(task.index, total, file_progress), "");
                let message = format!("Compressing {}: {}%", name, progress.percent());
                progress.set_message(&message);
                sink.update(overall, &message);
            });

            match result {
                Ok(()) => report.outputs.push(task.destination.clone()),
                Err(err) => {
                    warn!("{}", err);
                    let message = format!("Failed to run ffmpeg on {}: {}", name, err.reason());
                    self.progress.set_message(&message);
                    sink.update(self.progress.progress(), &message);
                    report.failures.push((task.source.clone(), err.reason()));
                },
            }
        }
        drop(output_dir);

        self.progress.advance(1.0, COMPLETE_MESSAGE);
        sink.update(self.progress.progress(), self.progress.message());
        self.state = BatchState::Completed;
        info!("batch finished: {} ok, {} failed", report.outputs.len(), report.failures.len());
        Ok(report)
    }

    fn abort<S>(&mut self, err: BatchError, reason: AbortReason, message: &str, sink: &mut S) -> BatchError
    where
        S: ProgressSink + ?Sized,
    {
        warn!("{}", err);
        self.progress.set_message(message);
        sink.update(self.progress.progress(), message);
        self.state = BatchState::Aborted(reason);
        err
    }
}

/// Convenience entry point using the placeholder duration.
pub fn run_batch<S>(job: &TranscodeJob, encoder_path: Option<&Path>, sink: &mut S) -> Result<BatchReport, BatchError>
where
    S: ProgressSink + ?Sized,
{
    BatchProcessor::new(DurationSource::default()).run_batch(job, encoder_path, sink)
}

/// Starts batches on a background thread and refuses to start a second one
/// while the first is still going.
#[derive(Clone, Default)]
pub struct Orchestrator {
    running: Arc<AtomicBool>,
}

struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Orchestrator::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn spawn(
        &self,
        job: TranscodeJob,
        encoder_path: Option<PathBuf>,
        duration: DurationSource,
        tx: Sender<ProgressUpdate>,
    ) -> Result<JoinHandle<Result<BatchReport, BatchError>>, BatchError> {
        if self.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(BatchError::AlreadyRunning);
        }
        let guard = RunningGuard(Arc::clone(&self.running));

        thread::Builder::new()
            .name(String::from("compressr-batch"))
            .spawn(move || {
                let _guard = guard;
                let mut sink = ChannelSink::from(tx);
                BatchProcessor::new(duration).run_batch(&job, encoder_path.as_deref(), &mut sink)
            })
            .map_err(BatchError::Worker)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;
    use crate::bitrate::Bitrate;
    use crate::test_support::{calls, fake_encoder, process_lock};

    struct Fixture {
        tmp: TempDir,
        out: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let out = tmp.path().join("out");
            fs::create_dir(&out).unwrap();
            Fixture { tmp, out }
        }

        fn inputs(&self, names: &[&str]) -> Vec<PathBuf> {
            names.iter().map(|n| {
                let p = self.tmp.path().join(n);
                fs::write(&p, "media").unwrap();
                p
            }).collect()
        }

        fn job(&self, names: &[&str]) -> TranscodeJob {
            TranscodeJob::new(self.inputs(names), Bitrate::default(), self.out.clone()).unwrap()
        }
    }

    fn collect<F>(run: F) -> (Result<BatchReport, BatchError>, Vec<(f64, String)>)
    where
        F: FnOnce(&mut dyn FnMut(f64, &str)) -> Result<BatchReport, BatchError>,
    {
        let mut updates = vec![];
        let result = {
            let mut sink = |p: f64, m: &str| updates.push((p, String::from(m)));
            run(&mut sink)
        };
        (result, updates)
    }

    const TIME_BY_INPUT: &str = r#"
case "$(basename "$3")" in
    *one*) printf 'time=00:00:30.00 \r' 1>&2 ; printf 'time=00:01:30.00 \r' 1>&2 ;;
    *two*) printf 'time=00:00:30.00 \r' 1>&2 ;;
    *three*) printf 'garbage\r' 1>&2 ; printf 'time=00:00:45.00 \r' 1>&2 ;;
esac
printf 'x' > "$6"
"#;

    #[test]
    fn test_runs_each_file_once_in_order() {
        let _lock = process_lock();
        let f = Fixture::new();
        let encoder = fake_encoder(f.tmp.path(), TIME_BY_INPUT);
        let job = f.job(&["one.mp3", "two.mov", "three.wav"]);

        let (result, updates) = collect(|sink| run_batch(&job, Some(encoder.as_path()), sink));
        let report = result.unwrap();

        assert_eq!(calls(f.tmp.path()), job.inputs().to_vec());
        assert_eq!(report.attempted, 3);
        assert!(report.is_success());
        assert_eq!(report.outputs, vec![
            f.out.join("Compressed-one.mp3"),
            f.out.join("Compressed-two.mov"),
            f.out.join("Compressed-three.wav"),
        ]);
        assert!(f.out.join("Compressed-two.mov").exists());

        let progress: Vec<f64> = updates.iter().map(|(p, _)| *p).collect();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {:?}", progress);
        assert_eq!(updates.first().unwrap(), &(0.0, String::from(STARTING_MESSAGE)));
        assert_eq!(updates.last().unwrap(), &(1.0, String::from(COMPLETE_MESSAGE)));

        // file index 1 of 3, 30s of 60s
        assert!(updates.contains(&(0.5, String::from("Compressing two.mov: 50%"))));
        // marker past the duration clamps to the end of file 0
        assert!(updates.iter().any(|(p, m)| *p == 1.0 / 3.0 && m == "Compressing one.mp3: 33%"));
        // the garbage chunk adds nothing: start, 2 + 1 + 1 markers, complete
        assert_eq!(updates.len(), 6);
    }

    #[test]
    fn test_failed_file_does_not_stop_the_batch() {
        let _lock = process_lock();
        let f = Fixture::new();
        let encoder = fake_encoder(f.tmp.path(), "case \"$(basename \"$3\")\" in bad*) exit 1 ;; esac\n");
        let job = f.job(&["a.mp3", "bad.mp4", "c.m4a"]);

        let (result, updates) = collect(|sink| run_batch(&job, Some(encoder.as_path()), sink));
        let report = result.unwrap();

        assert_eq!(calls(f.tmp.path()), job.inputs().to_vec());
        assert_eq!(report.attempted, 3);
        assert!(!report.is_success());
        assert_eq!(report.failures, vec![(job.inputs()[1].clone(), String::from("exited with 1"))]);
        assert_eq!(report.outputs.len(), 2);
        assert!(updates.iter().any(|(_, m)| m == "Failed to run ffmpeg on bad.mp4: exited with 1"));
        assert_eq!(updates.last().unwrap(), &(1.0, String::from(COMPLETE_MESSAGE)));
    }

    #[test]
    fn test_missing_encoder_launches_nothing() {
        let f = Fixture::new();
        let job = f.job(&["a.mp3"]);
        let mut processor = BatchProcessor::new(DurationSource::default());

        let missing = f.tmp.path().join("no-ffmpeg");
        let (result, updates) = collect(|sink| processor.run_batch(&job, Some(missing.as_path()), sink));

        assert!(matches!(result, Err(BatchError::ToolNotFound(_))));
        assert_eq!(processor.state(), &BatchState::Aborted(AbortReason::ToolNotFound));
        assert_eq!(updates.last().unwrap(), &(0.0, String::from(TOOL_NOT_FOUND_MESSAGE)));
        assert!(calls(f.tmp.path()).is_empty());
        assert!(fs::read_dir(&f.out).unwrap().next().is_none());
    }

    #[test]
    fn test_missing_destination_is_permission_denied() {
        let _lock = process_lock();
        let f = Fixture::new();
        let encoder = fake_encoder(f.tmp.path(), "");
        let job = TranscodeJob::new(f.inputs(&["a.mp3"]), Bitrate::default(), f.tmp.path().join("gone")).unwrap();
        let mut processor = BatchProcessor::new(DurationSource::default());

        let (result, updates) = collect(|sink| processor.run_batch(&job, Some(encoder.as_path()), sink));

        assert!(matches!(result, Err(BatchError::PermissionDenied { .. })));
        assert_eq!(processor.state(), &BatchState::Aborted(AbortReason::PermissionDenied));
        assert_eq!(updates.last().unwrap().1, PERMISSION_DENIED_MESSAGE);
        assert!(calls(f.tmp.path()).is_empty());
    }

    #[test]
    fn test_output_removed_mid_run_stops_the_batch() {
        let _lock = process_lock();
        let f = Fixture::new();
        let encoder = fake_encoder(f.tmp.path(), "case \"$(basename \"$3\")\" in a*) rm -rf \"$(dirname \"$6\")\" ;; esac\n");
        let job = f.job(&["a.mp3", "b.mp3", "c.mp3"]);
        let mut processor = BatchProcessor::new(DurationSource::default());

        let (result, updates) = collect(|sink| processor.run_batch(&job, Some(encoder.as_path()), sink));

        assert!(matches!(result, Err(BatchError::PermissionDenied { .. })));
        assert_eq!(processor.state(), &BatchState::Aborted(AbortReason::PermissionDenied));
        assert_eq!(calls(f.tmp.path()), vec![job.inputs()[0].clone()]);
        assert_eq!(updates.last().unwrap().1, PERMISSION_DENIED_MESSAGE);
        assert!(updates.iter().all(|(_, m)| m != COMPLETE_MESSAGE));
        assert!(!f.out.exists());
    }

    #[test]
    fn test_zero_duration_reports_no_file_progress() {
        let _lock = process_lock();
        let f = Fixture::new();
        let encoder = fake_encoder(f.tmp.path(), "printf 'time=00:00:10.00\\r' 1>&2\n");
        let job = f.job(&["a.mp3"]);
        let mut processor = BatchProcessor::new(DurationSource::Fixed(0.0));

        let (result, updates) = collect(|sink| processor.run_batch(&job, Some(encoder.as_path()), sink));

        assert!(result.unwrap().is_success());
        assert_eq!(updates, vec![
            (0.0, String::from(STARTING_MESSAGE)),
            (1.0, String::from(COMPLETE_MESSAGE)),
        ]);
        assert_eq!(processor.state(), &BatchState::Completed);
        assert_eq!(processor.progress().progress(), 1.0);
    }

    #[test]
    fn test_orchestrator_allows_one_batch_at_a_time() {
        let _lock = process_lock();
        let f = Fixture::new();
        let encoder = fake_encoder(f.tmp.path(), "sleep 1\n");
        let orchestrator = Orchestrator::new();
        let (tx, rx) = mpsc::channel();

        let handle = orchestrator
            .spawn(f.job(&["a.mp3"]), Some(encoder.clone()), DurationSource::default(), tx.clone())
            .unwrap();
        assert!(orchestrator.is_running());
        assert!(matches!(
            orchestrator.spawn(f.job(&["b.mp3"]), Some(encoder.clone()), DurationSource::default(), tx.clone()),
            Err(BatchError::AlreadyRunning)));

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.attempted, 1);
        assert!(!orchestrator.is_running());
        drop(tx);

        let updates: Vec<ProgressUpdate> = rx.iter().collect();
        assert_eq!(updates.last().unwrap().message, COMPLETE_MESSAGE);
        assert_eq!(calls(f.tmp.path()), vec![f.tmp.path().join("a.mp3")]);
    }

    #[test]
    fn test_orchestrator_released_after_abort() {
        let f = Fixture::new();
        let orchestrator = Orchestrator::new();
        let (tx, _rx) = mpsc::channel();
        let missing = Some(f.tmp.path().join("no-ffmpeg"));

        let handle = orchestrator.spawn(f.job(&["a.mp3"]), missing.clone(), DurationSource::default(), tx.clone()).unwrap();
        assert!(matches!(handle.join().unwrap(), Err(BatchError::ToolNotFound(_))));
        assert!(!orchestrator.is_running());

        let handle = orchestrator.spawn(f.job(&["a.mp3"]), missing, DurationSource::default(), tx).unwrap();
        assert!(handle.join().unwrap().is_err());
    }
}
