use std::io::{self, Read};

use once_cell::sync::Lazy;
use regex::Regex;

static TIME_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time=(\S*)").expect("time marker pattern is valid")
});

/// Elapsed seconds from the first `time=HH:MM:SS.ff` marker in `chunk`.
pub fn parse_time(chunk: &str) -> Option<f64> {
    TIME_MARKER
        .captures(chunk)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_time_string(m.as_str()))
}

/// `H:M:S.f` to seconds. Empty pieces between colons are skipped, then
/// exactly three parts must remain; a part that isn't a number counts as zero.
pub fn parse_time_string(time: &str) -> Option<f64> {
    let parts: Vec<f64> = time
        .split(':')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>().unwrap_or(0.0))
        .collect();
    if parts.len() != 3 {
        return None;
    }
    Some(parts[0] * 3600.0 + parts[1] * 60.0 + parts[2])
}

pub fn calculate_progress(current_time: f64, duration: f64) -> Option<f64> {
    if duration > 0.0 {
        Some((current_time / duration).clamp(0.0, 1.0))
    } else {
        None
    }
}

pub fn overall_progress(index: usize, total: usize, file_progress: f64) -> f64 {
    match total {
        0 => 1.0,
        _ => ((index as f64) + file_progress) / (total as f64),
    }
}

/// Per-file progress carried by a single chunk, if any.
pub fn chunk_progress(chunk: &str, duration: Option<f64>) -> Option<f64> {
    let elapsed = parse_time(chunk)?;
    calculate_progress(elapsed, duration?)
}

/// Splits a byte stream into text chunks on `\r` or `\n` as data arrives.
/// ffmpeg redraws its status line with `\r`, so each redraw is one chunk.
pub struct ChunkReader<R> {
    inner: R,
    pending: Vec<u8>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        ChunkReader {
            inner,
            pending: vec![],
            buf: vec![0; 4096],
            done: false,
        }
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == b'\r' || *b == b'\n') {
                let chunk: Vec<u8> = self.pending.drain(..=pos).collect();
                if pos == 0 {
                    continue;
                }
                return Some(String::from_utf8_lossy(&chunk[..pos]).into_owned());
            }

            if self.done {
                if self.pending.is_empty() {
                    return None;
                }
                let rest = std::mem::take(&mut self.pending);
                return Some(String::from_utf8_lossy(&rest).into_owned());
            }

            match self.inner.read(&mut self.buf) {
                Ok(0) => self.done = true,
                Ok(n) => self.pending.extend_from_slice(&self.buf[..n]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => self.done = true,
            }
        }
    }
}
