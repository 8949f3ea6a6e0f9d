use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;

static PROCESS_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Serializes tests that write and then exec scripts; a fork from a parallel
/// test can briefly hold the script open for writing (ETXTBSY).
pub fn process_lock() -> MutexGuard<'static, ()> {
    PROCESS_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes an executable stand-in for ffmpeg into `dir`.
///
/// Every invocation appends its input path (`$3`) to `calls.log` in `dir`,
/// then runs `body`. Arguments follow `-y -i <in> <flag> <rate> <out>`.
pub fn fake_encoder(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("ffmpeg");
    let log = dir.join("calls.log");
    let script = format!("#!/bin/sh\necho \"$3\" >> '{}'\n{}", log.display(), body);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn calls(dir: &Path) -> Vec<PathBuf> {
    match fs::read_to_string(dir.join("calls.log")) {
        Ok(log) => log.lines().map(PathBuf::from).collect(),
        Err(_) => vec![],
    }
}
