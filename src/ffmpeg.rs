// src/ffmpeg.rs

use crate::error::{Result, VmafCmpError};
use log::{debug, error, info};
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

/// Lines of stderr kept in an [`VmafCmpError::EngineInvocation`].
const STDERR_TAIL_LINES: usize = 20;

/// What a finished FFmpeg run left behind.
#[derive(Debug)]
pub struct EngineOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Where FFmpeg writes the (discarded) encoded output.
pub fn null_sink() -> &'static str {
    if cfg!(windows) { "NUL" } else { "/dev/null" }
}

/// Arguments for one comparison. The reference is always input 0 and the
/// candidate input 1, whichever of them is converted.
pub fn build_args(
    reference: &Path,
    candidate: &Path,
    filter_complex: &str,
    threads: usize,
) -> Vec<OsString> {
    let threads = threads.to_string();
    let mut args: Vec<OsString> = Vec::new();

    extend(&mut args, &["-hide_banner", "-v", "info", "-stats", "-hwaccel", "auto"]);
    for input in [reference, candidate] {
        extend(&mut args, &[
            "-threads", &threads,
            "-strict", "strict",
            "-hwaccel_flags", "+allow_high_depth",
            "-i",
        ]);
        args.push(input.as_os_str().to_os_string());
    }
    extend(&mut args, &[
        "-sws_flags", "bicubic+full_chroma_inp+full_chroma_int",
        "-threads", &threads,
        "-filter_threads", &threads,
        "-filter_complex_threads", &threads,
        "-filter_complex", filter_complex,
        "-f", "null", null_sink(),
    ]);
    args
}

fn extend(args: &mut Vec<OsString>, values: &[&str]) {
    args.extend(values.iter().map(OsString::from));
}

/// Runs FFmpeg to completion for `candidate`.
///
/// Both output streams are drained while the process runs; each chunk is
/// echoed to the console when `echo` is set and kept for the result.
pub fn run_ffmpeg(
    ffmpeg: &Path,
    args: &[OsString],
    echo: bool,
    candidate: &Path,
) -> Result<EngineOutput> {
    debug!(
        "Running: {} {}",
        ffmpeg.display(),
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let start_time = std::time::Instant::now();
    let mut child = Command::new(ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            error!("Failed to launch {}: {}", ffmpeg.display(), e);
            VmafCmpError::EngineInvocation {
                path: candidate.display().to_string(),
                code: None,
                stderr: format!("failed to launch {}: {}", ffmpeg.display(), e),
            }
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

    let stdout_handle = thread::spawn(move || pump(stdout, echo.then(io::stdout)));
    let stderr_handle = thread::spawn(move || pump(stderr, echo.then(io::stderr)));

    let status = child.wait()?;
    let stdout = join_pump(stdout_handle)?;
    let stderr = join_pump(stderr_handle)?;
    let duration = start_time.elapsed();

    if !status.success() {
        error!(
            "FFmpeg failed for {} after {}ms ({})",
            candidate.display(),
            duration.as_millis(),
            status
        );
        return Err(VmafCmpError::EngineInvocation {
            path: candidate.display().to_string(),
            code: status.code(),
            stderr: tail(&stderr, STDERR_TAIL_LINES),
        });
    }

    info!(
        "FFmpeg finished for {} ({}ms)",
        candidate.display(),
        duration.as_millis()
    );
    Ok(EngineOutput {
        status,
        stdout,
        stderr,
    })
}

/// Copies `reader` into a buffer chunk by chunk, echoing to `sink` if given.
fn pump<R: Read, W: Write>(mut reader: R, mut sink: Option<W>) -> io::Result<Vec<u8>> {
    let mut collected = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if let Some(sink) = sink.as_mut() {
            // A closed console must not stop the comparison.
            let _ = sink.write_all(&chunk[..read]).and_then(|_| sink.flush());
        }
        collected.extend_from_slice(&chunk[..read]);
    }
    Ok(collected)
}

fn join_pump(handle: thread::JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| io::Error::other("output reader thread panicked"))?
        .map_err(VmafCmpError::from)
}

fn tail(bytes: &[u8], lines: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    // -stats redraws its progress line with carriage returns.
    let all: Vec<&str> = text
        .split(['\n', '\r'])
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
