//! Build-script execution with dual-sink output streaming.
//!
//! A build script's combined stdout/stderr is streamed simultaneously to the
//! invoking console and to a per-package log file. Both sinks see the same
//! bytes: a single fan-out writer dispatches every chunk to every sink, and
//! a failed sink write surfaces as a stream fault rather than being dropped.
//! Nothing is buffered beyond one chunk, so arbitrarily large build logs
//! stream through in constant memory.
//!
//! One reader thread per pipe feeds the shared writer; the pipes drain to
//! EOF before the child is reaped, so no output is lost on fast exits.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use thiserror::Error;

/// Errors from launching or streaming a build script.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start build script {script}: {source}")]
    Spawn {
        script: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O fault while streaming build output: {0}")]
    Stream(#[from] io::Error),
}

/// Writer that duplicates every write to all of its sinks.
///
/// Policy on sink failure: the write is aborted and the error propagates to
/// the caller; later sinks in the list do not receive the chunk. Sinks never
/// silently diverge — a fault either stops the stream or touched nothing.
pub struct FanoutWriter {
    sinks: Vec<Box<dyn Write + Send>>,
}

impl FanoutWriter {
    pub fn new(sinks: Vec<Box<dyn Write + Send>>) -> Self {
        Self { sinks }
    }
}

impl Write for FanoutWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in &mut self.sinks {
            sink.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

/// Run `sh <script>` in `package_dir` with the given extra environment,
/// streaming combined output to `console` and to a fresh log file at
/// `log_path`.
///
/// Returns the child's exit status; judging a non-success status is the
/// caller's business. A spawn failure or a sink write failure is an error
/// here, distinct from the script failing.
pub fn run_build(
    script: &Path,
    package_dir: &Path,
    env: &[(String, String)],
    console: Box<dyn Write + Send>,
    log_path: &Path,
) -> Result<ExitStatus, ExecError> {
    let log = File::create(log_path)?;
    let sink = Arc::new(Mutex::new(FanoutWriter::new(vec![
        console,
        Box::new(log),
    ])));

    let mut command = Command::new("sh");
    command
        .arg(script)
        .current_dir(package_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in env {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(|source| ExecError::Spawn {
        script: script.display().to_string(),
        source,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_pump = pump_stdout(stdout, Arc::clone(&sink));
    let err_pump = pump_stderr(stderr, Arc::clone(&sink));

    // A dead pump stops draining its pipe, so the child must be killed
    // before joining the other pump or it can block on a full pipe forever.
    if let Err(e) = join_pump(out_pump) {
        let _ = child.kill();
        let _ = join_pump(err_pump);
        let _ = child.wait();
        return Err(e);
    }
    if let Err(e) = join_pump(err_pump) {
        let _ = child.kill();
        let _ = child.wait();
        return Err(e);
    }
    let status = child.wait()?;

    if let Ok(mut writer) = sink.lock() {
        writer.flush()?;
    }

    Ok(status)
}

fn pump_stdout(
    pipe: Option<ChildStdout>,
    sink: Arc<Mutex<FanoutWriter>>,
) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || match pipe {
        Some(pipe) => pump(pipe, sink),
        None => Ok(()),
    })
}

fn pump_stderr(
    pipe: Option<ChildStderr>,
    sink: Arc<Mutex<FanoutWriter>>,
) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || match pipe {
        Some(pipe) => pump(pipe, sink),
        None => Ok(()),
    })
}

/// Copy a pipe to the shared writer chunk by chunk until EOF.
fn pump<R: Read>(mut pipe: R, sink: Arc<Mutex<FanoutWriter>>) -> io::Result<()> {
    let mut buf = [0u8; 8 * 1024];
    loop {
        let n = pipe.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        let mut writer = sink
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "output writer poisoned"))?;
        writer.write_all(&buf[..n])?;
    }
}

fn join_pump(handle: JoinHandle<io::Result<()>>) -> Result<(), ExecError> {
    match handle.join() {
        Ok(result) => Ok(result?),
        Err(_) => Err(ExecError::Stream(io::Error::new(
            io::ErrorKind::Other,
            "output pump thread panicked",
        ))),
    }
}
