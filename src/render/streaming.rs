//! Streaming `Run` implementation (§4.4): a single long-lived subprocess,
//! reused across calls to amortize startup cost. One mutex serialises
//! access — only one diagram renders at a time, matching the repository's
//! single-writer discipline in spirit.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::CatalogError;

use super::postprocess::postprocess;
use super::{RenderContext, Run};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct ChildHandle {
    child: Arc<Mutex<Child>>,
    stdin: ChildStdin,
    stdout: BufReader<std::process::ChildStdout>,
}

/// Serialises access to at most one live subprocess. `run` takes
/// `&self`, not `&mut self` — the mutex, not Rust's borrow checker, is
/// what enforces "only one diagram at a time" here.
pub struct StreamingRenderer {
    program: String,
    args: Vec<String>,
    handle: Mutex<Option<ChildHandle>>,
}

impl StreamingRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        StreamingRenderer {
            program: program.into(),
            args,
            handle: Mutex::new(None),
        }
    }

    fn spawn(&self) -> Result<ChildHandle, CatalogError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CatalogError::Subprocess(e.to_string()))?;
        let stdin = child.stdin.take().expect("piped");
        let stdout = BufReader::new(child.stdout.take().expect("piped"));
        Ok(ChildHandle {
            child: Arc::new(Mutex::new(child)),
            stdin,
            stdout,
        })
    }

    /// Terminate the live subprocess, if any. Idempotent.
    pub fn close(&self) {
        if let Some(handle) = self.handle.lock().expect("not poisoned").take() {
            if let Ok(mut c) = handle.child.lock() {
                let _ = c.kill();
                let _ = c.wait();
            }
        }
    }

    /// Write the source, then read line-by-line until one contains the
    /// SVG end marker. Either half failing desynchronises the pipe.
    fn exchange(handle: &mut ChildHandle, diagram_source: &str) -> Result<Vec<u8>, CatalogError> {
        writeln!(handle.stdin, "{diagram_source}").map_err(|e| CatalogError::Io(e.to_string()))?;
        handle.stdin.flush().map_err(|e| CatalogError::Io(e.to_string()))?;

        let mut out = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let n = handle
                .stdout
                .read_line(&mut line)
                .map_err(|e| CatalogError::Io(e.to_string()))?;
            if n == 0 {
                return Err(CatalogError::Subprocess(
                    "subprocess closed stdout before </svg>".into(),
                ));
            }
            out.extend_from_slice(line.as_bytes());
            if line.contains("</svg>") {
                return Ok(out);
            }
        }
    }

    fn exchange_with_watch(
        handle: &mut ChildHandle,
        ctx: &RenderContext,
        diagram_source: &str,
    ) -> Result<Vec<u8>, CatalogError> {
        let stop = Arc::new(AtomicBool::new(false));
        let killed = Arc::new(AtomicBool::new(false));
        let watcher = {
            let child = handle.child.clone();
            let stop = stop.clone();
            let killed = killed.clone();
            let cancel = ctx.cancel.clone();
            let deadline = ctx.deadline;
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                        if let Ok(mut c) = child.lock() {
                            let _ = c.kill();
                        }
                        killed.store(true, Ordering::Relaxed);
                        return;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })
        };

        let result = Self::exchange(handle, diagram_source);
        stop.store(true, Ordering::Relaxed);
        let _ = watcher.join();

        if killed.load(Ordering::Relaxed) {
            return if ctx.cancel.is_cancelled() {
                Err(CatalogError::Cancelled)
            } else {
                Err(CatalogError::Timeout)
            };
        }
        result
    }
}

impl Run for StreamingRenderer {
    fn run(&self, ctx: &RenderContext, diagram_source: &str) -> Result<Vec<u8>, CatalogError> {
        let mut guard = self.handle.lock().expect("not poisoned");
        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }

        let first = {
            let handle = guard.as_mut().expect("just ensured present");
            Self::exchange_with_watch(handle, ctx, diagram_source)
        };

        let bytes = match first {
            Ok(bytes) => bytes,
            Err(CatalogError::Cancelled) | Err(CatalogError::Timeout) => {
                // The pipe is desynchronised; drop the handle so the
                // next call respawns instead of reusing a dead process.
                *guard = None;
                return first;
            }
            Err(_) => {
                // Input/output failure: kill and restart once, surfacing
                // only the second attempt's failure.
                *guard = None;
                let respawned = self.spawn()?;
                *guard = Some(respawned);
                let handle = guard.as_mut().expect("just spawned");
                Self::exchange_with_watch(handle, ctx, diagram_source)?
            }
        };

        let out = postprocess(&bytes);
        if !out.starts_with(b"<svg") {
            return Err(CatalogError::Subprocess("malformed svg output".into()));
        }
        Ok(out)
    }
}

impl Drop for StreamingRenderer {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_via_cat_echo_pipeline() {
        // `cat` behaves as a trivial "echo back the source, plus an SVG
        // terminator" stand-in for the external layout tool: it never
        // emits `</svg>` on its own, so this test instead exercises
        // `close()` being idempotent and safe with no live subprocess.
        let r = StreamingRenderer::new("cat", vec![]);
        r.close();
        r.close();
    }
}
