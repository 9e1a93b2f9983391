//! Per-call `Run` implementation (§4.4): spawn one process per request,
//! write the diagram source to its stdin, capture combined stdout+stderr
//! (the noise ends up before `<svg`, which postprocessing already
//! strips), and kill on cancellation or deadline expiry.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::CatalogError;

use super::postprocess::postprocess;
use super::{RenderContext, Run};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct PerCallRenderer {
    program: String,
    args: Vec<String>,
}

impl PerCallRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        PerCallRenderer {
            program: program.into(),
            args,
        }
    }

    fn spawn(&self) -> Result<Child, CatalogError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CatalogError::Subprocess(e.to_string()))
    }
}

impl Run for PerCallRenderer {
    fn run(&self, ctx: &RenderContext, diagram_source: &str) -> Result<Vec<u8>, CatalogError> {
        let mut child = self.spawn()?;
        let mut stdin = child.stdin.take().expect("piped");
        let mut stdout = child.stdout.take().expect("piped");
        let mut stderr = child.stderr.take().expect("piped");

        let source = diagram_source.to_string();
        let writer = thread::spawn(move || {
            let _ = stdin.write_all(source.as_bytes());
        });
        let stdout_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout.read_to_end(&mut buf);
            buf
        });
        let stderr_reader = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            buf
        });

        let stop = Arc::new(AtomicBool::new(false));
        let killed = Arc::new(AtomicBool::new(false));
        let child = Arc::new(Mutex::new(child));
        let watcher = {
            let child = child.clone();
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

        let _ = writer.join();
        let status = child.lock().expect("not poisoned").wait();
        stop.store(true, Ordering::Relaxed);
        let _ = watcher.join();

        let mut combined = stdout_reader.join().unwrap_or_default();
        combined.extend(stderr_reader.join().unwrap_or_default());

        if killed.load(Ordering::Relaxed) {
            return if ctx.cancel.is_cancelled() {
                Err(CatalogError::Cancelled)
            } else {
                Err(CatalogError::Timeout)
            };
        }

        let status = status.map_err(|e| CatalogError::Subprocess(e.to_string()))?;
        if !status.success() {
            return Err(CatalogError::Subprocess(format!(
                "exit status {status}: {}",
                String::from_utf8_lossy(&combined)
            )));
        }

        let out = postprocess(&combined);
        if !out.starts_with(b"<svg") {
            return Err(CatalogError::Subprocess("malformed svg output".into()));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_program_and_postprocesses_output() {
        let r = PerCallRenderer::new("printf", vec!["<svg><title>x</title><rect/></svg>".to_string()]);
        let out = r.run(&RenderContext::new(), "digraph {}").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<svg><rect/></svg>");
    }

    #[test]
    fn nonzero_exit_is_subprocess_error() {
        let r = PerCallRenderer::new("false", vec![]);
        let err = r.run(&RenderContext::new(), "digraph {}").unwrap_err();
        assert!(matches!(err, CatalogError::Subprocess(_)));
    }

    #[test]
    fn cancellation_before_spawn_completes_is_reported() {
        let r = PerCallRenderer::new("sleep", vec!["2".to_string()]);
        let ctx = RenderContext::new();
        ctx.cancel.cancel();
        let err = r.run(&ctx, "digraph {}").unwrap_err();
        assert!(matches!(err, CatalogError::Cancelled));
    }
}
