//! The rendering pipeline (§4.4): wraps an external layout tool that
//! reads a diagram source on stdin and writes SVG on stdout. Two real
//! implementations share one interface; a third, [`null::NullRenderer`],
//! is a fixed-output test double for exercising the Diagram Builder →
//! Rendering Pipeline seam without the external binary installed.

mod null;
mod percall;
mod postprocess;
mod streaming;

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::CatalogError;

pub use null::NullRenderer;
pub use percall::PerCallRenderer;
pub use streaming::StreamingRenderer;

/// A deadline for one render call, alongside its cancellation signal.
/// Plain `Instant` arithmetic — not a crate-worthy concern on its own.
pub struct RenderContext {
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

impl RenderContext {
    pub fn new() -> Self {
        RenderContext {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        RenderContext {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared contract between the per-call, streaming, and null renderers.
pub trait Run {
    fn run(&self, ctx: &RenderContext, diagram_source: &str) -> Result<Vec<u8>, CatalogError>;
}
