//! A fixed-output `Run` implementation, useful for exercising the
//! diagram-builder-to-rendering-pipeline seam without an external layout
//! binary installed.

use crate::error::CatalogError;

use super::{RenderContext, Run};

const PLACEHOLDER_SVG: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\"><text>catalog-core placeholder</text></svg>";

#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Run for NullRenderer {
    fn run(&self, _ctx: &RenderContext, _diagram_source: &str) -> Result<Vec<u8>, CatalogError> {
        Ok(PLACEHOLDER_SVG.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_returns_the_placeholder() {
        let r = NullRenderer;
        let out = r.run(&RenderContext::new(), "digraph {}").unwrap();
        assert!(String::from_utf8(out).unwrap().contains("<svg"));
    }
}
