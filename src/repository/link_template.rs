//! A minimal text-template engine for annotation-based generated links
//! (§4.1 `addGeneratedLinks`). Templates are compiled once, at
//! configuration load, so a malformed template fails fast instead of on
//! the first matching entity.
//!
//! Placeholders are `{{field}}` or `{{field|join:"sep"}}`; the latter is
//! the only supported pipeline, for multi-valued fields like `tags`.

use crate::error::CatalogError;

#[derive(Debug, Clone)]
enum Part {
    Literal(String),
    Scalar(String),
    Join(String, String),
}

#[derive(Debug, Clone)]
pub struct LinkTemplate {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub scalars: std::collections::BTreeMap<String, String>,
    pub lists: std::collections::BTreeMap<String, Vec<String>>,
}

impl TemplateContext {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.scalars.insert(key.into(), value.into());
        self
    }

    pub fn set_list(&mut self, key: impl Into<String>, values: Vec<String>) -> &mut Self {
        self.lists.insert(key.into(), values);
        self
    }
}

impl LinkTemplate {
    /// Parse and validate a template string, failing closed on any
    /// unbalanced or malformed placeholder.
    pub fn compile(src: &str) -> Result<Self, CatalogError> {
        let mut parts = Vec::new();
        let mut rest = src;
        loop {
            match rest.find("{{") {
                None => {
                    if !rest.is_empty() {
                        parts.push(Part::Literal(rest.to_string()));
                    }
                    break;
                }
                Some(start) => {
                    if start > 0 {
                        parts.push(Part::Literal(rest[..start].to_string()));
                    }
                    let after = &rest[start + 2..];
                    let end = after.find("}}").ok_or_else(|| {
                        CatalogError::syntax(format!("unterminated placeholder in template: {src}"))
                    })?;
                    let expr = after[..end].trim();
                    parts.push(Self::compile_placeholder(expr, src)?);
                    rest = &after[end + 2..];
                }
            }
        }
        Ok(LinkTemplate { parts })
    }

    fn compile_placeholder(expr: &str, src: &str) -> Result<Part, CatalogError> {
        if expr.is_empty() {
            return Err(CatalogError::syntax(format!("empty placeholder in template: {src}")));
        }
        match expr.split_once('|') {
            None => Ok(Part::Scalar(expr.to_string())),
            Some((field, pipeline)) => {
                let field = field.trim();
                let pipeline = pipeline.trim();
                let sep = pipeline
                    .strip_prefix("join:")
                    .ok_or_else(|| {
                        CatalogError::syntax(format!("unknown template pipeline '{pipeline}' in: {src}"))
                    })?
                    .trim();
                let sep = sep
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .ok_or_else(|| {
                        CatalogError::syntax(format!("join separator must be quoted in: {src}"))
                    })?;
                Ok(Part::Join(field.to_string(), sep.to_string()))
            }
        }
    }

    /// Render against a context. Unknown field names render as empty
    /// strings — the template's own syntax was validated at compile
    /// time; a missing value on a given entity is not a template error.
    pub fn render(&self, ctx: &TemplateContext) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Scalar(name) => {
                    if let Some(v) = ctx.scalars.get(name) {
                        out.push_str(v);
                    }
                }
                Part::Join(name, sep) => {
                    if let Some(v) = ctx.lists.get(name) {
                        out.push_str(&v.join(sep));
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_scalar_placeholders() {
        let t = LinkTemplate::compile("https://cat.example/{{namespace}}/{{name}}").unwrap();
        let mut ctx = TemplateContext::default();
        ctx.set("namespace", "default").set("name", "payments");
        assert_eq!(t.render(&ctx), "https://cat.example/default/payments");
    }

    #[test]
    fn renders_join_pipeline() {
        let t = LinkTemplate::compile("tags: {{tags|join:\", \"}}").unwrap();
        let mut ctx = TemplateContext::default();
        ctx.set_list("tags", vec!["go".into(), "payments".into()]);
        assert_eq!(t.render(&ctx), "tags: go, payments");
    }

    #[test]
    fn missing_value_renders_empty_not_error() {
        let t = LinkTemplate::compile("{{description}}").unwrap();
        let ctx = TemplateContext::default();
        assert_eq!(t.render(&ctx), "");
    }

    #[test]
    fn unterminated_placeholder_fails_to_compile() {
        assert!(LinkTemplate::compile("{{name").is_err());
    }

    #[test]
    fn unknown_pipeline_fails_to_compile() {
        assert!(LinkTemplate::compile("{{tags|upper}}").is_err());
    }

    #[test]
    fn unquoted_join_separator_fails_to_compile() {
        assert!(LinkTemplate::compile("{{tags|join:,}}").is_err());
    }
}
