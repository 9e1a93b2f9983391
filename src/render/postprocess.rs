//! SVG postprocessing shared by every `Run` implementation (§4.4):
//! strip everything before `<svg`, drop `<title>` elements, and rewrite
//! the `|.`/`|,` text-prefix convention into CSS classes.

pub fn postprocess(raw: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = match text.find("<svg") {
        Some(start) => &text[start..],
        None => &text,
    };
    let without_titles = strip_titles(trimmed);
    rewrite_text_classes(&without_titles).into_bytes()
}

fn strip_titles(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    loop {
        match rest.find("<title>") {
            None => {
                out.push_str(rest);
                break;
            }
            Some(start) => {
                out.push_str(&rest[..start]);
                match rest[start..].find("</title>") {
                    Some(end) => rest = &rest[start + end + "</title>".len()..],
                    None => {
                        rest = &rest[start + "<title>".len()..];
                    }
                }
            }
        }
    }
    out
}

const PREFIX_CLASSES: &[(&str, &str)] = &[("|.", "node-label-small"), ("|,", "node-label-em")];

/// For every `<text ...>CONTENT</text>` whose content begins with a
/// recognized two-character prefix, inject `class="..."` into the tag
/// and strip the prefix from the content.
fn rewrite_text_classes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    loop {
        match rest.find("<text") {
            None => {
                out.push_str(rest);
                break;
            }
            Some(tag_start) => {
                out.push_str(&rest[..tag_start]);
                let Some(tag_end_rel) = rest[tag_start..].find('>') else {
                    out.push_str(&rest[tag_start..]);
                    break;
                };
                let tag_end = tag_start + tag_end_rel;
                let tag = &rest[tag_start..=tag_end];
                let after_tag = &rest[tag_end + 1..];

                let Some(content_end_rel) = after_tag.find("</text>") else {
                    out.push_str(tag);
                    rest = after_tag;
                    continue;
                };
                let content = &after_tag[..content_end_rel];
                let class = PREFIX_CLASSES.iter().find_map(|(prefix, class)| {
                    content.strip_prefix(prefix).map(|stripped| (class, stripped))
                });
                match class {
                    Some((class, stripped_content)) => {
                        out.push_str(&inject_class(tag, class));
                        out.push_str(stripped_content);
                    }
                    None => {
                        out.push_str(tag);
                        out.push_str(content);
                    }
                }
                out.push_str("</text>");
                rest = &after_tag[content_end_rel + "</text>".len()..];
            }
        }
    }
    out
}

fn inject_class(tag: &str, class: &str) -> String {
    let inner = &tag[..tag.len() - 1];
    format!("{inner} class=\"{class}\">")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_xml_header() {
        let raw = b"<?xml version=\"1.0\"?>\n<svg></svg>";
        assert_eq!(postprocess(raw), b"<svg></svg>".to_vec());
    }

    #[test]
    fn removes_title_elements() {
        let raw = b"<svg><title>node-1</title><rect/></svg>";
        let out = String::from_utf8(postprocess(raw)).unwrap();
        assert_eq!(out, "<svg><rect/></svg>");
    }

    #[test]
    fn rewrites_small_label_prefix() {
        let raw = b"<svg><text>|.hello</text></svg>";
        let out = String::from_utf8(postprocess(raw)).unwrap();
        assert_eq!(out, "<svg><text class=\"node-label-small\">hello</text></svg>");
    }

    #[test]
    fn rewrites_emphasis_label_prefix() {
        let raw = b"<svg><text x=\"1\">|,hi</text></svg>";
        let out = String::from_utf8(postprocess(raw)).unwrap();
        assert_eq!(out, "<svg><text x=\"1\" class=\"node-label-em\">hi</text></svg>");
    }

    #[test]
    fn leaves_unprefixed_text_untouched() {
        let raw = b"<svg><text>plain</text></svg>";
        let out = String::from_utf8(postprocess(raw)).unwrap();
        assert_eq!(out, "<svg><text>plain</text></svg>");
    }
}
