//! Label escaping rules (§4.3): preserve the `\n`/`\l`/`\r` line-break
//! escapes a layout tool understands, escape quotes and lone backslashes,
//! collapse every whitespace variant (including NBSP) to a single space,
//! and replace non-printable characters with `?`.

pub fn escape_label(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('n') | Some('l') | Some('r') => {
                    out.push('\\');
                    out.push(chars.next().unwrap());
                }
                _ => out.push_str("\\\\"),
            },
            '"' => out.push_str("\\\""),
            c if c.is_whitespace() => out.push(' '),
            c if c.is_control() => out.push('?'),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_known_escapes() {
        assert_eq!(escape_label(r"line one\nline two"), r"line one\nline two");
        assert_eq!(escape_label(r"left\lright"), r"left\lright");
    }

    #[test]
    fn escapes_quotes_and_lone_backslash() {
        assert_eq!(escape_label(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_label(r"C:\temp"), r"C:\\temp");
    }

    #[test]
    fn collapses_whitespace_including_nbsp() {
        assert_eq!(escape_label("a\tb\u{00A0}c\nd"), "a b c d");
    }

    #[test]
    fn replaces_non_printables_with_question_mark() {
        assert_eq!(escape_label("a\u{0007}b"), "a?b");
    }
}
