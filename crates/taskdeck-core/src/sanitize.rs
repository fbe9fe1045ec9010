//! Sanitization for text that reaches the terminal.
//!
//! Task content comes from files anyone can edit, so nothing is written to
//! the screen verbatim: escape sequences are removed entirely, control and
//! invisible characters are dropped or replaced, and length is bounded.

/// Default maximum length for a sanitized field.
pub const DEFAULT_MAX_LENGTH: usize = 1000;

/// Maximum number of lines kept.
pub const MAX_LINES: usize = 50;

/// Maximum characters per line.
pub const MAX_LINE_LENGTH: usize = 100;

const ELLIPSIS: &str = "...";

/// Sanitize `text` for display.
///
/// - CSI, OSC and charset-selection escape sequences are removed
/// - control characters other than `\n` and `\t` are dropped
/// - other invisible or format characters become `?`
/// - the result is truncated to `max_length` chars, [`MAX_LINES`] lines and
///   [`MAX_LINE_LENGTH`] chars per line, marking cuts with `...`
pub fn sanitize_text(text: &str, max_length: usize) -> String {
    let stripped = strip_escape_sequences(text);

    let cleaned: String = stripped
        .chars()
        .filter_map(|c| match c {
            '\n' | '\t' | ' ' => Some(c),
            c if c.is_control() => None,
            c if is_invisible(c) => Some('?'),
            c => Some(c),
        })
        .collect();

    let truncated = truncate_chars(&cleaned, max_length);

    truncated
        .split('\n')
        .take(MAX_LINES)
        .map(|line| truncate_chars(line, MAX_LINE_LENGTH))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sanitize a single-line field (titles, ids, tags): newlines become spaces.
pub fn sanitize_line(text: &str, max_length: usize) -> String {
    sanitize_text(&text.replace(['\n', '\t'], " "), max_length)
}

/// Truncate to at most `max` chars, ending with `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= ELLIPSIS.len() {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Remove every terminal escape sequence from `text`.
pub fn strip_escape_sequences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => match chars.next() {
                Some('[') => skip_csi(&mut chars),
                Some(']') => skip_osc(&mut chars),
                Some('(') | Some(')') => {
                    chars.next();
                }
                _ => {}
            },
            '\u{9b}' => skip_csi(&mut chars),
            '\u{9d}' => skip_osc(&mut chars),
            c => out.push(c),
        }
    }
    out
}

fn skip_csi(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for c in chars.by_ref() {
        if ('\u{40}'..='\u{7e}').contains(&c) {
            break;
        }
    }
}

fn skip_osc(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while let Some(c) = chars.next() {
        match c {
            '\u{07}' | '\u{9c}' => break,
            '\u{1b}' if chars.peek() == Some(&'\\') => {
                chars.next();
                break;
            }
            _ => {}
        }
    }
}

/// Format and separator characters that render invisibly or reorder text.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00a0}'
            | '\u{00ad}'
            | '\u{061c}'
            | '\u{180e}'
            | '\u{2000}'..='\u{200f}'
            | '\u{2028}'..='\u{202f}'
            | '\u{205f}'..='\u{206f}'
            | '\u{3000}'
            | '\u{feff}'
            | '\u{fff9}'..='\u{fffb}'
    ) || c.is_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_color_codes() {
        assert_eq!(sanitize_text("\u{1b}[31mred\u{1b}[0m", 100), "red");
    }

    #[test]
    fn test_strips_osc_and_charset() {
        let input = "a\u{1b}]0;evil title\u{07}b\u{1b}(Bc\u{1b}]8;;http://x\u{1b}\\d";
        assert_eq!(strip_escape_sequences(input), "abcd");
    }

    #[test]
    fn test_drops_controls_keeps_newlines() {
        assert_eq!(sanitize_text("a\u{0}b\r\nc\td", 100), "ab\nc\td");
    }

    #[test]
    fn test_replaces_invisible_characters() {
        assert_eq!(sanitize_text("zero\u{200b}width", 100), "zero?width");
        assert_eq!(sanitize_text("rtl\u{202e}x", 100), "rtl?x");
    }

    #[test]
    fn test_truncates_total_length() {
        let long = "x".repeat(50);
        let out = sanitize_text(&long, 20);
        assert_eq!(out.chars().count(), 20);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn test_limits_lines_and_line_length() {
        let many = (0..80).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        assert_eq!(sanitize_text(&many, 10_000).lines().count(), MAX_LINES);

        let wide = "y".repeat(300);
        let out = sanitize_text(&wide, 10_000);
        assert_eq!(out.chars().count(), MAX_LINE_LENGTH);
    }

    #[test]
    fn test_sanitize_line_flattens() {
        assert_eq!(sanitize_line("one\ntwo", 100), "one two");
    }
}
