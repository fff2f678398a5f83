//! Markdown-to-terminal rendering boundary.
//!
//! Lesson explanations and tutor replies carry markdown-formatted text;
//! the rest of the app treats them as opaque strings and hands them to
//! `render_markdown` at display time.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

/// Render markdown text into styled terminal lines. Handles headings,
/// bullet lists, **bold**, and `inline code`; everything else passes
/// through as plain text.
pub fn render_markdown(text: &str) -> Text<'static> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for raw_line in text.lines() {
        let trimmed = raw_line.trim_start();

        if let Some(heading) = trimmed.strip_prefix('#') {
            let title = heading.trim_start_matches('#').trim_start();
            lines.push(Line::from(Span::styled(
                title.to_string(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )));
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            let mut spans = vec![Span::styled("  • ", Style::default().fg(Color::Yellow))];
            spans.extend(parse_inline(item).spans);
            lines.push(Line::from(spans));
            continue;
        }

        lines.push(parse_inline(raw_line));
    }

    Text::from(lines)
}

/// Parse one line of text, converting **bold** and `code` markers into
/// styled spans. Unterminated markers are kept as literal text.
pub fn parse_inline(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else if c == '`' {
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            let mut code_text = String::new();
            let mut found_close = false;

            for c in chars.by_ref() {
                if c == '`' {
                    found_close = true;
                    break;
                }
                code_text.push(c);
            }

            if found_close && !code_text.is_empty() {
                spans.push(Span::styled(
                    code_text,
                    Style::default().fg(Color::Green),
                ));
            } else {
                current_text.push('`');
                current_text.push_str(&code_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_texts(line: &Line) -> Vec<String> {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn test_bold_becomes_styled_span() {
        let line = parse_inline("a **bold** word");
        assert_eq!(span_texts(&line), vec!["a ", "bold", " word"]);
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert!(!line.spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_inline_code_becomes_styled_span() {
        let line = parse_inline("use `print` here");
        assert_eq!(span_texts(&line), vec!["use ", "print", " here"]);
        assert_eq!(line.spans[1].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_unterminated_markers_are_literal() {
        let bold = parse_inline("a **dangling marker");
        assert_eq!(span_texts(&bold).join(""), "a **dangling marker");

        let code = parse_inline("a `dangling tick");
        assert_eq!(span_texts(&code).join(""), "a `dangling tick");
    }

    #[test]
    fn test_headings_and_bullets() {
        let text = render_markdown("## Types\n- `int` for whole numbers\nplain");
        assert_eq!(text.lines.len(), 3);
        assert_eq!(text.lines[0].spans[0].content, "Types");
        assert_eq!(text.lines[0].spans[0].style.fg, Some(Color::Cyan));
        assert_eq!(text.lines[1].spans[0].content, "  • ");
        assert_eq!(text.lines[1].spans[1].content, "int");
    }

    #[test]
    fn test_empty_lines_preserved() {
        let text = render_markdown("one\n\ntwo");
        assert_eq!(text.lines.len(), 3);
        assert!(text.lines[1].spans.is_empty());
    }
}
