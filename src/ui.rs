use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, ChatRole, FocusPane, InputMode, Screen};
use crate::catalog::CategoryFilter;
use crate::markdown;
use crate::provider::Provider;
use crate::quiz::QuizPhase;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Dashboard => render_dashboard(app, frame, body_area),
        Screen::Lesson => render_lesson(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    // Popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_provider_picker {
        render_provider_picker(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let provider_name = match app.current_provider {
        Provider::Ollama => "Ollama",
        Provider::Gemini => "Gemini",
    };

    let title = Line::from(vec![
        Span::styled(" Master Python ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" [{} lessons]", app.content_source.display_name()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!(" [{}: {}]", provider_name, app.selected_model),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_dashboard(app: &mut App, frame: &mut Frame, area: Rect) {
    let [filter_area, search_area, list_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    // Category filter tabs
    let mut tab_spans: Vec<Span> = vec![Span::raw(" ")];
    for filter in CategoryFilter::all() {
        let style = if filter == app.category_filter {
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(format!(" {} ", filter.display_name()), style));
        tab_spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(tab_spans)), filter_area);

    // Search box
    let search_border = if app.input_mode == InputMode::Editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let search_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(search_border))
        .title(" Search topics and descriptions (/) ");
    let search = Paragraph::new(app.search_input.as_str())
        .style(Style::default().fg(Color::Cyan))
        .block(search_block);
    frame.render_widget(search, search_area);

    if app.input_mode == InputMode::Editing {
        // Clamp to the inner width so a long query cannot push the cursor
        // outside the box.
        let inner_width = search_area.width.saturating_sub(2) as usize;
        let cursor_x = app.search_input.chars().count().min(inner_width) as u16;
        frame.set_cursor_position((search_area.x + cursor_x + 1, search_area.y + 1));
    }

    // Topic list
    let title = match app.category_filter {
        CategoryFilter::All => format!(" Topics ({}) ", app.visible_topics.len()),
        CategoryFilter::Only(category) => format!(
            " {} ({}) — {} ",
            category.display_name(),
            app.visible_topics.len(),
            category.blurb()
        ),
    };
    let list_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(title);

    if app.visible_topics.is_empty() {
        let placeholder = Paragraph::new("No topics found matching your search.")
            .style(Style::default().fg(Color::DarkGray))
            .block(list_block);
        frame.render_widget(placeholder, list_area);
        return;
    }

    let items: Vec<ListItem> = app
        .visible_topics
        .iter()
        .map(|topic| {
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(
                        topic.title.clone(),
                        Style::default().fg(Color::White).bold(),
                    ),
                    Span::raw("  "),
                    Span::styled(
                        format!("[{}]", topic.category.display_name()),
                        Style::default().fg(Color::Magenta),
                    ),
                ]),
                Line::from(Span::styled(
                    format!("  {}", topic.description),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(list_block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.topic_list_state);
}

fn render_lesson(app: &mut App, frame: &mut Frame, area: Rect) {
    let [content_area, chat_area] =
        Layout::horizontal([Constraint::Percentage(62), Constraint::Percentage(38)]).areas(area);

    render_lesson_content(app, frame, content_area);
    render_chat(app, frame, chat_area);
}

fn render_lesson_content(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Content;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let title = app
        .current_topic
        .as_ref()
        .map(|t| format!(" {} ", t.title))
        .unwrap_or_else(|| " Lesson ".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    app.content_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2).max(1);

    if app.lesson_loading {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        let loading = Paragraph::new(Line::from(Span::styled(
            format!("Loading Lesson{}", dots),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )))
        .block(block);
        frame.render_widget(loading, area);
        return;
    }

    if let Some(error) = &app.lesson_error {
        let text = Text::from(vec![
            Line::from(Span::styled(
                "Error",
                Style::default().fg(Color::Red).bold(),
            )),
            Line::default(),
            Line::from(error.as_str()),
            Line::default(),
            Line::from(Span::styled(
                "Press Esc to return to the dashboard.",
                Style::default().fg(Color::DarkGray),
            )),
        ]);
        frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), area);
        return;
    }

    let Some(lesson) = app.lesson.clone() else {
        frame.render_widget(
            Paragraph::new("Something went wrong.").block(block),
            area,
        );
        return;
    };

    let mut lines: Vec<Line> = Vec::new();

    if let Some(topic) = &app.current_topic {
        lines.push(Line::from(Span::styled(
            format!("[{}]", topic.category.display_name()),
            Style::default().fg(Color::Magenta),
        )));
        lines.push(Line::default());
    }

    lines.extend(markdown::render_markdown(&lesson.explanation).lines);
    lines.push(Line::default());

    if !lesson.code_example.is_empty() {
        let copy_hint = if app.copied_ticks > 0 {
            Span::styled(" Copied!", Style::default().fg(Color::Green).bold())
        } else {
            Span::styled(
                "  (c: copy, r: run simulation)",
                Style::default().fg(Color::DarkGray),
            )
        };
        lines.push(Line::from(vec![
            Span::styled("Live Example", Style::default().fg(Color::Cyan).bold()),
            copy_hint,
        ]));
        for code_line in lesson.code_example.lines() {
            lines.push(Line::from(Span::styled(
                format!("  {}", code_line),
                Style::default().fg(Color::LightBlue),
            )));
        }
        lines.push(Line::default());
    }

    if !lesson.code_explanation.is_empty() {
        lines.extend(markdown::render_markdown(&lesson.code_explanation).lines);
        lines.push(Line::default());
    }

    if let Some(expected) = &lesson.expected_output {
        lines.push(Line::from(Span::styled(
            "Expected Output",
            Style::default().fg(Color::Cyan).bold(),
        )));
        for out_line in expected.lines() {
            lines.push(Line::from(Span::styled(
                format!("  {}", out_line),
                Style::default().fg(Color::Green),
            )));
        }
        lines.push(Line::default());
    }

    if app.sim_running {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            "Output Simulation",
            Style::default().fg(Color::Cyan).bold(),
        )));
        lines.push(Line::from(Span::styled(
            format!("  Running{}", dots),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::default());
    } else if let Some(output) = &app.sim_output {
        lines.push(Line::from(Span::styled(
            "Output Simulation",
            Style::default().fg(Color::Cyan).bold(),
        )));
        for out_line in output.lines() {
            lines.push(Line::from(Span::styled(
                format!("  {}", out_line),
                Style::default().fg(Color::Green),
            )));
        }
        lines.push(Line::default());
    }

    if !lesson.challenge.is_empty() {
        lines.push(Line::from(Span::styled(
            "Your Challenge",
            Style::default().fg(Color::Magenta).bold(),
        )));
        lines.extend(markdown::render_markdown(&lesson.challenge).lines);
        lines.push(Line::default());
    }

    if let Some(quiz) = &lesson.quiz {
        lines.push(Line::from(Span::styled(
            "Knowledge Check",
            Style::default().fg(Color::Yellow).bold(),
        )));
        lines.extend(markdown::render_markdown(&quiz.question).lines);
        lines.push(Line::default());

        let submitted = app.quiz.phase() == QuizPhase::Submitted;
        for (i, option) in quiz.options.iter().enumerate() {
            let selected = app.quiz.selected() == Some(i);
            let (marker, style) = if submitted {
                if i == quiz.correct_answer {
                    ("✓", Style::default().fg(Color::Green).bold())
                } else if selected {
                    ("✗", Style::default().fg(Color::Red))
                } else {
                    (" ", Style::default().fg(Color::DarkGray))
                }
            } else if selected {
                (">", Style::default().fg(Color::Cyan).bold())
            } else {
                (" ", Style::default())
            };
            lines.push(Line::from(Span::styled(
                format!("  {} {}. {}", marker, i + 1, option),
                style,
            )));
        }
        lines.push(Line::default());

        match app.quiz.is_correct(quiz) {
            Some(true) => {
                lines.push(Line::from(Span::styled(
                    "Correct!",
                    Style::default().fg(Color::Green).bold(),
                )));
                lines.extend(markdown::render_markdown(&quiz.explanation).lines);
            }
            Some(false) => {
                lines.push(Line::from(Span::styled(
                    "Incorrect",
                    Style::default().fg(Color::Red).bold(),
                )));
                lines.extend(markdown::render_markdown(&quiz.explanation).lines);
            }
            None => {
                lines.push(Line::from(Span::styled(
                    "Press 1-9 to choose an answer, Enter to check.",
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }
    }

    // Wrap-aware line count so scrolling stops at the real bottom
    app.total_content_lines = lines
        .iter()
        .map(|line| {
            let width = line.width().max(1);
            ((width as u16).saturating_sub(1) / inner_width) + 1
        })
        .sum();

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.content_scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let [messages_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(area);

    app.chat_height = messages_area.height.saturating_sub(2);
    app.chat_width = messages_area.width.saturating_sub(2);

    let chat_focused = app.focus == FocusPane::Chat;
    let chat_border = if chat_focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(chat_border))
        .title(" Tutor ");

    let chat_text = if app.chat_messages.is_empty() && !app.chat_loading {
        Text::from(Span::styled(
            "Ask a follow-up question about this lesson...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &app.chat_messages {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.content.clone()));
                    lines.push(Line::default());
                }
                ChatRole::Model => {
                    lines.push(Line::from(Span::styled(
                        "Tutor:",
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(markdown::parse_inline(line));
                    }
                    lines.push(Line::default());
                }
            }
        }

        if app.chat_loading {
            lines.push(Line::from(Span::styled(
                "Tutor:",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )));
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, messages_area);

    // Question input with horizontal scrolling to keep the cursor visible
    let editing = chat_focused && app.input_mode == InputMode::Editing;
    let input_border = if editing { Color::Yellow } else { Color::DarkGray };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(input_border))
        .title(" Ask (Tab to focus) ");

    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.chat_cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .chat_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, input_area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset).min(inner_width) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints: Vec<Span> = match (app.screen, app.input_mode) {
        (Screen::Dashboard, InputMode::Normal) => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" topics ", label_style),
            Span::styled(" h/l ", key_style),
            Span::styled(" category ", label_style),
            Span::styled(" / ", key_style),
            Span::styled(" search ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" open ", label_style),
            Span::styled(" o ", key_style),
            Span::styled(" source ", label_style),
            Span::styled(" P ", key_style),
            Span::styled(" provider ", label_style),
            Span::styled(" M ", key_style),
            Span::styled(" model ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        (Screen::Dashboard, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" done ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" cancel ", label_style),
        ],
        (Screen::Lesson, InputMode::Normal) => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" 1-9 ", key_style),
            Span::styled(" quiz ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" check ", label_style),
            Span::styled(" n/p ", key_style),
            Span::styled(" next/prev ", label_style),
            Span::styled(" r ", key_style),
            Span::styled(" simulate ", label_style),
            Span::styled(" c ", key_style),
            Span::styled(" copy ", label_style),
            Span::styled(" a ", key_style),
            Span::styled(" ask ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" back ", label_style),
        ],
        (Screen::Lesson, InputMode::Editing) => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" done ", label_style),
        ],
    };

    let mode_text = match app.screen {
        Screen::Dashboard => " DASHBOARD ",
        Screen::Lesson => " LESSON ",
    };
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];
    spans.extend(hints);

    let footer = Paragraph::new(Line::from(spans));
    frame.render_widget(footer, area);
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 40, app.available_models.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == &app.selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

fn render_provider_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let providers = Provider::all();

    let popup_area = centered_popup(area, 45, providers.len() as u16 + 2);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Provider ");

    let items: Vec<ListItem> = providers
        .iter()
        .map(|provider| {
            let key_source = app.get_key_source(*provider);
            let is_current = *provider == app.current_provider;

            let status = match key_source {
                Some("env") => "(env var)",
                Some("config") => "(configured)",
                Some("local") => "(local)",
                _ => "(needs key)",
            };
            let prefix = if is_current { "* " } else { "  " };

            let style = if is_current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if key_source.is_some() {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(format!("{}{} {}", prefix, provider.display_name(), status)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.provider_picker_state);
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let provider_name = app
        .api_key_target_provider
        .map(|p| p.display_name())
        .unwrap_or("Provider");

    let popup_area = centered_popup(area, 60, 7);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Enter API Key for {} ", provider_name));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions =
        Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
            .style(Style::default().fg(Color::DarkGray));

    let instructions_area = Rect::new(inner.x, inner.y, inner.width, 1);
    frame.render_widget(instructions, instructions_area);

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);

    // Mask the key, keeping the last four characters readable
    let display_text = if app.api_key_input.is_empty() {
        String::new()
    } else if app.api_key_input.len() <= 4 {
        "*".repeat(app.api_key_input.len())
    } else {
        let masked_len = app.api_key_input.len() - 4;
        let last_four: String = app.api_key_input.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    };

    let input = Paragraph::new(display_text).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    let cursor_x = app.api_key_input_cursor.min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let char_count = format!("{} characters", app.api_key_input.len());
    let status = Paragraph::new(char_count).style(Style::default().fg(Color::DarkGray));

    let status_area = Rect::new(inner.x, inner.y + 4, inner.width, 1);
    frame.render_widget(status, status_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    #[test]
    fn test_search_cursor_stays_inside_the_box_for_long_input() {
        let mut app = App::new().unwrap();
        app.input_mode = InputMode::Editing;
        app.search_input = "x".repeat(70_000);
        app.refresh_topics();

        let backend = TestBackend::new(40, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(&mut app, frame))
            .expect("dashboard renders with an oversized search query");

        let position = terminal.get_cursor_position().unwrap();
        assert!(position.x < 40);
    }
}
