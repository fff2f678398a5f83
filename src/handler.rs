use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::ai::GeminiClient;
use crate::app::{App, ChatMessage, ChatRole, ContentSource, FocusPane, InputMode, Screen};
use crate::catalog::Topic;
use crate::config::Config;
use crate::content;
use crate::provider::Provider;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Popups take the keyboard regardless of screen
    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return Ok(());
    }
    if app.show_provider_picker {
        handle_provider_picker(app, key).await;
        return Ok(());
    }
    if app.show_model_picker {
        handle_model_picker(app, key);
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key).await?,
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

async fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Result<()> {
    // Picker shortcuts are available on both screens
    match key.code {
        KeyCode::Char('M') => {
            let models = match app.current_provider {
                Provider::Ollama => app.ollama.list_models().await.unwrap_or_default(),
                Provider::Gemini => GeminiClient::list_models(),
            };
            app.available_models = models;
            if !app.available_models.is_empty() {
                let current_idx = app
                    .available_models
                    .iter()
                    .position(|m| m == &app.selected_model)
                    .unwrap_or(0);
                app.model_picker_state.select(Some(current_idx));
                app.show_model_picker = true;
            }
            return Ok(());
        }
        KeyCode::Char('P') => {
            let current_idx = Provider::all()
                .iter()
                .position(|p| *p == app.current_provider)
                .unwrap_or(0);
            app.provider_picker_state.select(Some(current_idx));
            app.show_provider_picker = true;
            return Ok(());
        }
        _ => {}
    }

    match app.screen {
        Screen::Dashboard => handle_dashboard_normal(app, key),
        Screen::Lesson => handle_lesson_normal(app, key),
    }
    Ok(())
}

fn handle_dashboard_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // List navigation
        KeyCode::Char('j') | KeyCode::Down => app.topic_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.topic_nav_up(),
        KeyCode::Char('g') => app.topic_nav_first(),
        KeyCode::Char('G') => app.topic_nav_last(),

        // Category filter
        KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => app.cycle_filter(true),
        KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => app.cycle_filter(false),

        // Search
        KeyCode::Char('/') => {
            app.input_mode = InputMode::Editing;
        }

        // Content source toggle (built-in vs AI-generated)
        KeyCode::Char('o') => app.toggle_content_source(),

        // Open lesson
        KeyCode::Enter => {
            if let Some(topic) = app.selected_topic().cloned() {
                open_lesson(app, topic);
            }
        }

        _ => {}
    }
}

fn handle_lesson_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        // Back to dashboard
        KeyCode::Esc | KeyCode::Char('b') => app.close_lesson(),
        KeyCode::Char('q') => app.should_quit = true,

        // Focus
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Content => FocusPane::Chat,
                FocusPane::Chat => FocusPane::Content,
            };
            if app.focus == FocusPane::Chat {
                app.input_mode = InputMode::Editing;
                app.chat_cursor = app.chat_input.chars().count();
            }
        }
        KeyCode::Char('a') => {
            app.focus = FocusPane::Chat;
            app.input_mode = InputMode::Editing;
            app.chat_cursor = app.chat_input.chars().count();
        }

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_down();
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_half_page_up();
        }
        KeyCode::Char('g') => app.content_scroll = 0,
        KeyCode::Char('G') => {
            app.content_scroll = app.total_content_lines.saturating_sub(app.content_height);
        }

        // Sequential traversal within the category
        KeyCode::Char('n') => {
            if let Some(current) = app.current_topic.as_ref() {
                let (_, next) = app.catalog.adjacent_topics(&current.id);
                if let Some(topic) = next.cloned() {
                    open_lesson(app, topic);
                }
            }
        }
        KeyCode::Char('p') => {
            if let Some(current) = app.current_topic.as_ref() {
                let (previous, _) = app.catalog.adjacent_topics(&current.id);
                if let Some(topic) = previous.cloned() {
                    open_lesson(app, topic);
                }
            }
        }

        // Quiz: digits pick an option, Enter submits
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            if let Some(quiz) = app.lesson.as_ref().and_then(|l| l.quiz.clone()) {
                app.quiz.select_option(index, &quiz);
            }
        }
        KeyCode::Enter => {
            app.quiz.submit();
        }

        // Run output simulation on the code sample
        KeyCode::Char('r') => start_simulation(app),

        // Copy the displayed code sample
        KeyCode::Char('c') => {
            if let Some(code) = app.lesson.as_ref().map(|l| l.code_example.clone()) {
                if !code.is_empty() {
                    copy_to_clipboard(&code);
                    app.copied_ticks = 6;
                }
            }
        }

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match app.screen {
        Screen::Dashboard => handle_search_editing(app, key),
        Screen::Lesson => handle_chat_editing(app, key),
    }
}

fn handle_search_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Backspace => {
            app.search_input.pop();
            app.refresh_topics();
        }
        KeyCode::Char(c) => {
            app.search_input.push(c);
            app.refresh_topics();
        }
        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.focus = FocusPane::Content;
        }
        KeyCode::Enter => {
            submit_chat_question(app);
        }
        KeyCode::Backspace => {
            if app.chat_cursor > 0 {
                app.chat_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.chat_input.chars().count();
            if app.chat_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
                app.chat_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.chat_cursor = app.chat_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.chat_input.chars().count();
            app.chat_cursor = (app.chat_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.chat_cursor = 0;
        }
        KeyCode::End => {
            app.chat_cursor = app.chat_input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.chat_input, app.chat_cursor);
            app.chat_input.insert(byte_pos, c);
            app.chat_cursor += 1;
        }
        _ => {}
    }
}

/// Open a topic and start fetching its lesson from the active source.
fn open_lesson(app: &mut App, topic: Topic) {
    app.reset_lesson_state(topic.clone());

    match app.content_source {
        ContentSource::Builtin => {
            // Clone the lesson up front; the short delay keeps the loading
            // state visible and exercises the same apply path as the AI source.
            let lesson = app.catalog.lesson_content(&topic.id).cloned();
            app.lesson_task = Some((
                topic.id.clone(),
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
                    lesson
                }),
            ));
        }
        ContentSource::Generated => {
            let prompt = content::lesson_prompt(&topic);
            let model = app.selected_model.clone();

            match app.current_provider {
                Provider::Ollama => {
                    let client = app.ollama.clone();
                    app.lesson_task = Some((
                        topic.id.clone(),
                        tokio::spawn(async move {
                            let response = client.query_json(&model, &prompt).await;
                            Some(content::lesson_from_response(response))
                        }),
                    ));
                }
                Provider::Gemini => {
                    if let Some(client) = app.gemini_client.clone() {
                        app.lesson_task = Some((
                            topic.id.clone(),
                            tokio::spawn(async move {
                                let response = client.query_json(&model, &prompt).await;
                                Some(content::lesson_from_response(response))
                            }),
                        ));
                    } else {
                        app.lesson_loading = false;
                        app.lesson_error = Some(
                            "Gemini API key not configured. Press 'P' to set up.".to_string(),
                        );
                    }
                }
            }
        }
    }
}

fn submit_chat_question(app: &mut App) {
    if app.chat_input.trim().is_empty() || app.chat_task.is_some() {
        return;
    }
    let Some(topic) = app.current_topic.clone() else {
        return;
    };

    let question = app.chat_input.clone();
    app.chat_messages.push(ChatMessage {
        role: ChatRole::User,
        content: question.clone(),
    });

    let context = build_chat_context(app);
    let prompt = content::follow_up_prompt(&question, &context);

    app.chat_input.clear();
    app.chat_cursor = 0;
    app.chat_loading = true;
    app.input_mode = InputMode::Normal;
    app.scroll_chat_to_bottom();

    let model = app.selected_model.clone();

    match app.current_provider {
        Provider::Ollama => {
            let client = app.ollama.clone();
            app.chat_task = Some((
                topic.id,
                tokio::spawn(async move { client.query(&model, &prompt).await }),
            ));
        }
        Provider::Gemini => {
            if let Some(client) = app.gemini_client.clone() {
                app.chat_task = Some((
                    topic.id,
                    tokio::spawn(async move { client.query(&model, &prompt).await }),
                ));
            } else {
                app.chat_loading = false;
                app.chat_messages.push(ChatMessage {
                    role: ChatRole::Model,
                    content: "Error: Gemini API key not configured. Press 'P' to set up."
                        .to_string(),
                });
            }
        }
    }
}

/// Assemble all continuity for a single-shot tutor request: the lesson
/// material plus every prior turn. The provider itself holds no state.
fn build_chat_context(app: &App) -> String {
    let mut context = String::new();

    if let Some(topic) = &app.current_topic {
        context.push_str(&format!(
            "Lesson topic: {} ({})\n",
            topic.title,
            topic.category.display_name()
        ));
    }

    if let Some(lesson) = &app.lesson {
        context.push_str(&format!("Lesson explanation:\n{}\n", lesson.explanation));
        if !lesson.code_example.is_empty() {
            context.push_str(&format!("Code example:\n{}\n", lesson.code_example));
        }
    }

    // Prior turns, excluding the question just pushed
    if app.chat_messages.len() > 1 {
        context.push_str("Conversation so far:\n");
        for msg in app
            .chat_messages
            .iter()
            .take(app.chat_messages.len().saturating_sub(1))
        {
            match msg.role {
                ChatRole::User => context.push_str(&format!("Student: {}\n", msg.content)),
                ChatRole::Model => context.push_str(&format!("Tutor: {}\n", msg.content)),
            }
        }
    }

    context
}

fn start_simulation(app: &mut App) {
    if app.sim_task.is_some() {
        return;
    }
    let Some(topic) = app.current_topic.clone() else {
        return;
    };
    let Some(code) = app.lesson.as_ref().map(|l| l.code_example.clone()) else {
        return;
    };
    if code.is_empty() {
        return;
    }

    let prompt = content::simulation_prompt(&code);
    let model = app.selected_model.clone();

    match app.current_provider {
        Provider::Ollama => {
            let client = app.ollama.clone();
            app.sim_running = true;
            app.sim_output = None;
            app.sim_task = Some((
                topic.id,
                tokio::spawn(async move { client.query(&model, &prompt).await }),
            ));
        }
        Provider::Gemini => {
            if let Some(client) = app.gemini_client.clone() {
                app.sim_running = true;
                app.sim_output = None;
                app.sim_task = Some((
                    topic.id,
                    tokio::spawn(async move { client.query(&model, &prompt).await }),
                ));
            } else {
                app.sim_output =
                    Some("Gemini API key not configured. Press 'P' to set up.".to_string());
            }
        }
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_api_key_input = false;
            app.api_key_input.clear();
            app.api_key_target_provider = None;
        }
        KeyCode::Enter => {
            if !app.api_key_input.is_empty() {
                if let Some(provider) = app.api_key_target_provider {
                    let mut config = Config::load().unwrap_or_else(|_| Config::new());
                    if provider == Provider::Gemini {
                        config.gemini_api_key = Some(app.api_key_input.clone());
                        app.gemini_client = Some(GeminiClient::new(&app.api_key_input));
                    }
                    config.provider = Some(provider.as_str().to_string());
                    let _ = config.save();
                    app.current_provider = provider;
                    let models = app.get_models_for_provider(provider);
                    if let Some(model) = models.first() {
                        app.selected_model = model.clone();
                    }
                }
            }
            app.show_api_key_input = false;
            app.api_key_input.clear();
            app.api_key_target_provider = None;
        }
        KeyCode::Backspace => {
            if app.api_key_input_cursor > 0 {
                app.api_key_input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
                app.api_key_input.remove(byte_pos);
            }
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
            app.api_key_input.insert(byte_pos, c);
            app.api_key_input_cursor += 1;
        }
        KeyCode::Left => {
            app.api_key_input_cursor = app.api_key_input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.api_key_input.chars().count();
            app.api_key_input_cursor = (app.api_key_input_cursor + 1).min(char_count);
        }
        _ => {}
    }
}

async fn handle_provider_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_provider_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => app.provider_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.provider_picker_nav_up(),
        KeyCode::Enter => {
            if let Some(i) = app.provider_picker_state.selected() {
                let providers = Provider::all();
                if let Some(&provider) = providers.get(i) {
                    let needs_key = app.get_key_source(provider).is_none();
                    if needs_key {
                        app.api_key_target_provider = Some(provider);
                        app.show_api_key_input = true;
                        app.api_key_input.clear();
                        app.api_key_input_cursor = 0;
                    } else {
                        app.current_provider = provider;
                        let mut config = Config::load().unwrap_or_else(|_| Config::new());
                        config.provider = Some(provider.as_str().to_string());
                        let _ = config.save();
                        match provider {
                            Provider::Ollama => {
                                if let Ok(models) = app.ollama.list_models().await {
                                    if let Some(model) = models.first() {
                                        app.selected_model = model.clone();
                                    }
                                }
                            }
                            _ => {
                                let models = app.get_models_for_provider(provider);
                                if let Some(model) = models.first() {
                                    app.selected_model = model.clone();
                                }
                            }
                        }
                    }
                    app.show_provider_picker = false;
                }
            }
        }
        _ => {}
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_model_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

fn copy_to_clipboard(text: &str) {
    for (cmd, args) in [
        ("pbcopy", &[][..]),
        ("xclip", &["-selection", "clipboard"][..]),
        ("wl-copy", &[][..]),
    ] {
        if pipe_to_command(cmd, args, text) {
            return;
        }
    }
}

/// Feed text to a command over stdin and reap the child. Returns false
/// when the command cannot be spawned so the caller can try the next one.
fn pipe_to_command(cmd: &str, args: &[&str], text: &str) -> bool {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let Ok(mut child) = Command::new(cmd).args(args).stdin(Stdio::piped()).spawn() else {
        return false;
    };
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(text.as_bytes());
    }
    // stdin is closed at this point; the clipboard helpers either exit
    // (pbcopy, xclip) or fork away (wl-copy), so the wait is short.
    let _ = child.wait();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_to_command_reaps_child() {
        assert!(pipe_to_command("cat", &[], "hello"));
        assert!(!pipe_to_command("no-such-clipboard-helper", &[], "hello"));
    }

    #[test]
    fn test_whitespace_only_question_is_not_sent() {
        let mut app = App::new().unwrap();
        let topic = app.catalog.topic("s1").cloned().unwrap();
        app.reset_lesson_state(topic);

        app.chat_input = "   ".to_string();
        submit_chat_question(&mut app);

        assert!(app.chat_messages.is_empty());
        assert!(app.chat_task.is_none());
        assert!(!app.chat_loading);
    }
}
