use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use crate::ai::{GeminiClient, OllamaClient};
use crate::catalog::{Catalog, CategoryFilter, LessonContent, Topic};
use crate::config::{self, Config};
use crate::content;
use crate::provider::Provider;
use crate::quiz::QuizState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Lesson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Content,
    Chat,
}

/// Which implementation backs lesson content: the embedded catalog or the
/// active AI provider. Chosen at startup from config, toggleable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Builtin,
    Generated,
}

impl ContentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSource::Builtin => config::SOURCE_BUILTIN,
            ContentSource::Generated => config::SOURCE_AI,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            config::SOURCE_BUILTIN => Some(ContentSource::Builtin),
            config::SOURCE_AI => Some(ContentSource::Generated),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ContentSource::Builtin => "Built-in",
            ContentSource::Generated => "AI-generated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Dashboard state
    pub category_filter: CategoryFilter,
    pub search_input: String,
    pub topic_list_state: ListState,
    pub visible_topics: Vec<Topic>,

    // Lesson view state
    pub current_topic: Option<Topic>,
    pub lesson: Option<LessonContent>,
    pub lesson_error: Option<String>,
    pub lesson_loading: bool,
    pub content_scroll: u16,
    pub content_height: u16,
    pub total_content_lines: u16,
    pub quiz: QuizState,

    // Tutor chat (session-scoped, discarded when the topic changes)
    pub chat_messages: Vec<ChatMessage>,
    pub chat_input: String,
    pub chat_cursor: usize,
    pub chat_loading: bool,
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,

    // Output simulation
    pub sim_output: Option<String>,
    pub sim_running: bool,

    // Copy confirmation countdown, in ticks
    pub copied_ticks: u8,

    // In-flight background work, tagged with the topic id captured at
    // spawn time. A result is applied only if that id still matches the
    // current topic; otherwise it is discarded.
    pub lesson_task: Option<(String, JoinHandle<Option<LessonContent>>)>,
    pub chat_task: Option<(String, JoinHandle<anyhow::Result<String>>)>,
    pub sim_task: Option<(String, JoinHandle<anyhow::Result<String>>)>,

    // Animation state
    pub animation_frame: u8,

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Provider state
    pub current_provider: Provider,
    pub show_provider_picker: bool,
    pub provider_picker_state: ListState,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,
    pub api_key_target_provider: Option<Provider>,

    // Data
    pub content_source: ContentSource,
    pub catalog: Catalog,
    pub ollama: OllamaClient,
    pub gemini_client: Option<GeminiClient>,
    pub selected_model: String,
}

impl App {
    pub fn new() -> anyhow::Result<Self> {
        let catalog = Catalog::load_builtin()?;

        let ollama = OllamaClient::new("http://localhost:11434");

        let config = Config::load().unwrap_or_else(|_| Config::new());

        let current_provider = config
            .provider
            .as_ref()
            .and_then(|p| Provider::from_str(p))
            .unwrap_or(Provider::Ollama);

        let content_source = config
            .content_source
            .as_ref()
            .and_then(|s| ContentSource::from_str(s))
            .unwrap_or(ContentSource::Builtin);

        // Env var takes precedence over the stored key
        let gemini_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .or_else(|| config.gemini_api_key.clone());
        let gemini_client = gemini_key.as_ref().map(|k| GeminiClient::new(k));

        let selected_model = config.default_model.unwrap_or_else(|| match current_provider {
            Provider::Ollama => "gemma3:latest".to_string(),
            Provider::Gemini => GeminiClient::list_models()
                .first()
                .cloned()
                .unwrap_or_default(),
        });

        let visible_topics: Vec<Topic> = catalog.topics().to_vec();

        let mut topic_list_state = ListState::default();
        if !visible_topics.is_empty() {
            topic_list_state.select(Some(0));
        }

        Ok(Self {
            should_quit: false,
            screen: Screen::Dashboard,
            input_mode: InputMode::Normal,
            focus: FocusPane::Content,

            category_filter: CategoryFilter::All,
            search_input: String::new(),
            topic_list_state,
            visible_topics,

            current_topic: None,
            lesson: None,
            lesson_error: None,
            lesson_loading: false,
            content_scroll: 0,
            content_height: 0,
            total_content_lines: 0,
            quiz: QuizState::new(),

            chat_messages: Vec::new(),
            chat_input: String::new(),
            chat_cursor: 0,
            chat_loading: false,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            sim_output: None,
            sim_running: false,

            copied_ticks: 0,

            lesson_task: None,
            chat_task: None,
            sim_task: None,

            animation_frame: 0,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            current_provider,
            show_provider_picker: false,
            provider_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,
            api_key_target_provider: None,

            content_source,
            catalog,
            ollama,
            gemini_client,
            selected_model,
        })
    }

    // Dashboard: filtering and list navigation

    /// Recompute the visible topic list after a filter or search change,
    /// keeping the selection in range.
    pub fn refresh_topics(&mut self) {
        self.visible_topics = self
            .catalog
            .filter_topics(self.category_filter, &self.search_input)
            .into_iter()
            .cloned()
            .collect();

        if self.visible_topics.is_empty() {
            self.topic_list_state.select(None);
        } else {
            let selected = self.topic_list_state.selected().unwrap_or(0);
            self.topic_list_state
                .select(Some(selected.min(self.visible_topics.len() - 1)));
        }
    }

    pub fn selected_topic(&self) -> Option<&Topic> {
        self.topic_list_state
            .selected()
            .and_then(|i| self.visible_topics.get(i))
    }

    pub fn topic_nav_down(&mut self) {
        let len = self.visible_topics.len();
        if len > 0 {
            let i = self.topic_list_state.selected().unwrap_or(0);
            self.topic_list_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn topic_nav_up(&mut self) {
        let i = self.topic_list_state.selected().unwrap_or(0);
        self.topic_list_state.select(Some(i.saturating_sub(1)));
    }

    pub fn topic_nav_first(&mut self) {
        if !self.visible_topics.is_empty() {
            self.topic_list_state.select(Some(0));
        }
    }

    pub fn topic_nav_last(&mut self) {
        let len = self.visible_topics.len();
        if len > 0 {
            self.topic_list_state.select(Some(len - 1));
        }
    }

    pub fn cycle_filter(&mut self, forward: bool) {
        let filters = CategoryFilter::all();
        let current = filters
            .iter()
            .position(|f| *f == self.category_filter)
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % filters.len()
        } else {
            (current + filters.len() - 1) % filters.len()
        };
        self.category_filter = filters[next];
        self.refresh_topics();
    }

    /// Flip between built-in and AI-generated lessons, persisting the
    /// choice like the provider selection.
    pub fn toggle_content_source(&mut self) {
        self.content_source = match self.content_source {
            ContentSource::Builtin => ContentSource::Generated,
            ContentSource::Generated => ContentSource::Builtin,
        };
        let mut config = Config::load().unwrap_or_else(|_| Config::new());
        config.content_source = Some(self.content_source.as_str().to_string());
        let _ = config.save();
    }

    // Lesson view

    /// Reset all per-lesson state for a freshly opened topic. Any reply
    /// still in flight for the previous topic will fail the stale guard.
    pub fn reset_lesson_state(&mut self, topic: Topic) {
        self.current_topic = Some(topic);
        self.lesson = None;
        self.lesson_error = None;
        self.lesson_loading = true;
        self.content_scroll = 0;
        self.quiz.reset();
        self.chat_messages.clear();
        self.chat_input.clear();
        self.chat_cursor = 0;
        self.chat_loading = false;
        self.chat_scroll = 0;
        self.sim_output = None;
        self.sim_running = false;
        self.copied_ticks = 0;
        self.screen = Screen::Lesson;
        self.focus = FocusPane::Content;
        self.input_mode = InputMode::Normal;
    }

    pub fn close_lesson(&mut self) {
        self.current_topic = None;
        self.lesson = None;
        self.lesson_error = None;
        self.lesson_loading = false;
        self.chat_messages.clear();
        self.chat_input.clear();
        self.chat_cursor = 0;
        self.chat_loading = false;
        self.sim_output = None;
        self.sim_running = false;
        self.screen = Screen::Dashboard;
        self.input_mode = InputMode::Normal;
    }

    // Content scrolling

    pub fn scroll_down(&mut self) {
        if self.content_scroll < self.total_content_lines.saturating_sub(self.content_height) {
            self.content_scroll = self.content_scroll.saturating_add(1);
        }
    }

    pub fn scroll_up(&mut self) {
        self.content_scroll = self.content_scroll.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        let half_page = self.content_height / 2;
        let max_scroll = self.total_content_lines.saturating_sub(self.content_height);
        self.content_scroll = (self.content_scroll + half_page).min(max_scroll);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half_page = self.content_height / 2;
        self.content_scroll = self.content_scroll.saturating_sub(half_page);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.lesson_loading || self.chat_loading || self.sim_running {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.copied_ticks = self.copied_ticks.saturating_sub(1);
    }

    /// Scroll chat to bottom so the latest message or the thinking
    /// indicator is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.chat_messages {
            total_lines += 1; // Role line ("You:" or "Tutor:")
            for line in msg.content.lines() {
                // Character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        // Lines for the "Thinking..." indicator
        total_lines += 2;

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        }
    }

    // Background task harvesting

    /// Collect finished background work. Results are applied only when
    /// the topic they were started for is still the one on screen; a
    /// fetch abandoned by navigation resolves and is thrown away.
    pub async fn poll_background_tasks(&mut self) {
        if let Some((topic_id, task)) = self.lesson_task.take() {
            if !task.is_finished() {
                self.lesson_task = Some((topic_id, task));
            } else {
                let result = task.await;
                if self.is_current_topic(&topic_id) {
                    self.lesson_loading = false;
                    match result {
                        Ok(Some(lesson)) => {
                            self.lesson = Some(lesson);
                            self.lesson_error = None;
                            self.quiz.reset();
                        }
                        Ok(None) => {
                            self.lesson_error = Some("Content coming soon!".to_string());
                        }
                        Err(_) => {
                            self.lesson_error = Some("Something went wrong.".to_string());
                        }
                    }
                }
            }
        }

        if let Some((topic_id, task)) = self.chat_task.take() {
            if !task.is_finished() {
                self.chat_task = Some((topic_id, task));
            } else {
                let result = task.await;
                if self.is_current_topic(&topic_id) {
                    self.chat_loading = false;
                    let response = result.map_err(anyhow::Error::from).and_then(|r| r);
                    self.chat_messages.push(ChatMessage {
                        role: ChatRole::Model,
                        content: content::answer_from_response(response),
                    });
                    self.scroll_chat_to_bottom();
                }
            }
        }

        if let Some((topic_id, task)) = self.sim_task.take() {
            if !task.is_finished() {
                self.sim_task = Some((topic_id, task));
            } else {
                let result = task.await;
                if self.is_current_topic(&topic_id) {
                    self.sim_running = false;
                    let response = result.map_err(anyhow::Error::from).and_then(|r| r);
                    self.sim_output = Some(content::simulation_from_response(response));
                }
            }
        }
    }

    fn is_current_topic(&self, topic_id: &str) -> bool {
        self.current_topic
            .as_ref()
            .map(|t| t.id == topic_id)
            .unwrap_or(false)
    }

    // Picker navigation

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i) {
                self.selected_model = model.clone();
                self.show_model_picker = false;
                let _ = Config::save_default_model(&self.selected_model);
            }
        }
    }

    pub fn provider_picker_nav_down(&mut self) {
        let len = Provider::all().len();
        if len > 0 {
            let i = self.provider_picker_state.selected().unwrap_or(0);
            self.provider_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn provider_picker_nav_up(&mut self) {
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn get_models_for_provider(&self, provider: Provider) -> Vec<String> {
        match provider {
            Provider::Ollama => Vec::new(), // Fetched async from the daemon
            Provider::Gemini => GeminiClient::list_models(),
        }
    }

    /// Returns the source of the API key for a provider: "env", "config",
    /// or None when the provider still needs a key.
    pub fn get_key_source(&self, provider: Provider) -> Option<&'static str> {
        match provider {
            Provider::Ollama => Some("local"),
            Provider::Gemini => {
                if std::env::var("GEMINI_API_KEY").is_ok() {
                    Some("env")
                } else if self.gemini_client.is_some() {
                    Some("config")
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_topic(app: &mut App, id: &str) {
        let topic = app.catalog.topic(id).cloned().expect("topic exists");
        app.reset_lesson_state(topic);
    }

    /// Poll until the installed lesson task has been harvested. The tasks
    /// in these tests are trivially ready, so this terminates quickly.
    async fn drain_lesson_task(app: &mut App) {
        for _ in 0..200 {
            if app.lesson_task.is_none() {
                return;
            }
            tokio::task::yield_now().await;
            app.poll_background_tasks().await;
        }
        panic!("lesson task did not finish");
    }

    #[tokio::test]
    async fn test_stale_lesson_result_is_discarded() {
        let mut app = App::new().unwrap();
        open_topic(&mut app, "s1");

        // A fetch started for a topic the user has since navigated away from.
        let lesson = app.catalog.lesson_content("s2").cloned();
        assert!(lesson.is_some());
        app.lesson_task = Some(("s2".to_string(), tokio::spawn(async move { lesson })));
        drain_lesson_task(&mut app).await;

        // The abandoned result is thrown away and the view keeps waiting
        // on the fetch for the topic actually on screen.
        assert!(app.lesson.is_none());
        assert!(app.lesson_error.is_none());
        assert!(app.lesson_loading);
    }

    #[tokio::test]
    async fn test_missing_content_for_current_topic_shows_placeholder() {
        let mut app = App::new().unwrap();
        open_topic(&mut app, "s1");

        app.lesson_task = Some(("s1".to_string(), tokio::spawn(async { None })));
        drain_lesson_task(&mut app).await;

        assert!(app.lesson.is_none());
        assert_eq!(app.lesson_error.as_deref(), Some("Content coming soon!"));
        assert!(!app.lesson_loading);
    }

    #[tokio::test]
    async fn test_result_for_current_topic_is_applied() {
        let mut app = App::new().unwrap();
        open_topic(&mut app, "s1");

        let lesson = app.catalog.lesson_content("s1").cloned();
        app.lesson_task = Some(("s1".to_string(), tokio::spawn(async move { lesson })));
        drain_lesson_task(&mut app).await;

        assert!(app.lesson.is_some());
        assert!(app.lesson_error.is_none());
        assert!(!app.lesson_loading);
    }
}
