use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Built-in lesson catalog, embedded at compile time.
const BUILTIN_CATALOG: &str = include_str!("../data/lessons.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Starter,
    Advanced,
    #[serde(rename = "Machine Learning")]
    MachineLearning,
    #[serde(rename = "Computer Vision")]
    ComputerVision,
    #[serde(rename = "Network & TCP/IP")]
    Network,
    #[serde(rename = "UI & GUI")]
    Ui,
}

impl Category {
    pub fn all() -> Vec<Category> {
        vec![
            Category::Starter,
            Category::Advanced,
            Category::MachineLearning,
            Category::ComputerVision,
            Category::Network,
            Category::Ui,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Starter => "Starter",
            Category::Advanced => "Advanced",
            Category::MachineLearning => "Machine Learning",
            Category::ComputerVision => "Computer Vision",
            Category::Network => "Network & TCP/IP",
            Category::Ui => "UI & GUI",
        }
    }

    pub fn blurb(&self) -> &'static str {
        match self {
            Category::Starter => "Master the fundamentals: Variables, Control Flow, and Functions.",
            Category::Advanced => "Deep dive into Decorators, Generators, and Concurrency.",
            Category::MachineLearning => "Explore Data Science, Neural Networks, and Predictive Models.",
            Category::ComputerVision => "Learn Image Processing, Face Detection, and Object Tracking.",
            Category::Network => "Understand Sockets, TCP/IP, and Asynchronous I/O.",
            Category::Ui => "Build modern GUIs and Web Applications.",
        }
    }
}

/// Dashboard category selector: everything, or one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CategoryFilter::All => "All",
            CategoryFilter::Only(c) => c.display_name(),
        }
    }

    /// All selectable filter values, in the order shown on the dashboard.
    pub fn all() -> Vec<CategoryFilter> {
        let mut filters = vec![CategoryFilter::All];
        filters.extend(Category::all().into_iter().map(CategoryFilter::Only));
        filters
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
}

impl QuizQuestion {
    /// A quiz is usable only if the answer key points at a real option.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() >= 2 && self.correct_answer < self.options.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    pub title: String,
    pub explanation: String,
    pub code_example: String,
    pub code_explanation: String,
    pub challenge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizQuestion>,
}

#[derive(Deserialize)]
struct CatalogFile {
    topics: Vec<Topic>,
    lessons: HashMap<String, LessonContent>,
}

/// Read-only lesson catalog: an ordered topic table plus lesson bodies
/// keyed by topic id. Built once at startup; lookups never mutate.
pub struct Catalog {
    topics: Vec<Topic>,
    lessons: HashMap<String, LessonContent>,
}

impl Catalog {
    pub fn load_builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("built-in lesson catalog is invalid")
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(raw)?;
        let catalog = Self {
            topics: file.topics,
            lessons: file.lessons,
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Catalog integrity is an authoring concern, so defects fail loudly
    /// at load instead of surfacing mid-session.
    fn validate(&self) -> Result<()> {
        let mut seen_ids = HashSet::new();
        for topic in &self.topics {
            if !seen_ids.insert(topic.id.as_str()) {
                bail!("duplicate topic id '{}'", topic.id);
            }
        }

        for (id, lesson) in &self.lessons {
            if !seen_ids.contains(id.as_str()) {
                bail!("lesson content for unknown topic id '{}'", id);
            }
            if let Some(quiz) = &lesson.quiz {
                if quiz.options.len() < 2 {
                    bail!("quiz for '{}' has fewer than two options", id);
                }
                if quiz.correct_answer >= quiz.options.len() {
                    bail!(
                        "quiz for '{}' has correctAnswer {} but only {} options",
                        id,
                        quiz.correct_answer,
                        quiz.options.len()
                    );
                }
            }
        }
        Ok(())
    }

    /// Topics in authored (insertion) order.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }

    pub fn lesson_content(&self, id: &str) -> Option<&LessonContent> {
        self.lessons.get(id)
    }

    /// Narrow the topic list by category and case-insensitive substring
    /// search over title and description. Pure membership, no ranking;
    /// catalog order is preserved.
    pub fn filter_topics(&self, filter: CategoryFilter, search: &str) -> Vec<&Topic> {
        let query = search.trim().to_lowercase();
        self.topics
            .iter()
            .filter(|topic| {
                filter.matches(topic.category)
                    && (query.is_empty()
                        || topic.title.to_lowercase().contains(&query)
                        || topic.description.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Previous and next topic within the current topic's category, in
    /// catalog order. Traversal never crosses a category boundary.
    pub fn adjacent_topics(&self, id: &str) -> (Option<&Topic>, Option<&Topic>) {
        let Some(current) = self.topic(id) else {
            return (None, None);
        };
        let siblings: Vec<&Topic> = self
            .topics
            .iter()
            .filter(|t| t.category == current.category)
            .collect();
        let Some(idx) = siblings.iter().position(|t| t.id == id) else {
            return (None, None);
        };
        let previous = if idx > 0 { Some(siblings[idx - 1]) } else { None };
        let next = siblings.get(idx + 1).copied();
        (previous, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::load_builtin().expect("builtin catalog should load")
    }

    #[test]
    fn test_builtin_catalog_loads_and_validates() {
        let cat = catalog();
        assert_eq!(cat.topics().len(), 25);
        // Every shipped lesson quiz passed bounds validation.
        for topic in cat.topics() {
            if let Some(lesson) = cat.lesson_content(&topic.id) {
                if let Some(quiz) = &lesson.quiz {
                    assert!(quiz.is_well_formed(), "quiz for {}", topic.id);
                }
            }
        }
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let cat = catalog();
        assert!(cat.topic("zz99").is_none());
        assert!(cat.lesson_content("zz99").is_none());
    }

    #[test]
    fn test_lesson_lookup_is_idempotent() {
        let cat = catalog();
        let first = cat.lesson_content("s1").cloned();
        let second = cat.lesson_content("s1").cloned();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_filter_all_empty_search_returns_catalog_in_order() {
        let cat = catalog();
        let filtered = cat.filter_topics(CategoryFilter::All, "");
        let ids: Vec<&str> = filtered.iter().map(|t| t.id.as_str()).collect();
        let all_ids: Vec<&str> = cat.topics().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, all_ids);
    }

    #[test]
    fn test_filter_preserves_relative_order() {
        let cat = catalog();
        for filter in CategoryFilter::all() {
            for search in ["", "a", "net", "image"] {
                let filtered = cat.filter_topics(filter, search);
                let positions: Vec<usize> = filtered
                    .iter()
                    .map(|t| cat.topics().iter().position(|c| c.id == t.id).unwrap())
                    .collect();
                let mut sorted = positions.clone();
                sorted.sort_unstable();
                assert_eq!(positions, sorted, "filter {:?} search {:?}", filter, search);
            }
        }
    }

    #[test]
    fn test_search_matches_title_and_description_case_insensitively() {
        let cat = catalog();
        let hits = cat.filter_topics(CategoryFilter::All, "LOOP");
        let ids: Vec<&str> = hits.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["s3"]);

        // Whitespace-only search behaves like an empty search.
        let blank = cat.filter_topics(CategoryFilter::All, "   ");
        assert_eq!(blank.len(), cat.topics().len());
    }

    #[test]
    fn test_filter_by_category_excludes_others() {
        let cat = catalog();
        let starters = cat.filter_topics(CategoryFilter::Only(Category::Starter), "");
        assert_eq!(starters.len(), 5);
        assert!(starters.iter().all(|t| t.category == Category::Starter));
    }

    #[test]
    fn test_empty_filter_result_is_valid() {
        let cat = catalog();
        let none = cat.filter_topics(CategoryFilter::Only(Category::Ui), "sockets");
        assert!(none.is_empty());
    }

    #[test]
    fn test_adjacent_topics_at_category_edges() {
        let cat = catalog();
        // First starter topic has no previous.
        let (prev, next) = cat.adjacent_topics("s1");
        assert!(prev.is_none());
        assert_eq!(next.map(|t| t.id.as_str()), Some("s2"));

        // Last starter topic has no next.
        let (prev, next) = cat.adjacent_topics("s5");
        assert_eq!(prev.map(|t| t.id.as_str()), Some("s4"));
        assert!(next.is_none());

        // Middle topic points at both neighbors.
        let (prev, next) = cat.adjacent_topics("s3");
        assert_eq!(prev.map(|t| t.id.as_str()), Some("s2"));
        assert_eq!(next.map(|t| t.id.as_str()), Some("s4"));
    }

    #[test]
    fn test_adjacent_topics_never_cross_categories() {
        let cat = catalog();
        // Last advanced topic: next is None, not the first ML topic.
        let (_, next) = cat.adjacent_topics("a4");
        assert!(next.is_none());
        // First advanced topic: previous is None, not the last starter.
        let (prev, _) = cat.adjacent_topics("a1");
        assert!(prev.is_none());
    }

    #[test]
    fn test_adjacent_topics_unknown_id() {
        let cat = catalog();
        let (prev, next) = cat.adjacent_topics("nope");
        assert!(prev.is_none() && next.is_none());
    }

    #[test]
    fn test_out_of_range_quiz_answer_fails_at_load() {
        let raw = r#"{
            "topics": [
                { "id": "t1", "category": "Starter", "title": "T", "description": "D" }
            ],
            "lessons": {
                "t1": {
                    "title": "T", "explanation": "E", "codeExample": "C",
                    "codeExplanation": "CE", "challenge": "CH",
                    "quiz": {
                        "question": "Q?",
                        "options": ["a", "b"],
                        "correctAnswer": 2,
                        "explanation": "X"
                    }
                }
            }
        }"#;
        assert!(Catalog::from_json(raw).is_err());
    }

    #[test]
    fn test_short_options_list_fails_at_load() {
        let raw = r#"{
            "topics": [
                { "id": "t1", "category": "Starter", "title": "T", "description": "D" }
            ],
            "lessons": {
                "t1": {
                    "title": "T", "explanation": "E", "codeExample": "C",
                    "codeExplanation": "CE", "challenge": "CH",
                    "quiz": {
                        "question": "Q?",
                        "options": ["only one"],
                        "correctAnswer": 0,
                        "explanation": "X"
                    }
                }
            }
        }"#;
        assert!(Catalog::from_json(raw).is_err());
    }

    #[test]
    fn test_duplicate_topic_id_fails_at_load() {
        let raw = r#"{
            "topics": [
                { "id": "t1", "category": "Starter", "title": "A", "description": "D" },
                { "id": "t1", "category": "Advanced", "title": "B", "description": "D" }
            ],
            "lessons": {}
        }"#;
        assert!(Catalog::from_json(raw).is_err());
    }

    #[test]
    fn test_lesson_for_unknown_topic_fails_at_load() {
        let raw = r#"{
            "topics": [
                { "id": "t1", "category": "Starter", "title": "A", "description": "D" }
            ],
            "lessons": {
                "ghost": {
                    "title": "T", "explanation": "E", "codeExample": "C",
                    "codeExplanation": "CE", "challenge": "CH"
                }
            }
        }"#;
        assert!(Catalog::from_json(raw).is_err());
    }
}
