use anyhow::Result;
use regex::Regex;

use crate::catalog::{LessonContent, Topic};

/// Sentinel title for a lesson that failed to generate. Callers check the
/// title instead of handling a separate error path.
pub const ERROR_LESSON_TITLE: &str = "Error Loading Lesson";

pub const FOLLOW_UP_APOLOGY: &str =
    "Sorry, I couldn't reach the tutor just now. Please try asking again.";

pub const SIMULATION_ERROR: &str = "Error running simulation.";

/// Prompt asking the provider for a complete lesson as a bare JSON object.
pub fn lesson_prompt(topic: &Topic) -> String {
    format!(
        "You are writing one lesson for an interactive Python course.\n\
         Topic: {title}\n\
         Category: {category}\n\
         Topic summary: {description}\n\n\
         Respond with a single JSON object and nothing else, using exactly these keys:\n\
         - \"title\": string, the lesson title\n\
         - \"explanation\": string, a markdown explanation of the concept (2-4 paragraphs)\n\
         - \"codeExample\": string, a runnable Python example\n\
         - \"codeExplanation\": string, markdown walking through the example\n\
         - \"challenge\": string, a short exercise for the learner\n\
         - \"expectedOutput\": string, what the example prints (optional)\n\
         - \"quiz\": object with \"question\" (string), \"options\" (array of 4 strings),\n\
           \"correctAnswer\" (integer index into options), \"explanation\" (string) (optional)\n",
        title = topic.title,
        category = topic.category.display_name(),
        description = topic.description,
    )
}

/// Prompt for a single tutor turn. The caller supplies all continuity
/// (lesson material and prior turns) in `context`; nothing is held here.
pub fn follow_up_prompt(question: &str, context: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a friendly Python tutor answering a follow-up question about a lesson. \
         Keep answers short and concrete, with small code snippets where they help.\n\n",
    );
    if !context.is_empty() {
        prompt.push_str("Context:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Question: ");
    prompt.push_str(question);
    prompt
}

/// Prompt asking the provider to predict what a code sample does.
pub fn simulation_prompt(code: &str) -> String {
    format!(
        "Predict the output of this Python program. If it draws a window or an image, \
         describe what would appear instead. Reply with the predicted output only, \
         no commentary.\n\n```python\n{}\n```",
        code
    )
}

/// Turn a provider response into a lesson. Never fails: transport errors,
/// malformed JSON, and missing required fields all produce the sentinel
/// lesson so the view always leaves its loading state.
pub fn lesson_from_response(response: Result<String>) -> LessonContent {
    let text = match response {
        Ok(text) => text,
        Err(e) => return error_lesson(&e.to_string()),
    };

    let Some(json) = extract_json_object(&text) else {
        return error_lesson("the response contained no JSON object");
    };

    let mut lesson: LessonContent = match serde_json::from_str(&json) {
        Ok(lesson) => lesson,
        Err(e) => return error_lesson(&format!("the response JSON was malformed: {}", e)),
    };

    // Generated quizzes are runtime data: a broken answer key drops the
    // quiz, the lesson body is kept.
    if let Some(quiz) = &lesson.quiz {
        if !quiz.is_well_formed() {
            lesson.quiz = None;
        }
    }

    lesson
}

/// Turn a tutor response into display text. Never fails.
pub fn answer_from_response(response: Result<String>) -> String {
    match response {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => FOLLOW_UP_APOLOGY.to_string(),
    }
}

/// Turn a simulation response into display text. Never fails.
pub fn simulation_from_response(response: Result<String>) -> String {
    match response {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => SIMULATION_ERROR.to_string(),
    }
}

fn error_lesson(detail: &str) -> LessonContent {
    LessonContent {
        title: ERROR_LESSON_TITLE.to_string(),
        explanation: format!(
            "The lesson could not be generated: {}.\n\nCheck that the active provider is \
             reachable (press `P` to switch providers) or toggle back to the built-in \
             lessons with `o` on the dashboard.",
            detail
        ),
        code_example: String::new(),
        code_explanation: String::new(),
        challenge: String::new(),
        expected_output: None,
        quiz: None,
    }
}

/// Pull a JSON object out of model output. Models frequently wrap JSON in
/// a ```json fence or surround it with prose despite instructions.
fn extract_json_object(text: &str) -> Option<String> {
    let fence = Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fence regex");
    if let Some(captures) = fence.captures(text) {
        return Some(captures[1].to_string());
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(text[start..=end].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crate::catalog::Category;

    const LESSON_JSON: &str = r#"{
        "title": "Loops",
        "explanation": "Loops repeat work.",
        "codeExample": "for i in range(3):\n    print(i)",
        "codeExplanation": "range(3) yields 0..2.",
        "challenge": "Print the 7 times table.",
        "expectedOutput": "0\n1\n2",
        "quiz": {
            "question": "How many iterations?",
            "options": ["2", "3", "4", "5"],
            "correctAnswer": 1,
            "explanation": "range(3) has three values."
        }
    }"#;

    fn topic() -> Topic {
        Topic {
            id: "s3".to_string(),
            title: "Loops".to_string(),
            category: Category::Starter,
            description: "For loops, While loops, and iteration.".to_string(),
        }
    }

    #[test]
    fn test_lesson_from_bare_json() {
        let lesson = lesson_from_response(Ok(LESSON_JSON.to_string()));
        assert_eq!(lesson.title, "Loops");
        assert!(lesson.quiz.is_some());
    }

    #[test]
    fn test_lesson_from_fenced_json() {
        let wrapped = format!("Here is your lesson:\n```json\n{}\n```\nEnjoy!", LESSON_JSON);
        let lesson = lesson_from_response(Ok(wrapped));
        assert_eq!(lesson.title, "Loops");
        assert_eq!(lesson.expected_output.as_deref(), Some("0\n1\n2"));
    }

    #[test]
    fn test_transport_error_yields_sentinel_lesson() {
        let lesson = lesson_from_response(Err(anyhow!("connection refused")));
        assert_eq!(lesson.title, ERROR_LESSON_TITLE);
        assert!(lesson.explanation.contains("connection refused"));
    }

    #[test]
    fn test_malformed_json_yields_sentinel_lesson() {
        let lesson = lesson_from_response(Ok("{ not json at all".to_string()));
        assert_eq!(lesson.title, ERROR_LESSON_TITLE);
    }

    #[test]
    fn test_missing_required_field_yields_sentinel_lesson() {
        // No codeExample.
        let lesson = lesson_from_response(Ok(r#"{
            "title": "T", "explanation": "E",
            "codeExplanation": "CE", "challenge": "CH"
        }"#
        .to_string()));
        assert_eq!(lesson.title, ERROR_LESSON_TITLE);
    }

    #[test]
    fn test_prose_without_json_yields_sentinel_lesson() {
        let lesson = lesson_from_response(Ok("I cannot produce a lesson right now.".to_string()));
        assert_eq!(lesson.title, ERROR_LESSON_TITLE);
    }

    #[test]
    fn test_out_of_range_generated_quiz_is_dropped() {
        let raw = r#"{
            "title": "T", "explanation": "E", "codeExample": "C",
            "codeExplanation": "CE", "challenge": "CH",
            "quiz": {
                "question": "Q?",
                "options": ["a", "b"],
                "correctAnswer": 5,
                "explanation": "X"
            }
        }"#;
        let lesson = lesson_from_response(Ok(raw.to_string()));
        assert_eq!(lesson.title, "T");
        assert!(lesson.quiz.is_none());
    }

    #[test]
    fn test_answer_fallbacks() {
        assert_eq!(
            answer_from_response(Ok("  Use a for loop.  ".to_string())),
            "Use a for loop."
        );
        assert_eq!(answer_from_response(Ok("   ".to_string())), FOLLOW_UP_APOLOGY);
        assert_eq!(answer_from_response(Err(anyhow!("timeout"))), FOLLOW_UP_APOLOGY);
    }

    #[test]
    fn test_simulation_fallbacks() {
        assert_eq!(simulation_from_response(Ok("0\n1\n2".to_string())), "0\n1\n2");
        assert_eq!(simulation_from_response(Err(anyhow!("boom"))), SIMULATION_ERROR);
    }

    #[test]
    fn test_lesson_prompt_names_topic_and_category() {
        let prompt = lesson_prompt(&topic());
        assert!(prompt.contains("Loops"));
        assert!(prompt.contains("Starter"));
        assert!(prompt.contains("codeExample"));
    }

    #[test]
    fn test_follow_up_prompt_includes_context_and_question() {
        let prompt = follow_up_prompt("Why range?", "Lesson: Loops");
        assert!(prompt.contains("Lesson: Loops"));
        assert!(prompt.ends_with("Question: Why range?"));
    }
}
