use crate::catalog::QuizQuestion;

/// Lifecycle of one quiz attempt. Submitting is terminal for the current
/// question; opening a different question starts a fresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizPhase {
    #[default]
    Unanswered,
    Submitted,
}

/// Tracks a single selection against one quiz question.
#[derive(Debug, Clone, Default)]
pub struct QuizState {
    phase: QuizPhase,
    selected: Option<usize>,
}

impl QuizState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_submitted(&self) -> bool {
        self.phase == QuizPhase::Submitted
    }

    /// Pick an option. Repicking before submit replaces the selection;
    /// after submit this is a no-op.
    pub fn select_option(&mut self, index: usize, quiz: &QuizQuestion) {
        if self.phase == QuizPhase::Submitted {
            return;
        }
        if index < quiz.options.len() {
            self.selected = Some(index);
        }
    }

    /// Lock in the current selection. Does nothing without a selection.
    pub fn submit(&mut self) {
        if self.phase == QuizPhase::Unanswered && self.selected.is_some() {
            self.phase = QuizPhase::Submitted;
        }
    }

    /// Correctness of the recorded selection. Only meaningful once
    /// submitted; None before that.
    pub fn is_correct(&self, quiz: &QuizQuestion) -> Option<bool> {
        if self.phase != QuizPhase::Submitted {
            return None;
        }
        self.selected.map(|i| i == quiz.correct_answer)
    }

    /// Start over for a new question instance.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz() -> QuizQuestion {
        QuizQuestion {
            question: "Pick C".to_string(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: 2,
            explanation: "C was correct.".to_string(),
        }
    }

    #[test]
    fn test_last_selection_before_submit_wins() {
        let q = quiz();
        let mut state = QuizState::new();
        state.select_option(1, &q);
        state.select_option(2, &q);
        state.submit();
        assert_eq!(state.selected(), Some(2));
        assert!(state.is_submitted());
    }

    #[test]
    fn test_select_after_submit_is_noop() {
        let q = quiz();
        let mut state = QuizState::new();
        state.select_option(0, &q);
        state.submit();
        state.select_option(3, &q);
        assert_eq!(state.selected(), Some(0));
    }

    #[test]
    fn test_submit_without_selection_stays_unanswered() {
        let q = quiz();
        let mut state = QuizState::new();
        state.submit();
        assert_eq!(state.phase(), QuizPhase::Unanswered);
        assert_eq!(state.is_correct(&q), None);
    }

    #[test]
    fn test_correctness_after_submit() {
        let q = quiz();

        let mut right = QuizState::new();
        right.select_option(2, &q);
        right.submit();
        assert_eq!(right.is_correct(&q), Some(true));

        let mut wrong = QuizState::new();
        wrong.select_option(0, &q);
        wrong.submit();
        assert_eq!(wrong.is_correct(&q), Some(false));
    }

    #[test]
    fn test_correctness_hidden_before_submit() {
        let q = quiz();
        let mut state = QuizState::new();
        state.select_option(2, &q);
        assert_eq!(state.is_correct(&q), None);
    }

    #[test]
    fn test_out_of_range_selection_ignored() {
        let q = quiz();
        let mut state = QuizState::new();
        state.select_option(9, &q);
        assert_eq!(state.selected(), None);
        state.submit();
        assert!(!state.is_submitted());
    }

    #[test]
    fn test_reset_starts_fresh_attempt() {
        let q = quiz();
        let mut state = QuizState::new();
        state.select_option(1, &q);
        state.submit();
        state.reset();
        assert_eq!(state.phase(), QuizPhase::Unanswered);
        assert_eq!(state.selected(), None);
        // A new selection is accepted again after the reset.
        state.select_option(2, &q);
        assert_eq!(state.selected(), Some(2));
    }
}
