use crate::db::models::{AnswerSet, Question};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScoreSummary {
    pub(crate) score: f64,
    pub(crate) max_score: f64,
}

impl ScoreSummary {
    /// Whole percentage for display, floored at zero. The raw score is never clamped.
    pub(crate) fn display_percentage(&self) -> u32 {
        let denominator = if self.max_score == 0.0 { 1.0 } else { self.max_score };
        let percentage = (self.score / denominator * 100.0).round();
        if percentage <= 0.0 {
            0
        } else {
            percentage as u32
        }
    }
}

/// Marks each answered question: full marks when correct, minus the penalty when wrong.
/// Unanswered questions contribute nothing; `max_score` counts every question.
pub(crate) fn score_answers(questions: &[Question], answers: &AnswerSet) -> ScoreSummary {
    let mut score = 0.0;
    let mut max_score = 0.0;

    for question in questions {
        max_score += question.marks;
        match answers.get(&question.id) {
            None => {}
            Some(selected) if *selected == question.correct_option_index => {
                score += question.marks;
            }
            Some(_) => score -= question.negative_marks,
        }
    }

    ScoreSummary { score, max_score }
}
