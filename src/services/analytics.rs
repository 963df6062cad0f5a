use crate::db::models::{Attempt, ExamDefinition};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuestionStats {
    pub(crate) question_id: String,
    pub(crate) label: String,
    pub(crate) text: String,
    pub(crate) correct_count: usize,
    pub(crate) wrong_count: usize,
    pub(crate) success_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ExamAnalytics {
    pub(crate) attempts: usize,
    pub(crate) average_score: f64,
    pub(crate) highest_score: f64,
    pub(crate) lowest_score: f64,
    pub(crate) pass_threshold: f64,
    pub(crate) pass_count: usize,
    pub(crate) fail_count: usize,
    pub(crate) average_time_seconds: f64,
    pub(crate) min_time_seconds: f64,
    pub(crate) max_time_seconds: f64,
    pub(crate) questions: Vec<QuestionStats>,
    pub(crate) most_correct: Option<QuestionStats>,
    pub(crate) most_wrong: Option<QuestionStats>,
}

pub(crate) fn pass_threshold(exam: &ExamDefinition, pass_ratio: f64) -> f64 {
    exam.total_marks() * pass_ratio
}

/// Aggregate statistics over finished attempts. `None` when nobody has attempted the exam.
pub(crate) fn summarize(
    exam: &ExamDefinition,
    attempts: &[Attempt],
    pass_ratio: f64,
) -> Option<ExamAnalytics> {
    if attempts.is_empty() {
        return None;
    }
    let count = attempts.len() as f64;

    let scores: Vec<f64> = attempts.iter().map(|attempt| attempt.score).collect();
    let threshold = pass_threshold(exam, pass_ratio);
    let pass_count = scores.iter().filter(|score| **score >= threshold).count();

    let durations: Vec<f64> = attempts.iter().map(Attempt::time_taken_seconds).collect();

    let questions: Vec<QuestionStats> = exam
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let selections = attempts.iter().filter_map(|attempt| attempt.answers.get(&question.id));
            let (correct_count, answered) =
                selections.fold((0, 0), |(correct, answered), selected| {
                    (correct + usize::from(*selected == question.correct_option_index), answered + 1)
                });

            QuestionStats {
                question_id: question.id.clone(),
                label: format!("Question {}", index + 1),
                text: question.text.clone(),
                correct_count,
                wrong_count: answered - correct_count,
                success_rate: correct_count as f64 / answered.max(1) as f64 * 100.0,
            }
        })
        .collect();

    // Ties go to the earlier question.
    let most_correct = leader(&questions, |stats| stats.correct_count);
    let most_wrong = leader(&questions, |stats| stats.wrong_count);

    Some(ExamAnalytics {
        attempts: attempts.len(),
        average_score: scores.iter().sum::<f64>() / count,
        highest_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        lowest_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
        pass_threshold: threshold,
        pass_count,
        fail_count: attempts.len() - pass_count,
        average_time_seconds: durations.iter().sum::<f64>() / count,
        min_time_seconds: durations.iter().copied().fold(f64::INFINITY, f64::min),
        max_time_seconds: durations.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        questions,
        most_correct,
        most_wrong,
    })
}

fn leader(questions: &[QuestionStats], key: impl Fn(&QuestionStats) -> usize) -> Option<QuestionStats> {
    questions
        .iter()
        .fold(None::<&QuestionStats>, |best, stats| match best {
            Some(best) if key(best) >= key(stats) => Some(best),
            _ => Some(stats),
        })
        .cloned()
}
