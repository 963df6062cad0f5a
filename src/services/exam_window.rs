use time::OffsetDateTime;

use crate::db::models::ExamDefinition;
use crate::db::types::ExamWindow;

/// Live means inside `[start, start + duration]` and not stopped by the teacher.
pub(crate) fn exam_window(exam: &ExamDefinition, now: OffsetDateTime) -> ExamWindow {
    if now < exam.start_time {
        return ExamWindow::Upcoming;
    }

    if !exam.stopped && now <= exam.end_time() {
        ExamWindow::Live
    } else {
        ExamWindow::Ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn exam(start: OffsetDateTime, minutes: i32, stopped: bool) -> ExamDefinition {
        ExamDefinition {
            id: "exam-1".to_string(),
            title: "Algebra".to_string(),
            description: String::new(),
            start_time: start,
            duration_minutes: minutes,
            questions: Vec::new(),
            creator_id: "teacher-1".to_string(),
            stopped,
            created_at: start,
        }
    }

    #[test]
    fn window_follows_schedule() {
        let start = OffsetDateTime::now_utc();
        let definition = exam(start, 30, false);

        assert_eq!(exam_window(&definition, start - Duration::minutes(1)), ExamWindow::Upcoming);
        assert_eq!(exam_window(&definition, start), ExamWindow::Live);
        assert_eq!(exam_window(&definition, start + Duration::minutes(30)), ExamWindow::Live);
        assert_eq!(exam_window(&definition, start + Duration::minutes(31)), ExamWindow::Ended);
    }

    #[test]
    fn stopped_exam_has_ended() {
        let start = OffsetDateTime::now_utc();
        let definition = exam(start, 30, true);
        assert_eq!(exam_window(&definition, start + Duration::minutes(5)), ExamWindow::Ended);
    }
}
