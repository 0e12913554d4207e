use std::collections::HashMap;

use thiserror::Error;

use crate::db::models::{AnswerRecord, Question};
use crate::db::types::QuestionType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub(crate) enum GradingError {
    #[error("Question {0} is not part of this quiz")]
    UnknownQuestion(String),
    #[error("Question {0} was answered more than once")]
    DuplicateAnswer(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Grade {
    APlus,
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    DPlus,
    D,
    F,
}

impl Grade {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

const GRADE_THRESHOLDS: [(f64, Grade); 11] = [
    (90.0, Grade::APlus),
    (85.0, Grade::A),
    (80.0, Grade::AMinus),
    (75.0, Grade::BPlus),
    (70.0, Grade::B),
    (65.0, Grade::BMinus),
    (60.0, Grade::CPlus),
    (55.0, Grade::C),
    (50.0, Grade::CMinus),
    (45.0, Grade::DPlus),
    (40.0, Grade::D),
];

pub(crate) fn letter_grade(percentage: f64) -> Grade {
    GRADE_THRESHOLDS
        .iter()
        .find(|(lower, _)| percentage >= *lower)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::F)
}

#[derive(Debug, Clone)]
pub(crate) struct SubmittedAnswer {
    pub(crate) question_id: String,
    pub(crate) answer: String,
}

#[derive(Debug, Clone)]
pub(crate) struct GradedSubmission {
    pub(crate) answers: Vec<AnswerRecord>,
    pub(crate) score: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: Grade,
}

/// Grade `answers` against the full question set of a quiz.
///
/// Every question contributes to the total, answered or not. Only MCQs are
/// auto-marked; structured and essay answers are stored for manual review.
pub(crate) fn grade_submission(
    questions: &[Question],
    answers: &[SubmittedAnswer],
) -> Result<GradedSubmission, GradingError> {
    let mut by_question: HashMap<&str, &str> = HashMap::with_capacity(answers.len());
    for submitted in answers {
        if !questions.iter().any(|question| question.id == submitted.question_id) {
            return Err(GradingError::UnknownQuestion(submitted.question_id.clone()));
        }
        if by_question.insert(&submitted.question_id, &submitted.answer).is_some() {
            return Err(GradingError::DuplicateAnswer(submitted.question_id.clone()));
        }
    }

    let mut records = Vec::with_capacity(questions.len());
    let mut score = 0.0;
    let mut total_marks = 0.0;

    for question in questions {
        let answer = by_question.get(question.id.as_str()).copied().unwrap_or_default();
        let record = grade_answer(question, answer);
        score += record.marks_awarded;
        total_marks += record.max_marks;
        records.push(record);
    }

    let percentage = percentage(score, total_marks);
    Ok(GradedSubmission {
        answers: records,
        score,
        total_marks,
        percentage,
        grade: letter_grade(percentage),
    })
}

fn grade_answer(question: &Question, answer: &str) -> AnswerRecord {
    let (is_correct, needs_review) = match question.question_type {
        QuestionType::Mcq => {
            let correct = !answer.is_empty()
                && question.options.iter().any(|option| option.is_correct && option.text == answer);
            (correct, false)
        }
        QuestionType::Structured | QuestionType::Essay => (false, true),
    };

    AnswerRecord {
        question_id: question.id.clone(),
        question_type: question.question_type,
        student_answer: answer.to_string(),
        is_correct,
        marks_awarded: if is_correct { question.marks } else { 0.0 },
        max_marks: question.marks,
        needs_review,
    }
}

pub(crate) fn percentage(score: f64, total_marks: f64) -> f64 {
    if total_marks <= 0.0 {
        return 0.0;
    }
    round2(score / total_marks * 100.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::McqOption;
    use sqlx::types::Json;
    use time::macros::datetime;

    fn question(id: &str, question_type: QuestionType, marks: f64) -> Question {
        let options = match question_type {
            QuestionType::Mcq => vec![
                McqOption { text: "Borrow checker".to_string(), is_correct: true },
                McqOption { text: "Garbage collector".to_string(), is_correct: false },
            ],
            _ => Vec::new(),
        };
        Question {
            id: id.to_string(),
            module_id: "module-1".to_string(),
            module_code: "SE3010".to_string(),
            academic_year: 3,
            semester: 1,
            question_type,
            text: "What enforces memory safety in Rust?".to_string(),
            options: Json(options),
            reference_answer: None,
            marks,
            is_active: true,
            created_by: "teacher-1".to_string(),
            created_at: datetime!(2025-03-01 09:00),
            updated_at: datetime!(2025-03-01 09:00),
        }
    }

    fn answer(question_id: &str, answer: &str) -> SubmittedAnswer {
        SubmittedAnswer { question_id: question_id.to_string(), answer: answer.to_string() }
    }

    #[test]
    fn grade_thresholds_are_inclusive_lower_bounds() {
        assert_eq!(letter_grade(100.0), Grade::APlus);
        assert_eq!(letter_grade(90.0), Grade::APlus);
        assert_eq!(letter_grade(89.99), Grade::A);
        assert_eq!(letter_grade(72.5), Grade::B);
        assert_eq!(letter_grade(40.0), Grade::D);
        assert_eq!(letter_grade(39.99), Grade::F);
        assert_eq!(letter_grade(0.0), Grade::F);
        assert_eq!(Grade::AMinus.as_str(), "A-");
    }

    #[test]
    fn mcq_is_marked_by_correct_option_text() {
        let questions = vec![
            question("q1", QuestionType::Mcq, 2.0),
            question("q2", QuestionType::Mcq, 1.0),
        ];
        let graded = grade_submission(
            &questions,
            &[answer("q1", "Borrow checker"), answer("q2", "Garbage collector")],
        )
        .expect("graded");

        assert_eq!(graded.score, 2.0);
        assert_eq!(graded.total_marks, 3.0);
        assert_eq!(graded.percentage, 66.67);
        assert_eq!(graded.grade, Grade::BMinus);
        assert!(graded.answers[0].is_correct);
        assert!(!graded.answers[1].is_correct);
    }

    #[test]
    fn written_answers_need_review_and_score_zero() {
        let questions = vec![
            question("q1", QuestionType::Structured, 5.0),
            question("q2", QuestionType::Essay, 5.0),
        ];
        let graded =
            grade_submission(&questions, &[answer("q1", "Ownership"), answer("q2", "...")])
                .expect("graded");

        assert_eq!(graded.score, 0.0);
        assert_eq!(graded.total_marks, 10.0);
        assert!(graded.answers.iter().all(|record| record.needs_review && !record.is_correct));
    }

    #[test]
    fn unanswered_questions_count_toward_total() {
        let questions = vec![
            question("q1", QuestionType::Mcq, 1.0),
            question("q2", QuestionType::Mcq, 1.0),
        ];
        let graded = grade_submission(&questions, &[answer("q1", "Borrow checker")]).unwrap();

        assert_eq!(graded.total_marks, 2.0);
        assert_eq!(graded.percentage, 50.0);
        assert_eq!(graded.answers[1].student_answer, "");
        assert_eq!(graded.answers[1].marks_awarded, 0.0);
    }

    #[test]
    fn unknown_and_duplicate_answers_are_rejected() {
        let questions = vec![question("q1", QuestionType::Mcq, 1.0)];
        assert_eq!(
            grade_submission(&questions, &[answer("q9", "x")]).unwrap_err(),
            GradingError::UnknownQuestion("q9".to_string())
        );
        assert_eq!(
            grade_submission(&questions, &[answer("q1", "a"), answer("q1", "b")]).unwrap_err(),
            GradingError::DuplicateAnswer("q1".to_string())
        );
    }

    #[test]
    fn empty_quiz_scores_zero_percent() {
        let graded = grade_submission(&[], &[]).expect("graded");
        assert_eq!(graded.percentage, 0.0);
        assert_eq!(graded.grade, Grade::F);
    }
}
