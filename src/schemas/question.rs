use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{McqOption, Question};
use crate::db::types::QuestionType;

#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct OptionInput {
    #[validate(length(min = 1, max = 500, message = "option text must be 1-500 characters"))]
    pub(crate) text: String,
    #[serde(default, alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[serde(alias = "moduleId")]
    #[validate(length(min = 1, message = "module_id is required"))]
    pub(crate) module_id: String,
    #[serde(alias = "questionType", alias = "type")]
    pub(crate) question_type: QuestionType,
    #[validate(length(min = 1, max = 5000, message = "text must be 1-5000 characters"))]
    pub(crate) text: String,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) options: Vec<OptionInput>,
    #[serde(default, alias = "referenceAnswer")]
    pub(crate) reference_answer: Option<String>,
    #[serde(default = "default_marks")]
    #[validate(range(exclusive_min = 0.0, max = 100.0, message = "marks must be in (0, 100]"))]
    pub(crate) marks: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionUpdate {
    #[serde(default, alias = "questionType", alias = "type")]
    pub(crate) question_type: Option<QuestionType>,
    #[serde(default)]
    #[validate(length(min = 1, max = 5000, message = "text must be 1-5000 characters"))]
    pub(crate) text: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) options: Option<Vec<OptionInput>>,
    #[serde(default, alias = "referenceAnswer")]
    pub(crate) reference_answer: Option<String>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, max = 100.0, message = "marks must be in (0, 100]"))]
    pub(crate) marks: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionListQuery {
    #[serde(default, alias = "moduleId")]
    pub(crate) module_id: Option<String>,
    #[serde(default, alias = "questionType", alias = "type")]
    pub(crate) question_type: Option<QuestionType>,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(crate) limit: i64,
}

/// A question's type-dependent content after shape checks.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuestionBody {
    pub(crate) options: Vec<McqOption>,
    pub(crate) reference_answer: Option<String>,
}

/// MCQs need two or more distinct options with at least one correct; written
/// questions need a reference answer and carry no options.
pub(crate) fn check_question_shape(
    question_type: QuestionType,
    options: &[OptionInput],
    reference_answer: Option<&str>,
) -> Result<QuestionBody, String> {
    match question_type {
        QuestionType::Mcq => {
            if options.len() < 2 {
                return Err("MCQ questions need at least two options".to_string());
            }
            let mut cleaned: Vec<McqOption> = Vec::with_capacity(options.len());
            for option in options {
                let text = option.text.trim();
                if text.is_empty() {
                    return Err("Option text must not be empty".to_string());
                }
                if cleaned.iter().any(|existing| existing.text == text) {
                    return Err(format!("Duplicate option '{text}'"));
                }
                cleaned.push(McqOption { text: text.to_string(), is_correct: option.is_correct });
            }
            if !cleaned.iter().any(|option| option.is_correct) {
                return Err("MCQ questions need at least one correct option".to_string());
            }
            Ok(QuestionBody { options: cleaned, reference_answer: None })
        }
        QuestionType::Structured | QuestionType::Essay => {
            let answer = reference_answer.map(str::trim).filter(|answer| !answer.is_empty());
            let Some(answer) = answer else {
                return Err("Structured and essay questions need a reference answer".to_string());
            };
            Ok(QuestionBody { options: Vec::new(), reference_answer: Some(answer.to_string()) })
        }
    }
}

/// Teacher view, including the answer key.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) module_id: String,
    pub(crate) module_code: String,
    pub(crate) academic_year: i32,
    pub(crate) semester: i32,
    pub(crate) question_type: QuestionType,
    pub(crate) text: String,
    pub(crate) options: Vec<McqOption>,
    pub(crate) reference_answer: Option<String>,
    pub(crate) marks: f64,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuestionResponse {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            module_id: question.module_id,
            module_code: question.module_code,
            academic_year: question.academic_year,
            semester: question.semester,
            question_type: question.question_type,
            text: question.text,
            options: question.options.0,
            reference_answer: question.reference_answer,
            marks: question.marks,
            created_at: format_primitive(question.created_at),
            updated_at: format_primitive(question.updated_at),
        }
    }
}

/// What a student sees while taking a quiz: option texts only, no answer key.
#[derive(Debug, Serialize)]
pub(crate) struct StudentQuestionView {
    pub(crate) id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) text: String,
    pub(crate) options: Vec<String>,
    pub(crate) marks: f64,
}

impl StudentQuestionView {
    pub(crate) fn from_db(question: Question) -> Self {
        Self {
            id: question.id,
            question_type: question.question_type,
            text: question.text,
            options: question.options.0.into_iter().map(|option| option.text).collect(),
            marks: question.marks,
        }
    }
}

fn default_marks() -> f64 {
    1.0
}
