use crate::domain::definition::QuestionType;
use crate::domain::models::{AnswerValue, NewAnswer};
use serde_json::Value;
use thiserror::Error;

/// Output of classification, before dropdown text has been turned into option ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAnswer {
    Resolved(NewAnswer),
    PendingDropdown {
        response_id: i32,
        question_id: i32,
        selection: String,
    },
}

/// Why a submitted field produced no answers. Never fatal to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("unsupported question type \"{0}\"")]
    UnsupportedType(String),
    #[error("{question_type} question expects {expected}")]
    ShapeMismatch {
        question_type: String,
        expected: &'static str,
    },
}

/// Turns one submitted value into answer records according to the question's declared type.
///
/// Pure: the same inputs always yield the same records. Matrix values expand to
/// one record per row; dropdown values are staged for option-id resolution.
pub fn classify(
    question_type: &QuestionType,
    question_id: i32,
    response_id: i32,
    value: &Value,
) -> Result<Vec<PendingAnswer>, ClassifyError> {
    if value.is_null() {
        return Ok(Vec::new());
    }

    let mismatch = |expected: &'static str| ClassifyError::ShapeMismatch {
        question_type: question_type.as_str().to_string(),
        expected,
    };
    let resolved = |value: AnswerValue| {
        vec![PendingAnswer::Resolved(NewAnswer {
            response_id,
            question_id,
            value,
        })]
    };

    match question_type {
        QuestionType::Comment | QuestionType::Text => {
            let text = value.as_str().ok_or_else(|| mismatch("a string"))?;
            Ok(resolved(AnswerValue::Text(text.to_string())))
        }
        QuestionType::Rating | QuestionType::Nps => {
            let rating = as_rating(value).ok_or_else(|| mismatch("an integer"))?;
            Ok(resolved(AnswerValue::Rating(rating)))
        }
        QuestionType::Boolean => {
            let flag = as_bool(value).ok_or_else(|| mismatch("a boolean"))?;
            Ok(resolved(AnswerValue::Boolean(flag)))
        }
        QuestionType::RadioGroup => {
            let choice = as_choice_text(value).ok_or_else(|| mismatch("a string"))?;
            Ok(resolved(AnswerValue::Radio(choice)))
        }
        QuestionType::Dropdown => {
            let selection = as_choice_text(value).ok_or_else(|| mismatch("a string"))?;
            Ok(vec![PendingAnswer::PendingDropdown {
                response_id,
                question_id,
                selection,
            }])
        }
        QuestionType::Matrix => {
            let rows = value
                .as_object()
                .ok_or_else(|| mismatch("an object of row ratings"))?;
            rows.iter()
                .map(|(row, cell)| {
                    let rating = as_rating(cell).ok_or_else(|| mismatch("integer row ratings"))?;
                    Ok(PendingAnswer::Resolved(NewAnswer {
                        response_id,
                        question_id,
                        value: AnswerValue::MatrixRow {
                            row: row.clone(),
                            rating,
                        },
                    }))
                })
                .collect()
        }
        QuestionType::Unsupported(raw) => Err(ClassifyError::UnsupportedType(raw.clone())),
    }
}

fn as_rating(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i32::MIN as f64 && *f <= i32::MAX as f64)
                    .map(|f| f as i32)
            }
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// SurveyJS emits choice values as strings, or as numbers for numeric choice lists.
fn as_choice_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
