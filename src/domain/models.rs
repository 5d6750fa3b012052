use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Association between a persisted question and the name used as its key in submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct QuestionNameMap {
    pub question_id: i32,
    pub question_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DropdownOption {
    pub option_id: i32,
    pub question_id: i32,
    pub option_text: String,
}

/// The single populated value slot of an answer row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnswerValue {
    Text(String),
    Rating(i32),
    Boolean(bool),
    Radio(String),
    /// Resolved dropdown option; `None` when the submitted text matched no option.
    Dropdown(Option<i32>),
    /// One row of a matrix question: the row key lands in the text slot.
    MatrixRow { row: String, rating: i32 },
}

/// Column projection of an [`AnswerValue`] onto the `answers` table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnswerSlots {
    pub answer_text: Option<String>,
    pub answer_rating: Option<i32>,
    pub answer_boolean: Option<bool>,
    pub answer_radio: Option<String>,
    pub answer_dropdown: Option<i32>,
}

impl AnswerValue {
    pub fn slots(&self) -> AnswerSlots {
        match self {
            AnswerValue::Text(text) => AnswerSlots {
                answer_text: Some(text.clone()),
                ..Default::default()
            },
            AnswerValue::Rating(rating) => AnswerSlots {
                answer_rating: Some(*rating),
                ..Default::default()
            },
            AnswerValue::Boolean(value) => AnswerSlots {
                answer_boolean: Some(*value),
                ..Default::default()
            },
            AnswerValue::Radio(choice) => AnswerSlots {
                answer_radio: Some(choice.clone()),
                ..Default::default()
            },
            AnswerValue::Dropdown(option_id) => AnswerSlots {
                answer_dropdown: *option_id,
                ..Default::default()
            },
            AnswerValue::MatrixRow { row, rating } => AnswerSlots {
                answer_text: Some(row.clone()),
                answer_rating: Some(*rating),
                ..Default::default()
            },
        }
    }
}

/// An answer row ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAnswer {
    pub response_id: i32,
    pub question_id: i32,
    pub value: AnswerValue,
}
