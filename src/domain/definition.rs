//! Read-only view of the SurveyJS document that defines the questionnaire.
//!
//! Submissions are keyed by question `name`; this catalogue supplies the
//! declared type for each name so the classifier knows which answer slot to fill.

use crate::error::DefinitionError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionType {
    Comment,
    Text,
    Rating,
    Nps,
    Boolean,
    RadioGroup,
    Dropdown,
    Matrix,
    Unsupported(String),
}

impl QuestionType {
    pub fn as_str(&self) -> &str {
        match self {
            QuestionType::Comment => "comment",
            QuestionType::Text => "text",
            QuestionType::Rating => "rating",
            QuestionType::Nps => "nps",
            QuestionType::Boolean => "boolean",
            QuestionType::RadioGroup => "radiogroup",
            QuestionType::Dropdown => "dropdown",
            QuestionType::Matrix => "matrix",
            QuestionType::Unsupported(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for QuestionType {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "comment" => QuestionType::Comment,
            "text" => QuestionType::Text,
            "rating" => QuestionType::Rating,
            "nps" => QuestionType::Nps,
            "boolean" => QuestionType::Boolean,
            "radiogroup" => QuestionType::RadioGroup,
            "dropdown" => QuestionType::Dropdown,
            "matrix" => QuestionType::Matrix,
            _ => QuestionType::Unsupported(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDefinition {
    pub name: String,
    pub title: Option<String>,
    pub question_type: QuestionType,
}

impl QuestionDefinition {
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SurveyDefinition {
    questions: Vec<QuestionDefinition>,
    by_name: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    pages: Vec<RawPage>,
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(default)]
    questions: Vec<RawElement>,
    #[serde(default)]
    elements: Vec<RawElement>,
}

#[derive(Deserialize)]
struct RawElement {
    #[serde(rename = "type", default)]
    kind: String,
    name: Option<String>,
    title: Option<serde_json::Value>,
    #[serde(default)]
    elements: Vec<RawElement>,
}

impl SurveyDefinition {
    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, DefinitionError> {
        let document: RawDocument = serde_json::from_str(raw)?;
        let mut definition = SurveyDefinition::default();
        for page in &document.pages {
            for element in page.questions.iter().chain(page.elements.iter()) {
                definition.collect(element);
            }
        }
        Ok(definition)
    }

    fn collect(&mut self, element: &RawElement) {
        if element.kind.eq_ignore_ascii_case("panel") {
            for child in &element.elements {
                self.collect(child);
            }
            return;
        }

        let Some(name) = element.name.as_deref().filter(|n| !n.is_empty()) else {
            return;
        };
        if self.by_name.contains_key(name) {
            tracing::debug!("Duplicate question name \"{}\" in survey definition, keeping first", name);
            return;
        }

        self.by_name.insert(name.to_string(), self.questions.len());
        self.questions.push(QuestionDefinition {
            name: name.to_string(),
            title: element.title.as_ref().and_then(localized_text),
            question_type: QuestionType::from(element.kind.as_str()),
        });
    }

    pub fn get(&self, name: &str) -> Option<&QuestionDefinition> {
        self.by_name.get(name).map(|&idx| &self.questions[idx])
    }

    pub fn questions(&self) -> impl Iterator<Item = &QuestionDefinition> {
        self.questions.iter()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

// SurveyJS titles are either a plain string or a locale map with a "default" entry.
fn localized_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Object(map) => map
            .get("default")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}
