use crate::domain::definition::SurveyDefinition;
use crate::error::NotifyError;
use crate::ingest::orchestrator::{Submission, CREATED_AT_KEY};
use serde::Serialize;
use serde_json::Value;

const NEGATIVE_ANSWERS: &[&str] = &[
    "Poor",
    "Very Poor",
    "No",
    "Not explained",
    "Not at all",
    "Not available",
    "Very inefficient",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowScore {
    /// Question name, or `question.row` for matrix rows.
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelledScore {
    pub question: String,
    pub answer: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    pub message: String,
    pub html: String,
}

fn is_low(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64().map(|v| v < 3.0).unwrap_or(false),
        Value::String(s) => NEGATIVE_ANSWERS.contains(&s.as_str()),
        Value::Bool(b) => !*b,
        _ => false,
    }
}

pub fn extract_low_scores(submission: &Submission) -> Vec<LowScore> {
    let mut low = Vec::new();
    for (key, value) in submission {
        if key == CREATED_AT_KEY {
            continue;
        }
        match value {
            Value::Object(rows) => {
                for (row, cell) in rows {
                    if is_low(cell) {
                        low.push(LowScore {
                            key: format!("{}.{}", key, row),
                            value: cell.clone(),
                        });
                    }
                }
            }
            other if is_low(other) => low.push(LowScore {
                key: key.clone(),
                value: other.clone(),
            }),
            _ => {}
        }
    }
    low
}

pub fn map_low_scores_to_questions(
    scores: &[LowScore],
    definition: &SurveyDefinition,
) -> Vec<LabelledScore> {
    scores
        .iter()
        .filter_map(|score| {
            let (name, row) = match score.key.split_once('.') {
                Some((name, row)) => (name, Some(row)),
                None => (score.key.as_str(), None),
            };
            let question = definition.get(name)?;
            let label = match row {
                Some(row) => format!("{} ({})", question.label(), row),
                None => question.label().to_string(),
            };
            Some(LabelledScore {
                question: label,
                answer: score.value.clone(),
            })
        })
        .collect()
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn build_message(scores: &[LabelledScore]) -> NotificationMessage {
    let mut message = String::from("Your survey received low responses to:\n");
    let mut html = String::from("<h2>Your survey received low responses to:</h2>");
    for score in scores {
        let answer = display(&score.answer);
        message.push_str(&format!("**{}**: {}\n\n", score.question, answer));
        html.push_str(&format!(
            "<p><strong>{}</strong>: {}</p>",
            escape_html(&score.question),
            escape_html(&answer)
        ));
    }
    message.push('\n');
    html.push_str("<br>");
    NotificationMessage { message, html }
}

/// Posts low-score alerts to an external webhook.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    pub async fn send(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(message).send().await?;
        let status = response.status();
        if status.is_success() {
            tracing::info!("Notification sent successfully");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Sends an alert when the submission contains low scores. Returns whether one was sent.
    pub async fn notify_low_scores(
        &self,
        submission: &Submission,
        definition: &SurveyDefinition,
    ) -> Result<bool, NotifyError> {
        let scores = map_low_scores_to_questions(&extract_low_scores(submission), definition);
        if scores.is_empty() {
            return Ok(false);
        }
        self.send(&build_message(&scores)).await?;
        Ok(true)
    }
}
