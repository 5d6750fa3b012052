//! Turns one survey submission into a response row plus its answer rows.
//!
//! The whole submission runs inside a single transaction:
//!
//! 1. insert the response row
//! 2. map each submitted name to a question id and classify its value
//! 3. preload dropdown options for the staged dropdown answers and resolve them
//! 4. insert all answers in bounded chunks, then commit
//!
//! Fields that cannot be mapped, typed or classified are logged and dropped.
//! Any storage failure rolls the whole submission back.

use crate::db::{SurveyStore, SurveyTransaction, MAX_ANSWERS_PER_INSERT};
use crate::domain::classifier::{classify, PendingAnswer};
use crate::domain::definition::SurveyDefinition;
use crate::domain::models::{AnswerValue, NewAnswer};
use crate::error::IngestError;
use crate::ingest::dropdown::DropdownOptionResolver;
use crate::ingest::mapper::QuestionNameMapper;
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Submission key carrying the caller's response timestamp rather than an answer.
pub const CREATED_AT_KEY: &str = "createdAt";

pub type Submission = Map<String, Value>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub response_id: i32,
    pub answers_stored: usize,
    pub skipped_fields: usize,
    pub unmatched_dropdowns: usize,
}

pub struct SurveyIngestor {
    definition: Arc<SurveyDefinition>,
    mapper: Arc<QuestionNameMapper>,
    dropdowns: Arc<DropdownOptionResolver>,
    chunk_size: usize,
}

impl SurveyIngestor {
    pub fn new(
        definition: Arc<SurveyDefinition>,
        mapper: Arc<QuestionNameMapper>,
        dropdowns: Arc<DropdownOptionResolver>,
        chunk_size: usize,
    ) -> Result<Self, IngestError> {
        if chunk_size == 0 || chunk_size > MAX_ANSWERS_PER_INSERT {
            return Err(IngestError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            definition,
            mapper,
            dropdowns,
            chunk_size,
        })
    }

    pub fn definition(&self) -> &SurveyDefinition {
        &self.definition
    }

    pub async fn warm_mappings<S>(&self, store: &S) -> Result<usize, sqlx::Error>
    where
        S: SurveyStore + ?Sized,
    {
        Ok(self.mapper.mappings(store).await?.len())
    }

    /// Drops cached mappings and dropdown options so the next submission reloads them.
    pub async fn invalidate_caches(&self) {
        self.mapper.invalidate().await;
        self.dropdowns.invalidate().await;
    }

    /// Stores `submission` as a new response of `survey_id` and returns the response id.
    ///
    /// Either every resolvable answer is committed with the response, or nothing is.
    /// Dropping the returned future before it completes rolls the transaction back.
    pub async fn process_survey_response<S>(
        &self,
        store: &S,
        submission: &Submission,
        survey_id: i32,
    ) -> Result<i32, IngestError>
    where
        S: SurveyStore + ?Sized,
    {
        let mut tx = store.begin().await?;

        let report = match self.ingest(tx.as_mut(), submission, survey_id).await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Error processing survey response: {}", e);
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Rollback after failed ingestion also failed: {}", rollback_err);
                }
                return Err(e);
            }
        };

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit survey response {}: {}", report.response_id, e);
            IngestError::Storage(e)
        })?;

        tracing::info!(
            "Stored response {} with {} answers ({} fields skipped, {} unmatched dropdowns)",
            report.response_id,
            report.answers_stored,
            report.skipped_fields,
            report.unmatched_dropdowns
        );
        Ok(report.response_id)
    }

    async fn ingest(
        &self,
        tx: &mut dyn SurveyTransaction,
        submission: &Submission,
        survey_id: i32,
    ) -> Result<IngestReport, IngestError> {
        let created_at = submission_timestamp(submission);
        let response_id = tx
            .insert_response(survey_id, created_at)
            .await?
            .ok_or(IngestError::ResponseNotCreated)?;

        let mappings = self.mapper.mappings_in(tx).await?;
        if mappings.is_empty() {
            tracing::warn!("No question name mappings loaded, every field will be skipped");
        }

        let mut report = IngestReport {
            response_id,
            ..Default::default()
        };
        let mut pending: Vec<PendingAnswer> = Vec::new();

        for (name, value) in submission {
            if name == CREATED_AT_KEY || value.is_null() {
                continue;
            }

            let Some(question_id) = mappings.resolve(name) else {
                tracing::warn!("No mapped question ID found for key \"{}\"", name);
                report.skipped_fields += 1;
                continue;
            };

            let Some(question) = self.definition.get(name) else {
                tracing::warn!("Question \"{}\" is not in the survey definition", name);
                report.skipped_fields += 1;
                continue;
            };

            match classify(&question.question_type, question_id, response_id, value) {
                Ok(answers) => pending.extend(answers),
                Err(e) => {
                    tracing::warn!("Skipping field \"{}\": {}", name, e);
                    report.skipped_fields += 1;
                }
            }
        }

        let dropdown_questions: BTreeSet<i32> = pending
            .iter()
            .filter_map(|answer| match answer {
                PendingAnswer::PendingDropdown { question_id, .. } => Some(*question_id),
                PendingAnswer::Resolved(_) => None,
            })
            .collect();
        let options = self.dropdowns.preload(tx, &dropdown_questions).await?;

        let answers: Vec<NewAnswer> = pending
            .into_iter()
            .map(|answer| match answer {
                PendingAnswer::Resolved(answer) => answer,
                PendingAnswer::PendingDropdown {
                    response_id,
                    question_id,
                    selection,
                } => {
                    let option_id = options.resolve(question_id, &selection);
                    if option_id.is_none() {
                        // TODO: confirm with product whether unmatched options should reject the submission
                        tracing::warn!(
                            "Dropdown option \"{}\" not found for question {}, storing without option",
                            selection,
                            question_id
                        );
                        report.unmatched_dropdowns += 1;
                    }
                    NewAnswer {
                        response_id,
                        question_id,
                        value: AnswerValue::Dropdown(option_id),
                    }
                }
            })
            .collect();

        for chunk in answers.chunks(self.chunk_size) {
            tx.insert_answers(chunk).await?;
        }
        report.answers_stored = answers.len();

        Ok(report)
    }
}

fn submission_timestamp(submission: &Submission) -> Option<NaiveDateTime> {
    let value = submission.get(CREATED_AT_KEY)?;
    let parsed = value.as_str().and_then(parse_timestamp);
    if parsed.is_none() && !value.is_null() {
        tracing::warn!("Ignoring unparseable {} value {}", CREATED_AT_KEY, value);
    }
    parsed
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
