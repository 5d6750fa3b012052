use crate::db::SurveyStore;
use crate::domain::definition::SurveyDefinition;
use crate::error::MappingError;
use crate::ingest::mapper::{MappedQuestion, QuestionNameMapper};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub mapped: usize,
    pub already_mapped: usize,
    pub missing: usize,
    pub failed: usize,
}

/// Maps every titled question in the definition to the persisted question with the same text.
///
/// One question failing never stops the run; each outcome is counted in the report.
pub async fn backfill_mappings<S>(
    store: &S,
    mapper: &QuestionNameMapper,
    definition: &SurveyDefinition,
    survey_id: i32,
) -> BackfillReport
where
    S: SurveyStore + ?Sized,
{
    let mut report = BackfillReport::default();

    for question in definition.questions() {
        let Some(title) = question.title.as_deref() else {
            continue;
        };

        let question_id = match store.find_question_id_by_text(title).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::warn!("{}", MappingError::QuestionNotFound(title.to_string()));
                report.missing += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("Failed to look up question \"{}\": {}", title, e);
                report.failed += 1;
                continue;
            }
        };

        let candidate = MappedQuestion {
            question_id,
            name: &question.name,
            title,
        };
        match mapper.ensure_mapping(store, candidate, survey_id).await {
            Ok(()) => report.mapped += 1,
            Err(MappingError::AlreadyMapped(id)) => {
                tracing::warn!("Question {} (\"{}\") is already mapped", id, question.name);
                report.already_mapped += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to map question \"{}\": {}", question.name, e);
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        "Mapping completed: {} mapped, {} already mapped, {} missing, {} failed",
        report.mapped,
        report.already_mapped,
        report.missing,
        report.failed
    );
    report
}
