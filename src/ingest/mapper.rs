use crate::db::{SurveyStore, SurveyTransaction};
use crate::domain::models::QuestionNameMap;
use crate::error::MappingError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Name -> question id lookup built from the `questions_map` table.
#[derive(Debug, Default)]
pub struct MappingIndex {
    by_name: HashMap<String, i32>,
}

impl MappingIndex {
    pub fn from_mappings(mappings: &[QuestionNameMap]) -> Self {
        let mut index = MappingIndex::default();
        for mapping in mappings {
            if index.by_name.contains_key(&mapping.question_name) {
                tracing::warn!(
                    "Question name \"{}\" is mapped more than once, ignoring question {}",
                    mapping.question_name,
                    mapping.question_id
                );
                continue;
            }
            index
                .by_name
                .insert(mapping.question_name.clone(), mapping.question_id);
        }
        index
    }

    pub fn resolve(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// A persisted question paired with the submission name it should answer to.
#[derive(Debug, Clone, Copy)]
pub struct MappedQuestion<'a> {
    pub question_id: i32,
    pub name: &'a str,
    pub title: &'a str,
}

/// Process-wide cache of the mapping table.
///
/// Loaded on first use and kept until [`QuestionNameMapper::invalidate`] is called.
/// A failed load leaves the cache empty; there is no fallback mapping set.
#[derive(Default)]
pub struct QuestionNameMapper {
    cache: RwLock<Option<Arc<MappingIndex>>>,
}

impl QuestionNameMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mappings<S>(&self, store: &S) -> Result<Arc<MappingIndex>, sqlx::Error>
    where
        S: SurveyStore + ?Sized,
    {
        self.load_with(|| store.question_mappings()).await
    }

    /// Same as [`QuestionNameMapper::mappings`], but a cache miss is read on `tx`'s connection.
    pub async fn mappings_in(
        &self,
        tx: &mut dyn SurveyTransaction,
    ) -> Result<Arc<MappingIndex>, sqlx::Error> {
        self.load_with(move || tx.question_mappings()).await
    }

    async fn load_with<F, Fut>(&self, load: F) -> Result<Arc<MappingIndex>, sqlx::Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<QuestionNameMap>, sqlx::Error>>,
    {
        if let Some(index) = self.cache.read().await.as_ref() {
            return Ok(index.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(index) = cache.as_ref() {
            return Ok(index.clone());
        }

        let rows = load().await?;
        let index = Arc::new(MappingIndex::from_mappings(&rows));
        tracing::info!("Loaded {} question name mappings", index.len());
        *cache = Some(index.clone());
        Ok(index)
    }

    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        if cache.take().is_some() {
            tracing::debug!("Question name mapping cache invalidated");
        }
    }

    pub async fn ensure_mapping<S>(
        &self,
        store: &S,
        question: MappedQuestion<'_>,
        survey_id: i32,
    ) -> Result<(), MappingError>
    where
        S: SurveyStore + ?Sized,
    {
        if store.mapping_exists(question.question_id).await? {
            return Err(MappingError::AlreadyMapped(question.question_id));
        }

        let mapping = QuestionNameMap {
            question_id: question.question_id,
            question_name: question.name.to_string(),
        };
        store
            .insert_question_mapping(&mapping, survey_id)
            .await
            .map_err(|e| {
                let duplicate =
                    matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
                if duplicate {
                    MappingError::AlreadyMapped(question.question_id)
                } else {
                    MappingError::Storage(e)
                }
            })?;

        tracing::info!(
            "Mapped question \"{}\" with ID {} to name \"{}\"",
            question.title,
            question.question_id,
            question.name
        );
        self.invalidate().await;
        Ok(())
    }
}
