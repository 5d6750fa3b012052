use crate::db::SurveyTransaction;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type OptionIndex = HashMap<String, i32>;

/// Option text -> option id for a fixed set of questions, taken after a preload.
#[derive(Debug, Default, Clone)]
pub struct DropdownSnapshot {
    options: HashMap<i32, Arc<OptionIndex>>,
}

impl DropdownSnapshot {
    pub fn resolve(&self, question_id: i32, option_text: &str) -> Option<i32> {
        self.options
            .get(&question_id)?
            .get(option_text.trim())
            .copied()
    }
}

/// Process-wide dropdown option cache keyed by question id, then option text.
///
/// Entries are replaced whole, never edited in place. When two options of one
/// question share the same text the lowest option id wins.
#[derive(Default)]
pub struct DropdownOptionResolver {
    cache: RwLock<HashMap<i32, Arc<OptionIndex>>>,
}

impl DropdownOptionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options for any of `question_ids` not yet cached, in one query on `tx`.
    pub async fn preload(
        &self,
        tx: &mut dyn SurveyTransaction,
        question_ids: &BTreeSet<i32>,
    ) -> Result<DropdownSnapshot, sqlx::Error> {
        let mut snapshot = DropdownSnapshot::default();
        if question_ids.is_empty() {
            return Ok(snapshot);
        }

        let mut missing = Vec::new();
        {
            let cache = self.cache.read().await;
            for id in question_ids {
                match cache.get(id) {
                    Some(index) => {
                        snapshot.options.insert(*id, index.clone());
                    }
                    None => missing.push(*id),
                }
            }
        }

        if missing.is_empty() {
            return Ok(snapshot);
        }

        let rows = tx.dropdown_options(&missing).await?;
        tracing::debug!(
            "Loaded {} dropdown options for {} questions",
            rows.len(),
            missing.len()
        );

        let mut grouped: HashMap<i32, OptionIndex> =
            missing.iter().map(|id| (*id, OptionIndex::new())).collect();
        for row in rows {
            let index = grouped.entry(row.question_id).or_default();
            let text = row.option_text.trim().to_string();
            if let Some(existing) = index.get(&text) {
                tracing::debug!(
                    "Duplicate dropdown option \"{}\" for question {}: keeping {}, ignoring {}",
                    text,
                    row.question_id,
                    existing,
                    row.option_id
                );
                continue;
            }
            index.insert(text, row.option_id);
        }

        let mut cache = self.cache.write().await;
        for (question_id, index) in grouped {
            let index = Arc::new(index);
            cache.insert(question_id, index.clone());
            snapshot.options.insert(question_id, index);
        }

        Ok(snapshot)
    }

    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }
}
