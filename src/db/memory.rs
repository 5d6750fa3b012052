//! In-memory store for unit tests: buffers writes per transaction, counts reads,
//! models a bounded connection pool, and can be told to fail at specific points.

use super::{SurveyStore, SurveyTransaction};
use crate::domain::models::{DropdownOption, NewAnswer, QuestionNameMap};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub response_id: i32,
    pub survey_id: i32,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub fail_mapping_load: bool,
    pub fail_dropdown_load: bool,
    pub response_without_id: bool,
    /// Zero-based index of the answer chunk that should fail.
    pub fail_answer_chunk: Option<usize>,
    pub fail_commit: bool,
    /// Pool size. An open transaction holds a connection until it ends and every
    /// store-level call needs one for its duration; beyond the limit the call
    /// fails with `PoolTimedOut`.
    pub connection_limit: Option<usize>,
}

#[derive(Default)]
struct Tables {
    next_response_id: i32,
    responses: Vec<StoredResponse>,
    answers: Vec<NewAnswer>,
    mappings: Vec<(QuestionNameMap, i32)>,
    options: Vec<DropdownOption>,
    questions: Vec<(i32, String)>,
    surveys_sent: HashMap<i32, Option<i32>>,
}

#[derive(Default)]
struct Counters {
    mapping_loads: AtomicUsize,
    dropdown_loads: AtomicUsize,
    open_connections: AtomicUsize,
    chunk_sizes: Mutex<Vec<usize>>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Faults,
    counters: Arc<Counters>,
}

fn injected(what: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("injected failure: {}", what))
}

/// A checked-out connection; returned to the pool on drop.
struct Connection(Arc<Counters>);

impl Drop for Connection {
    fn drop(&mut self) {
        self.0.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

fn acquire(counters: &Arc<Counters>, faults: &Faults) -> Result<Connection, sqlx::Error> {
    let open = counters.open_connections.fetch_add(1, Ordering::SeqCst);
    let connection = Connection(counters.clone());
    match faults.connection_limit {
        Some(limit) if open >= limit => Err(sqlx::Error::PoolTimedOut),
        _ => Ok(connection),
    }
}

fn load_mappings(
    tables: &Mutex<Tables>,
    faults: &Faults,
    counters: &Counters,
) -> Result<Vec<QuestionNameMap>, sqlx::Error> {
    counters.mapping_loads.fetch_add(1, Ordering::SeqCst);
    if faults.fail_mapping_load {
        return Err(injected("mapping load"));
    }
    Ok(tables
        .lock()
        .unwrap()
        .mappings
        .iter()
        .map(|(m, _)| m.clone())
        .collect())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_mapping(self, question_id: i32, name: &str) -> Self {
        self.tables.lock().unwrap().mappings.push((
            QuestionNameMap {
                question_id,
                question_name: name.to_string(),
            },
            1,
        ));
        self
    }

    pub fn with_option(self, option_id: i32, question_id: i32, text: &str) -> Self {
        self.tables.lock().unwrap().options.push(DropdownOption {
            option_id,
            question_id,
            option_text: text.to_string(),
        });
        self
    }

    pub fn with_question(self, question_id: i32, text: &str) -> Self {
        self.tables
            .lock()
            .unwrap()
            .questions
            .push((question_id, text.to_string()));
        self
    }

    pub fn with_survey_sent(self, id: i32) -> Self {
        self.tables.lock().unwrap().surveys_sent.insert(id, None);
        self
    }

    pub fn responses(&self) -> Vec<StoredResponse> {
        self.tables.lock().unwrap().responses.clone()
    }

    pub fn answers(&self) -> Vec<NewAnswer> {
        self.tables.lock().unwrap().answers.clone()
    }

    pub fn mappings(&self) -> Vec<QuestionNameMap> {
        self.tables
            .lock()
            .unwrap()
            .mappings
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn survey_sent_response(&self, id: i32) -> Option<i32> {
        self.tables.lock().unwrap().surveys_sent.get(&id).copied().flatten()
    }

    pub fn mapping_loads(&self) -> usize {
        self.counters.mapping_loads.load(Ordering::SeqCst)
    }

    pub fn dropdown_loads(&self) -> usize {
        self.counters.dropdown_loads.load(Ordering::SeqCst)
    }

    pub fn open_connections(&self) -> usize {
        self.counters.open_connections.load(Ordering::SeqCst)
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.counters.chunk_sizes.lock().unwrap().clone()
    }

    fn connection(&self) -> Result<Connection, sqlx::Error> {
        acquire(&self.counters, &self.faults)
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn SurveyTransaction>, sqlx::Error> {
        let connection = self.connection()?;
        Ok(Box::new(MemoryTransaction {
            tables: self.tables.clone(),
            faults: self.faults.clone(),
            counters: self.counters.clone(),
            _connection: connection,
            chunks_seen: 0,
            responses: Vec::new(),
            answers: Vec::new(),
        }))
    }

    async fn question_mappings(&self) -> Result<Vec<QuestionNameMap>, sqlx::Error> {
        let _connection = self.connection()?;
        load_mappings(&self.tables, &self.faults, &self.counters)
    }

    async fn find_question_id_by_text(&self, text: &str) -> Result<Option<i32>, sqlx::Error> {
        let _connection = self.connection()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .questions
            .iter()
            .find(|(_, t)| t == text)
            .map(|(id, _)| *id))
    }

    async fn mapping_exists(&self, question_id: i32) -> Result<bool, sqlx::Error> {
        let _connection = self.connection()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .mappings
            .iter()
            .any(|(m, _)| m.question_id == question_id))
    }

    async fn insert_question_mapping(
        &self,
        mapping: &QuestionNameMap,
        survey_id: i32,
    ) -> Result<(), sqlx::Error> {
        let _connection = self.connection()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.mappings.iter().any(|(m, _)| m.question_id == mapping.question_id) {
            return Err(injected("duplicate questions_map key"));
        }
        tables.mappings.push((mapping.clone(), survey_id));
        Ok(())
    }

    async fn complete_survey_sent(&self, survey_sent_id: i32, response_id: i32) -> Result<bool, sqlx::Error> {
        let _connection = self.connection()?;
        let mut tables = self.tables.lock().unwrap();
        match tables.surveys_sent.get_mut(&survey_sent_id) {
            Some(slot) => {
                *slot = Some(response_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct MemoryTransaction {
    tables: Arc<Mutex<Tables>>,
    faults: Faults,
    counters: Arc<Counters>,
    _connection: Connection,
    chunks_seen: usize,
    responses: Vec<StoredResponse>,
    answers: Vec<NewAnswer>,
}

#[async_trait]
impl SurveyTransaction for MemoryTransaction {
    async fn question_mappings(&mut self) -> Result<Vec<QuestionNameMap>, sqlx::Error> {
        load_mappings(&self.tables, &self.faults, &self.counters)
    }

    async fn dropdown_options(&mut self, question_ids: &[i32]) -> Result<Vec<DropdownOption>, sqlx::Error> {
        self.counters.dropdown_loads.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_dropdown_load {
            return Err(injected("dropdown load"));
        }
        let mut options: Vec<DropdownOption> = self
            .tables
            .lock()
            .unwrap()
            .options
            .iter()
            .filter(|o| question_ids.contains(&o.question_id))
            .cloned()
            .collect();
        options.sort_by_key(|o| (o.question_id, o.option_id));
        Ok(options)
    }

    async fn insert_response(
        &mut self,
        survey_id: i32,
        created_at: Option<NaiveDateTime>,
    ) -> Result<Option<i32>, sqlx::Error> {
        if self.faults.response_without_id {
            return Ok(None);
        }
        let response_id = {
            let mut tables = self.tables.lock().unwrap();
            tables.next_response_id += 1;
            tables.next_response_id
        };
        self.responses.push(StoredResponse {
            response_id,
            survey_id,
            created_at,
        });
        Ok(Some(response_id))
    }

    async fn insert_answers(&mut self, answers: &[NewAnswer]) -> Result<u64, sqlx::Error> {
        let chunk = self.chunks_seen;
        self.chunks_seen += 1;
        if self.faults.fail_answer_chunk == Some(chunk) {
            return Err(injected("answer insert"));
        }
        self.counters.chunk_sizes.lock().unwrap().push(answers.len());
        self.answers.extend_from_slice(answers);
        Ok(answers.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        if self.faults.fail_commit {
            return Err(injected("commit"));
        }
        let this = *self;
        let mut tables = this.tables.lock().unwrap();
        tables.responses.extend(this.responses);
        tables.answers.extend(this.answers);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error> {
        Ok(())
    }
}
