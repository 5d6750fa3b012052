#[cfg(test)]
pub mod memory;

use crate::domain::models::{DropdownOption, NewAnswer, QuestionNameMap};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

/// Bind parameters per `answers` row in a bulk insert.
pub const ANSWER_BIND_COUNT: usize = 7;

/// Largest answer chunk that stays under the Postgres limit of 65535 binds per statement.
pub const MAX_ANSWERS_PER_INSERT: usize = u16::MAX as usize / ANSWER_BIND_COUNT;

/// Read access and transaction entry point for the survey schema.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn SurveyTransaction>, sqlx::Error>;

    async fn question_mappings(&self) -> Result<Vec<QuestionNameMap>, sqlx::Error>;

    async fn find_question_id_by_text(&self, text: &str) -> Result<Option<i32>, sqlx::Error>;

    async fn mapping_exists(&self, question_id: i32) -> Result<bool, sqlx::Error>;

    async fn insert_question_mapping(
        &self,
        mapping: &QuestionNameMap,
        survey_id: i32,
    ) -> Result<(), sqlx::Error>;

    /// Marks a sent survey as completed by `response_id`. Returns false when no row matched.
    async fn complete_survey_sent(&self, survey_sent_id: i32, response_id: i32) -> Result<bool, sqlx::Error>;
}

/// Reads and writes scoped to one submission. Dropping without `commit` rolls back.
///
/// Everything a submission touches goes through the transaction's own
/// connection, so ingestion never waits on the pool while holding one.
#[async_trait]
pub trait SurveyTransaction: Send {
    async fn question_mappings(&mut self) -> Result<Vec<QuestionNameMap>, sqlx::Error>;

    /// Options for the given questions, ordered by question then option id.
    async fn dropdown_options(&mut self, question_ids: &[i32]) -> Result<Vec<DropdownOption>, sqlx::Error>;

    async fn insert_response(
        &mut self,
        survey_id: i32,
        created_at: Option<NaiveDateTime>,
    ) -> Result<Option<i32>, sqlx::Error>;

    async fn insert_answers(&mut self, answers: &[NewAnswer]) -> Result<u64, sqlx::Error>;

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error>;

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error>;
}

const QUESTION_MAPPINGS_SQL: &str = r#"
    SELECT question_id, question_name
    FROM questions_map
    WHERE question_name IS NOT NULL
    ORDER BY question_id
"#;

#[derive(Clone)]
pub struct PgSurveyStore {
    pool: PgPool,
}

impl PgSurveyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgSurveyTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SurveyStore for PgSurveyStore {
    async fn begin(&self) -> Result<Box<dyn SurveyTransaction>, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSurveyTransaction { tx }))
    }

    async fn question_mappings(&self) -> Result<Vec<QuestionNameMap>, sqlx::Error> {
        sqlx::query_as::<_, QuestionNameMap>(QUESTION_MAPPINGS_SQL)
            .fetch_all(&self.pool)
            .await
    }

    async fn find_question_id_by_text(&self, text: &str) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            r#"
            SELECT question_id
            FROM questions
            WHERE question_text = $1
            ORDER BY question_id
            LIMIT 1
            "#,
        )
        .bind(text)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mapping_exists(&self, question_id: i32) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM questions_map WHERE question_id = $1)",
        )
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn insert_question_mapping(
        &self,
        mapping: &QuestionNameMap,
        survey_id: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO questions_map (question_id, question_name, survey_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(mapping.question_id)
        .bind(&mapping.question_name)
        .bind(survey_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_survey_sent(&self, survey_sent_id: i32, response_id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE omnisol_surveys_sent
            SET response_id = $2,
                completed = true,
                completed_date = LOCALTIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(survey_sent_id)
        .bind(response_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SurveyTransaction for PgSurveyTransaction {
    async fn question_mappings(&mut self) -> Result<Vec<QuestionNameMap>, sqlx::Error> {
        sqlx::query_as::<_, QuestionNameMap>(QUESTION_MAPPINGS_SQL)
            .fetch_all(&mut *self.tx)
            .await
    }

    async fn dropdown_options(&mut self, question_ids: &[i32]) -> Result<Vec<DropdownOption>, sqlx::Error> {
        sqlx::query_as::<_, DropdownOption>(
            r#"
            SELECT option_id, question_id, option_text
            FROM dropdown_options
            WHERE question_id = ANY($1)
            ORDER BY question_id, option_id
            "#,
        )
        .bind(question_ids.to_vec())
        .fetch_all(&mut *self.tx)
        .await
    }

    async fn insert_response(
        &mut self,
        survey_id: i32,
        created_at: Option<NaiveDateTime>,
    ) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO responses (survey_id, respondent_id, created_at)
            VALUES ($1, $2, COALESCE($3::timestamp, LOCALTIMESTAMP))
            RETURNING response_id
            "#,
        )
        .bind(survey_id)
        .bind(Uuid::new_v4())
        .bind(created_at)
        .fetch_optional(&mut *self.tx)
        .await
    }

    async fn insert_answers(&mut self, answers: &[NewAnswer]) -> Result<u64, sqlx::Error> {
        if answers.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO answers (response_id, question_id, answer_text, answer_rating, answer_boolean, answer_radio, answer_dropdown) ",
        );
        builder.push_values(answers, |mut row, answer| {
            let slots = answer.value.slots();
            row.push_bind(answer.response_id)
                .push_bind(answer.question_id)
                .push_bind(slots.answer_text)
                .push_bind(slots.answer_rating)
                .push_bind(slots.answer_boolean)
                .push_bind(slots.answer_radio)
                .push_bind(slots.answer_dropdown);
        });

        let result = builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}
