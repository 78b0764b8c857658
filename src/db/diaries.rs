use crate::db::error::{DatabaseError, Result};
use crate::db::executor::{FromRow, QueryExecutor};
use crate::libs::formatter::{date_column, format_date, millis_column, to_millis};
use crate::libs::messages::Message;
use crate::sql_params;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub(crate) const DIARY_COLUMNS: &str = "date, summary, mood_key, mood_score, cover_image_id, created_at, updated_at";
const UPSERT_DIARY: &str = "INSERT INTO diaries (date, summary, mood_key, mood_score, cover_image_id, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(date) DO UPDATE SET
        summary = excluded.summary,
        mood_key = excluded.mood_key,
        mood_score = excluded.mood_score,
        cover_image_id = excluded.cover_image_id,
        updated_at = excluded.updated_at";
const SET_MOOD: &str = "INSERT INTO diaries (date, mood_key, mood_score, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?4)
    ON CONFLICT(date) DO UPDATE SET
        mood_key = excluded.mood_key,
        mood_score = excluded.mood_score,
        updated_at = excluded.updated_at";

/// Lowest and highest accepted mood score.
pub const MOOD_SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// One diary per calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diary {
    pub date: NaiveDate,
    pub summary: String,
    pub mood_key: Option<String>,
    pub mood_score: Option<u8>,
    pub cover_image_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Diary {
    pub fn new(date: NaiveDate, summary: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            date,
            summary: summary.into(),
            mood_key: None,
            mood_score: None,
            cover_image_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_mood(mut self, mood_key: impl Into<String>, mood_score: u8) -> Self {
        self.mood_key = Some(mood_key.into());
        self.mood_score = Some(mood_score);
        self
    }
}

impl FromRow for Diary {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Diary {
            date: date_column(row, 0)?,
            summary: row.get(1)?,
            mood_key: row.get(2)?,
            mood_score: row.get(3)?,
            cover_image_id: row.get(4)?,
            created_at: millis_column(row, 5)?,
            updated_at: millis_column(row, 6)?,
        })
    }
}

/// Rejects empty mood keys and scores outside [`MOOD_SCORE_RANGE`].
pub fn validate_mood(mood_key: Option<&str>, mood_score: Option<u8>) -> Result<()> {
    if let Some(score) = mood_score {
        if !MOOD_SCORE_RANGE.contains(&score) {
            return Err(DatabaseError::Validation {
                field: "mood_score",
                message: Message::MoodScoreOutOfRange(score.into()).to_string(),
            });
        }
    }
    if mood_key.is_some_and(|key| key.trim().is_empty()) {
        return Err(DatabaseError::Validation {
            field: "mood_key",
            message: Message::EmptyMoodKey.to_string(),
        });
    }
    Ok(())
}

pub struct Diaries {
    executor: QueryExecutor,
}

impl Diaries {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    /// Insert or replace the diary for `diary.date`, keeping its original `created_at`
    pub async fn upsert(&self, diary: &Diary) -> Result<()> {
        validate_mood(diary.mood_key.as_deref(), diary.mood_score)?;
        self.executor
            .execute(
                UPSERT_DIARY,
                sql_params![
                    format_date(diary.date),
                    diary.summary.clone(),
                    diary.mood_key.clone(),
                    diary.mood_score,
                    diary.cover_image_id.clone(),
                    to_millis(diary.created_at),
                    to_millis(diary.updated_at),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get(&self, date: NaiveDate) -> Result<Option<Diary>> {
        let sql = format!("SELECT {DIARY_COLUMNS} FROM diaries WHERE date = ?1");
        self.executor.query_one(&sql, sql_params![format_date(date)]).await
    }

    /// Diaries with `start <= date <= end`, oldest first
    pub async fn list_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Diary>> {
        let sql = format!("SELECT {DIARY_COLUMNS} FROM diaries WHERE date BETWEEN ?1 AND ?2 ORDER BY date");
        self.executor
            .query_all(&sql, sql_params![format_date(start), format_date(end)])
            .await
    }

    /// Sets the mood for `date`, creating an empty diary when none exists yet
    pub async fn set_mood(&self, date: NaiveDate, mood_key: &str, mood_score: u8) -> Result<()> {
        validate_mood(Some(mood_key), Some(mood_score))?;
        self.executor
            .execute(
                SET_MOOD,
                sql_params![format_date(date), mood_key.to_string(), mood_score, to_millis(Utc::now())],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mood_validation() {
        assert!(validate_mood(Some("joy"), Some(1)).is_ok());
        assert!(validate_mood(Some("joy"), Some(10)).is_ok());
        assert!(validate_mood(None, None).is_ok());

        let err = validate_mood(Some("joy"), Some(11)).unwrap_err();
        assert!(matches!(err, DatabaseError::Validation { field: "mood_score", .. }));
        assert!(validate_mood(Some("joy"), Some(0)).is_err());
        assert!(validate_mood(Some("  "), Some(5)).is_err());
    }
}
