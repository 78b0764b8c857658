use crate::db::diaries::{Diary, DIARY_COLUMNS};
use crate::db::error::{DatabaseError, Result};
use crate::db::executor::{FromRow, QueryExecutor};
use crate::libs::formatter::{day_range_millis, format_date, millis_column, optional_date_column, to_millis};
use crate::libs::logger::Logger;
use crate::libs::messages::Message;
use crate::{msg_info, sql_params};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

const MEMO_COLUMNS: &str = "id, content, tags_json, is_archived, diary_date, is_deleted, created_at, updated_at";
const UPSERT_MEMO: &str = "INSERT INTO memos (id, content, tags_json, is_archived, diary_date, is_deleted, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(id) DO UPDATE SET
        content = excluded.content,
        tags_json = excluded.tags_json,
        is_archived = excluded.is_archived,
        diary_date = excluded.diary_date,
        is_deleted = excluded.is_deleted,
        updated_at = excluded.updated_at";
const SOFT_DELETE_MEMO: &str = "UPDATE memos SET is_deleted = 1, updated_at = ?2 WHERE id = ?1 AND is_deleted = 0";
const ARCHIVE_MEMO: &str = "UPDATE memos SET is_archived = 1, diary_date = ?2, updated_at = ?3 WHERE id = ?1 AND is_deleted = 0";
const APPEND_DIARY_SUMMARY: &str = "INSERT INTO diaries (date, summary, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?3)
    ON CONFLICT(date) DO UPDATE SET
        summary = CASE
            WHEN diaries.summary = '' THEN excluded.summary
            WHEN excluded.summary = '' THEN diaries.summary
            ELSE diaries.summary || char(10) || excluded.summary
        END,
        updated_at = excluded.updated_at";

/// A short note; archived memos belong to the diary of `diary_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    pub id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_archived: bool,
    pub diary_date: Option<NaiveDate>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memo {
    pub fn new(id: impl Into<String>, content: impl Into<String>, tags: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            content: content.into(),
            tags,
            is_archived: false,
            diary_date: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn created_at(mut self, instant: DateTime<Utc>) -> Self {
        self.created_at = instant;
        self.updated_at = instant;
        self
    }
}

impl FromRow for Memo {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tags_json: String = row.get(2)?;
        let tags = serde_json::from_str(&tags_json).map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        Ok(Memo {
            id: row.get(0)?,
            content: row.get(1)?,
            tags,
            is_archived: row.get(3)?,
            diary_date: optional_date_column(row, 4)?,
            is_deleted: row.get(5)?,
            created_at: millis_column(row, 6)?,
            updated_at: millis_column(row, 7)?,
        })
    }
}

pub struct Memos {
    executor: QueryExecutor,
    logger: Logger,
}

impl Memos {
    pub fn new(executor: QueryExecutor, logger: Logger) -> Self {
        Self { executor, logger }
    }

    /// Insert a memo or overwrite the stored copy with the same id
    pub async fn upsert(&self, memo: &Memo) -> Result<()> {
        let tags_json = serde_json::to_string(&memo.tags).map_err(|e| DatabaseError::Validation {
            field: "tags",
            message: Message::MemoTagsEncodeFailed(e.to_string()).to_string(),
        })?;
        self.executor
            .execute(
                UPSERT_MEMO,
                sql_params![
                    memo.id.clone(),
                    memo.content.clone(),
                    tags_json,
                    memo.is_archived,
                    memo.diary_date.map(format_date),
                    memo.is_deleted,
                    to_millis(memo.created_at),
                    to_millis(memo.updated_at),
                ],
            )
            .await?;
        Ok(())
    }

    /// Get a memo by id, including soft-deleted ones
    pub async fn get(&self, id: &str) -> Result<Option<Memo>> {
        let sql = format!("SELECT {MEMO_COLUMNS} FROM memos WHERE id = ?1");
        self.executor.query_one(&sql, sql_params![id.to_string()]).await
    }

    /// Live memos created on `date` (UTC), oldest first
    pub async fn list_for_date(&self, date: NaiveDate) -> Result<Vec<Memo>> {
        let (start, end) = day_range_millis(date, date);
        let sql = format!(
            "SELECT {MEMO_COLUMNS} FROM memos
             WHERE is_deleted = 0 AND created_at >= ?1 AND created_at < ?2
             ORDER BY created_at, id"
        );
        self.executor.query_all(&sql, sql_params![start, end]).await
    }

    /// Live memos archived into the diary of `date`
    pub async fn list_archived(&self, date: NaiveDate) -> Result<Vec<Memo>> {
        let sql = format!(
            "SELECT {MEMO_COLUMNS} FROM memos
             WHERE is_deleted = 0 AND diary_date = ?1
             ORDER BY created_at, id"
        );
        self.executor.query_all(&sql, sql_params![format_date(date)]).await
    }

    /// Marks a memo deleted; returns false when it was missing or already deleted
    pub async fn soft_delete(&self, id: &str) -> Result<bool> {
        let affected = self
            .executor
            .execute(SOFT_DELETE_MEMO, sql_params![id.to_string(), to_millis(Utc::now())])
            .await?;
        Ok(affected > 0)
    }

    /// Archives memos into the diary of `date` in one transaction.
    ///
    /// Creates the diary on the first archive for that date; later archives
    /// append `summary` to the existing one. Deleted or unknown ids are
    /// skipped. Returns the diary as stored after the archive.
    pub async fn archive(&self, date: NaiveDate, memo_ids: &[String], summary: &str) -> Result<Diary> {
        if memo_ids.is_empty() {
            return Err(DatabaseError::Validation {
                field: "memo_ids",
                message: Message::ArchiveRequiresMemos.to_string(),
            });
        }

        let ids = memo_ids.to_vec();
        let summary = summary.to_string();
        let day = format_date(date);
        let (archived, diary) = self
            .executor
            .transaction(move |tx| {
                let now = to_millis(Utc::now());
                let mut archived = 0;
                for id in ids {
                    archived += tx.execute(ARCHIVE_MEMO, sql_params![id, day.clone(), now])?;
                }
                tx.execute(APPEND_DIARY_SUMMARY, sql_params![day.clone(), summary, now])?;

                let select = format!("SELECT {DIARY_COLUMNS} FROM diaries WHERE date = ?1");
                let diary: Option<Diary> = tx.query_one(&select, sql_params![day.clone()])?;
                let diary = diary.ok_or_else(|| DatabaseError::transaction(format!("diary {day} missing after archive"), None))?;
                Ok((archived, diary))
            })
            .await?;

        msg_info!(self.logger, Message::MemosArchived(archived, format_date(date)));
        Ok(diary)
    }
}
