//! Offline statistics over memos and diaries.
//!
//! [`StatsService`] is read-only: every method issues `SELECT`s through the
//! [`QueryExecutor`] and derives its result in memory, so it can run while the
//! sync layer is writing.
//!
//! ## Features
//!
//! - **Heatmap**: one cell per day of an inclusive range, colored by mood
//! - **Mood Distribution**: diaries per mood key with percentages
//! - **Tag Frequencies**: all tags or the top tags of a date range
//!
//! Tags are stored as JSON text per memo and parsed here. Rows whose tags
//! cannot be parsed are skipped with a warning instead of failing the whole
//! computation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use memodiary::libs::stats::{HeatMapQuery, StatsService};
//! # async fn demo(stats: StatsService) -> memodiary::db::error::Result<()> {
//! let march = HeatMapQuery::new(
//!     NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
//! );
//! let cells = stats.get_heat_map_data(march).await?;
//! assert_eq!(cells.len(), 31);
//! # Ok(())
//! # }
//! ```

use crate::db::error::Result;
use crate::db::executor::QueryExecutor;
use crate::libs::formatter::{day_range_millis, days_between, format_date};
use crate::libs::logger::Logger;
use crate::libs::messages::Message;
use crate::libs::mood::mood_color;
use crate::{msg_debug, msg_warning, sql_params};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const SELECT_MOODS_IN_RANGE: &str = "SELECT date, mood_key, mood_score FROM diaries WHERE date BETWEEN ?1 AND ?2";
const SELECT_MOOD_DISTRIBUTION: &str = "
    SELECT mood_key, COUNT(*) FROM diaries
    WHERE date BETWEEN ?1 AND ?2 AND mood_key IS NOT NULL
    GROUP BY mood_key
    ORDER BY COUNT(*) DESC, mood_key
";
const SELECT_ALL_TAGGED_MEMOS: &str = "
    SELECT id, tags_json FROM memos
    WHERE is_deleted = 0 AND tags_json != '[]'
    ORDER BY created_at, id
";
const SELECT_TAGGED_MEMOS_IN_RANGE: &str = "
    SELECT id, tags_json FROM memos
    WHERE is_deleted = 0 AND tags_json != '[]' AND created_at >= ?1 AND created_at < ?2
    ORDER BY created_at, id
";

/// Inclusive date range for the heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatMapQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl HeatMapQuery {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { start_date, end_date }
    }
}

/// One day of the heatmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeatMapCell {
    pub date: NaiveDate,
    pub mood_key: Option<String>,
    pub mood_score: Option<u8>,
    pub color: String,
    /// 1 when a diary exists for the day, 0 otherwise
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagStat {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodStat {
    pub mood_key: String,
    pub count: usize,
    pub percentage: f64,
    pub color: String,
}

#[derive(Clone)]
pub struct StatsService {
    executor: QueryExecutor,
    logger: Logger,
}

impl StatsService {
    pub fn new(executor: QueryExecutor, logger: Logger) -> Self {
        Self { executor, logger }
    }

    /// One cell per day from `start_date` to `end_date` inclusive.
    ///
    /// Days without a diary get `count = 0`, no mood and the neutral color.
    /// A reversed range yields no cells.
    pub async fn get_heat_map_data(&self, query: HeatMapQuery) -> Result<Vec<HeatMapCell>> {
        if self.is_reversed(query.start_date, query.end_date) {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, Option<String>, Option<u8>)> = self
            .executor
            .query_all(
                SELECT_MOODS_IN_RANGE,
                sql_params![format_date(query.start_date), format_date(query.end_date)],
            )
            .await?;
        let mut diaries: HashMap<String, (Option<String>, Option<u8>)> = rows
            .into_iter()
            .map(|(date, mood_key, mood_score)| (date, (mood_key, mood_score)))
            .collect();

        let cells = days_between(query.start_date, query.end_date)
            .map(|date| match diaries.remove(&format_date(date)) {
                Some((mood_key, mood_score)) => HeatMapCell {
                    date,
                    color: mood_color(mood_key.as_deref()).to_string(),
                    mood_key,
                    mood_score,
                    count: 1,
                },
                None => HeatMapCell {
                    date,
                    mood_key: None,
                    mood_score: None,
                    color: mood_color(None).to_string(),
                    count: 0,
                },
            })
            .collect();
        Ok(cells)
    }

    /// Tag frequencies over all live memos, most used first.
    pub async fn get_all_tags(&self) -> Result<Vec<TagStat>> {
        let rows: Vec<(String, String)> = self.executor.query_all(SELECT_ALL_TAGGED_MEMOS, sql_params![]).await?;
        Ok(self.count_tags(rows))
    }

    /// Diaries per mood in the inclusive range, most frequent first.
    pub async fn get_mood_distribution(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<MoodStat>> {
        if self.is_reversed(start, end) {
            return Ok(Vec::new());
        }

        let rows: Vec<(String, i64)> = self
            .executor
            .query_all(SELECT_MOOD_DISTRIBUTION, sql_params![format_date(start), format_date(end)])
            .await?;
        let total: i64 = rows.iter().map(|(_, count)| count).sum();

        Ok(rows
            .into_iter()
            .map(|(mood_key, count)| MoodStat {
                color: mood_color(Some(&mood_key)).to_string(),
                percentage: if total == 0 { 0.0 } else { count as f64 / total as f64 * 100.0 },
                count: count as usize,
                mood_key,
            })
            .collect())
    }

    /// The `limit` most used tags on memos created within the inclusive range.
    pub async fn get_top_tags(&self, start: NaiveDate, end: NaiveDate, limit: usize) -> Result<Vec<TagStat>> {
        if self.is_reversed(start, end) {
            return Ok(Vec::new());
        }

        let (from, to) = day_range_millis(start, end);
        let rows: Vec<(String, String)> = self
            .executor
            .query_all(SELECT_TAGGED_MEMOS_IN_RANGE, sql_params![from, to])
            .await?;
        let mut stats = self.count_tags(rows);
        stats.truncate(limit);
        Ok(stats)
    }

    fn is_reversed(&self, start: NaiveDate, end: NaiveDate) -> bool {
        if start > end {
            msg_debug!(self.logger, Message::EmptyDateRange(format_date(start), format_date(end)));
            return true;
        }
        false
    }

    /// Running count per tag occurrence; blank tags are ignored and ties keep first-seen order.
    fn count_tags(&self, rows: Vec<(String, String)>) -> Vec<TagStat> {
        let mut stats: Vec<TagStat> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for (id, tags_json) in rows {
            let tags: Vec<String> = match serde_json::from_str(&tags_json) {
                Ok(tags) => tags,
                Err(e) => {
                    msg_warning!(self.logger, Message::TagsRowSkipped(id, e.to_string()));
                    continue;
                }
            };

            for tag in &tags {
                let tag = tag.trim();
                if tag.is_empty() {
                    continue;
                }
                match index.get(tag) {
                    Some(&position) => stats[position].count += 1,
                    None => {
                        index.insert(tag.to_string(), stats.len());
                        stats.push(TagStat {
                            tag: tag.to_string(),
                            count: 1,
                        });
                    }
                }
            }
        }

        // stable: equal counts stay in first-seen order
        stats.sort_by(|a, b| b.count.cmp(&a.count));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::ConnectionManager;
    use crate::libs::config::StoreConfig;
    use crate::libs::state::DatabaseState;
    use std::time::Duration;
    use tokio::sync::watch;

    fn detached_service(logger: Logger) -> StatsService {
        let config = StoreConfig::at(":memory:");
        let (_, state) = watch::channel(DatabaseState::Uninitialized);
        let executor = QueryExecutor::new(ConnectionManager::new(&config, logger.clone()), state, Duration::from_secs(1), logger.clone());
        StatsService::new(executor, logger)
    }

    fn row(id: &str, json: &str) -> (String, String) {
        (id.to_string(), json.to_string())
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let service = detached_service(Logger::disabled());
        let stats = service.count_tags(vec![row("1", r#"["work","life"]"#), row("2", r#"["life","work"]"#)]);
        let tags: Vec<(&str, usize)> = stats.iter().map(|s| (s.tag.as_str(), s.count)).collect();
        assert_eq!(tags, vec![("work", 2), ("life", 2)]);
    }

    #[test]
    fn repeated_tags_count_every_occurrence() {
        let service = detached_service(Logger::disabled());
        let stats = service.count_tags(vec![row("1", r#"["work", " work ", "life"]"#), row("2", r#"["life"]"#)]);
        let tags: Vec<(&str, usize)> = stats.iter().map(|s| (s.tag.as_str(), s.count)).collect();
        assert_eq!(tags, vec![("work", 2), ("life", 2)]);
    }

    #[test]
    fn malformed_rows_are_skipped_with_a_warning() {
        let (logger, capture) = Logger::capturing();
        let service = detached_service(logger);
        let stats = service.count_tags(vec![row("bad", "[\"work\""), row("good", r#"["work", " ", "life"]"#)]);

        assert_eq!(stats, vec![TagStat { tag: "work".into(), count: 1 }, TagStat { tag: "life".into(), count: 1 }]);
        let warnings = capture.lines_containing("WARN");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("bad"));
    }
}
