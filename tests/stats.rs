#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use memodiary::db::diaries::{Diaries, Diary};
    use memodiary::db::executor::QueryExecutor;
    use memodiary::db::memos::{Memo, Memos};
    use memodiary::libs::config::StoreConfig;
    use memodiary::libs::logger::{LogCapture, Logger};
    use memodiary::libs::mood::NEUTRAL_COLOR;
    use memodiary::libs::state::StateStore;
    use memodiary::libs::stats::{HeatMapQuery, StatsService, TagStat};
    use memodiary::sql_params;
    use tempfile::TempDir;
    use test_context::{test_context, AsyncTestContext};

    struct StatsTestContext {
        _temp_dir: TempDir,
        _store: StateStore,
        executor: QueryExecutor,
        memos: Memos,
        diaries: Diaries,
        stats: StatsService,
        capture: LogCapture,
    }

    impl AsyncTestContext for StatsTestContext {
        async fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let store = StateStore::new(StoreConfig::at(temp_dir.path().join("memodiary.db")), Logger::disabled());
            store.initialize().await.unwrap();

            let (logger, capture) = Logger::capturing();
            let executor = store.executor();
            StatsTestContext {
                _temp_dir: temp_dir,
                memos: Memos::new(executor.clone(), Logger::disabled()),
                diaries: Diaries::new(executor.clone()),
                stats: StatsService::new(executor.clone(), logger),
                executor,
                _store: store,
                capture,
            }
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn memo(id: &str, tags: &[&str], day_of_month: u32, hour: u32) -> Memo {
        let created = Utc.with_ymd_and_hms(2024, 3, day_of_month, hour, 0, 0).unwrap();
        Memo::new(id, format!("memo {id}"), tags.iter().map(|t| t.to_string()).collect()).created_at(created)
    }

    fn tag(tag: &str, count: usize) -> TagStat {
        TagStat { tag: tag.to_string(), count }
    }

    #[test_context(StatsTestContext)]
    #[tokio::test]
    async fn test_heat_map_fills_every_day(ctx: &mut StatsTestContext) {
        ctx.diaries.upsert(&Diary::new(day(2), "good day").with_mood("joy", 8)).await.unwrap();

        let cells = ctx.stats.get_heat_map_data(HeatMapQuery::new(day(1), day(3))).await.unwrap();
        assert_eq!(cells.len(), 3);

        assert_eq!(cells[1].date, day(2));
        assert_eq!(cells[1].mood_key.as_deref(), Some("joy"));
        assert_eq!(cells[1].mood_score, Some(8));
        assert_eq!(cells[1].color, "#FFD93D");
        assert_eq!(cells[1].count, 1);

        for empty in [&cells[0], &cells[2]] {
            assert_eq!(empty.count, 0);
            assert!(empty.mood_key.is_none());
            assert_eq!(empty.color, NEUTRAL_COLOR);
        }
    }

    #[test_context(StatsTestContext)]
    #[tokio::test]
    async fn test_heat_map_unknown_mood_and_reversed_range(ctx: &mut StatsTestContext) {
        ctx.diaries.upsert(&Diary::new(day(5), "").with_mood("nostalgic", 6)).await.unwrap();

        let cells = ctx.stats.get_heat_map_data(HeatMapQuery::new(day(5), day(5))).await.unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].mood_key.as_deref(), Some("nostalgic"));
        assert_eq!(cells[0].color, NEUTRAL_COLOR);
        assert_eq!(cells[0].count, 1);

        let reversed = ctx.stats.get_heat_map_data(HeatMapQuery::new(day(6), day(5))).await.unwrap();
        assert!(reversed.is_empty());
    }

    #[test_context(StatsTestContext)]
    #[tokio::test]
    async fn test_mood_distribution(ctx: &mut StatsTestContext) {
        assert!(ctx.stats.get_mood_distribution(day(1), day(31)).await.unwrap().is_empty());

        ctx.diaries.upsert(&Diary::new(day(1), "").with_mood("sad", 3)).await.unwrap();
        ctx.diaries.upsert(&Diary::new(day(2), "").with_mood("joy", 9)).await.unwrap();
        ctx.diaries.upsert(&Diary::new(day(3), "").with_mood("joy", 7)).await.unwrap();
        ctx.diaries.upsert(&Diary::new(day(4), "no mood")).await.unwrap();
        ctx.diaries.upsert(&Diary::new(day(20), "").with_mood("calm", 5)).await.unwrap();

        let moods = ctx.stats.get_mood_distribution(day(1), day(10)).await.unwrap();
        let keys: Vec<(&str, usize)> = moods.iter().map(|m| (m.mood_key.as_str(), m.count)).collect();
        assert_eq!(keys, vec![("joy", 2), ("sad", 1)]);
        assert!((moods[0].percentage - 200.0 / 3.0).abs() < 1e-9);
        assert!((moods.iter().map(|m| m.percentage).sum::<f64>() - 100.0).abs() < 1e-9);
        assert_eq!(moods[0].color, "#FFD93D");
        assert_eq!(moods[1].color, "#4D96FF");
    }

    #[test_context(StatsTestContext)]
    #[tokio::test]
    async fn test_all_tags_ties_keep_first_seen_order(ctx: &mut StatsTestContext) {
        ctx.memos.upsert(&memo("a", &["work", "life"], 1, 9)).await.unwrap();
        ctx.memos.upsert(&memo("b", &["life", "work"], 1, 10)).await.unwrap();
        ctx.memos.upsert(&memo("c", &[], 1, 11)).await.unwrap();

        let tags = ctx.stats.get_all_tags().await.unwrap();
        assert_eq!(tags, vec![tag("work", 2), tag("life", 2)]);

        // repeated calls are deterministic
        assert_eq!(ctx.stats.get_all_tags().await.unwrap(), tags);
    }

    #[test_context(StatsTestContext)]
    #[tokio::test]
    async fn test_deleted_memos_are_ignored(ctx: &mut StatsTestContext) {
        ctx.memos.upsert(&memo("a", &["work"], 1, 9)).await.unwrap();
        ctx.memos.upsert(&memo("b", &["travel"], 1, 10)).await.unwrap();
        ctx.memos.soft_delete("b").await.unwrap();

        assert_eq!(ctx.stats.get_all_tags().await.unwrap(), vec![tag("work", 1)]);
    }

    #[test_context(StatsTestContext)]
    #[tokio::test]
    async fn test_malformed_tags_are_skipped_with_warning(ctx: &mut StatsTestContext) {
        ctx.memos.upsert(&memo("good", &["work"], 1, 9)).await.unwrap();
        ctx.executor
            .execute(
                "INSERT INTO memos (id, content, tags_json, created_at, updated_at) VALUES (?1, '', ?2, ?3, ?3)",
                sql_params!["broken".to_string(), "[\"work\", oops".to_string(), Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap().timestamp_millis()],
            )
            .await
            .unwrap();

        let tags = ctx.stats.get_all_tags().await.unwrap();
        assert_eq!(tags, vec![tag("work", 1)]);

        let warnings = ctx.capture.lines_containing("broken");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("WARN"));
    }

    #[test_context(StatsTestContext)]
    #[tokio::test]
    async fn test_top_tags_respect_range_and_limit(ctx: &mut StatsTestContext) {
        ctx.memos.upsert(&memo("before", &["old", "old2"], 1, 23)).await.unwrap();
        ctx.memos.upsert(&memo("m1", &["work", "gym"], 2, 0)).await.unwrap();
        ctx.memos.upsert(&memo("m2", &["gym", "reading"], 2, 12)).await.unwrap();
        ctx.memos.upsert(&memo("m3", &["gym", "work"], 3, 23)).await.unwrap();
        ctx.memos.upsert(&memo("after", &["future"], 4, 0)).await.unwrap();

        let top = ctx.stats.get_top_tags(day(2), day(3), 2).await.unwrap();
        assert_eq!(top, vec![tag("gym", 3), tag("work", 2)]);

        let everything = ctx.stats.get_top_tags(day(2), day(3), 10).await.unwrap();
        assert_eq!(everything.len(), 3);
        assert!(everything.windows(2).all(|pair| pair[0].count >= pair[1].count));

        assert!(ctx.stats.get_top_tags(day(3), day(2), 10).await.unwrap().is_empty());

        let open_ended = ctx.stats.get_top_tags(day(2), NaiveDate::MAX, 10).await.unwrap();
        assert_eq!(open_ended[..2], [tag("gym", 3), tag("work", 2)]);
        assert!(open_ended.contains(&tag("future", 1)));
    }
}
