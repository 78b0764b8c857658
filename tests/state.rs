#[cfg(test)]
mod tests {
    use memodiary::db::error::DatabaseError;
    use memodiary::db::migrations::{builtin_migrations, Migration, MigrationRunner};
    use memodiary::libs::config::StoreConfig;
    use memodiary::libs::logger::Logger;
    use memodiary::libs::state::{DatabaseState, StateChange, StateStore};
    use memodiary::sql_params;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use test_context::{test_context, AsyncTestContext};

    use DatabaseState::*;

    /// An uninitialized store plus a log of every transition it publishes.
    struct StateTestContext {
        _temp_dir: TempDir,
        path: PathBuf,
        store: Arc<StateStore>,
        changes: Arc<Mutex<Vec<StateChange>>>,
        _subscription: memodiary::libs::state::Subscription,
    }

    impl AsyncTestContext for StateTestContext {
        async fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let path = temp_dir.path().join("memodiary.db");
            let config = StoreConfig {
                reset_timeout_ms: 100,
                ..StoreConfig::at(&path)
            };
            let store = Arc::new(StateStore::new(config, Logger::disabled()));
            let changes = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&changes);
            let subscription = store.subscribe(move |change| sink.lock().push(change));
            StateTestContext {
                _temp_dir: temp_dir,
                path,
                store,
                changes,
                _subscription: subscription,
            }
        }
    }

    fn change(from: DatabaseState, to: DatabaseState) -> StateChange {
        StateChange { from, to }
    }

    fn broken_runner() -> MigrationRunner {
        let mut migrations = builtin_migrations();
        migrations.push(Migration::new(3, "broken", vec!["ALTER TABLE no_such_table ADD COLUMN x INTEGER"]));
        MigrationRunner::with_migrations(migrations, Logger::disabled()).unwrap()
    }

    #[test_context(StateTestContext)]
    #[tokio::test]
    async fn test_initialize_reaches_ready(ctx: &mut StateTestContext) {
        assert_eq!(ctx.store.state(), Uninitialized);

        ctx.store.initialize().await.unwrap();
        assert_eq!(ctx.store.state(), Ready);
        assert!(ctx.path.exists());
        assert_eq!(*ctx.changes.lock(), vec![change(Uninitialized, Initializing), change(Initializing, Ready)]);

        // no-op while Ready
        ctx.store.initialize().await.unwrap();
        assert_eq!(ctx.changes.lock().len(), 2);
    }

    #[test_context(StateTestContext)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initialize_runs_once(ctx: &mut StateTestContext) {
        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&ctx.store);
            handles.push(tokio::spawn(async move { store.initialize().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(ctx.store.state(), Ready);
        assert_eq!(ctx.changes.lock().len(), 2);
    }

    #[test_context(StateTestContext)]
    #[tokio::test]
    async fn test_wait_ready_resolves_after_initialize(ctx: &mut StateTestContext) {
        let store = Arc::clone(&ctx.store);
        let waiter = tokio::spawn(async move { store.wait_ready().await });

        tokio::task::yield_now().await;
        ctx.store.initialize().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap().unwrap();
    }

    #[test_context(StateTestContext)]
    #[tokio::test]
    async fn test_reset_wipes_database(ctx: &mut StateTestContext) {
        ctx.store.initialize().await.unwrap();
        let executor = ctx.store.executor();
        executor
            .execute(
                "INSERT INTO diaries (date, summary, created_at, updated_at) VALUES (?1, '', 0, 0)",
                sql_params!["2024-03-01".to_string()],
            )
            .await
            .unwrap();

        ctx.store.reset().await.unwrap();
        assert_eq!(ctx.store.state(), Uninitialized);
        assert!(!ctx.path.exists());
        assert!(matches!(
            executor.query_all::<(i64,)>("SELECT 1", sql_params![]).await,
            Err(DatabaseError::NotReady { .. })
        ));

        // a fresh start sees an empty database
        ctx.store.initialize().await.unwrap();
        let count: Option<(i64,)> = executor.query_one("SELECT COUNT(*) FROM diaries", sql_params![]).await.unwrap();
        assert_eq!(count, Some((0,)));
        assert_eq!(
            *ctx.changes.lock(),
            vec![
                change(Uninitialized, Initializing),
                change(Initializing, Ready),
                change(Ready, Resetting),
                change(Resetting, Uninitialized),
                change(Uninitialized, Initializing),
                change(Initializing, Ready),
            ]
        );
    }

    #[test_context(StateTestContext)]
    #[tokio::test]
    async fn test_reset_on_uninitialized_is_noop(ctx: &mut StateTestContext) {
        ctx.store.reset().await.unwrap();
        assert_eq!(ctx.store.state(), Uninitialized);
        assert!(ctx.changes.lock().is_empty());
    }

    #[test_context(StateTestContext)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reset_fails_fast_while_query_in_flight(ctx: &mut StateTestContext) {
        ctx.store.initialize().await.unwrap();
        let executor = ctx.store.executor();
        let busy = tokio::spawn(async move {
            executor
                .transaction(|_| {
                    std::thread::sleep(Duration::from_millis(500));
                    Ok(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = ctx.store.reset().await.unwrap_err();
        assert_eq!(err.code(), "BUSY");
        assert_eq!(ctx.store.state(), Ready);

        busy.await.unwrap().unwrap();
        ctx.store.reset().await.unwrap();
        assert_eq!(ctx.store.state(), Uninitialized);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reset_waits_for_in_flight_query_and_refuses_new_work() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("memodiary.db");
        let config = StoreConfig {
            reset_timeout_ms: 2_000,
            ..StoreConfig::at(&path)
        };
        let store = Arc::new(StateStore::new(config, Logger::disabled()));
        store.initialize().await.unwrap();

        let executor = store.executor();
        let in_flight = tokio::spawn({
            let executor = executor.clone();
            async move {
                executor
                    .transaction(|tx| {
                        tx.execute(
                            "INSERT INTO diaries (date, summary, created_at, updated_at) VALUES (?1, '', 0, 0)",
                            sql_params!["2024-03-01".to_string()],
                        )?;
                        std::thread::sleep(Duration::from_millis(300));
                        Ok(())
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let resetting = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.reset().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // still Ready while draining, but nothing new gets in
        assert_eq!(store.state(), Ready);
        let err = executor.query_one::<(i64,)>("SELECT 1", sql_params![]).await.unwrap_err();
        assert_eq!(err.code(), "BUSY");

        in_flight.await.unwrap().unwrap();
        resetting.await.unwrap().unwrap();
        assert_eq!(store.state(), Uninitialized);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_migration_moves_to_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::at(temp_dir.path().join("memodiary.db"));
        let store = StateStore::with_migrations(config, broken_runner(), Logger::disabled());

        let err = store.initialize().await.unwrap_err();
        assert!(matches!(err, DatabaseError::Migration { version: 3, .. }));
        assert_eq!(store.state(), Error);
        assert!(matches!(
            store.executor().execute("DELETE FROM memos", sql_params![]).await,
            Err(DatabaseError::NotReady { state: Error })
        ));

        // retry goes through Initializing again and fails the same way
        assert!(store.initialize().await.is_err());
        assert_eq!(store.state(), Error);

        store.reset().await.unwrap();
        assert_eq!(store.state(), Uninitialized);
    }

    #[tokio::test]
    async fn test_waiters_adopt_a_failed_attempt() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::at(temp_dir.path().join("memodiary.db"));
        let store = StateStore::with_migrations(config, broken_runner(), Logger::disabled());
        let attempts = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&attempts);
        let _subscription = store.subscribe(move |change| {
            if change.to == Initializing {
                *counter.lock() += 1;
            }
        });

        // all three calls are polled before the first attempt finishes
        let (first, second, third) = tokio::join!(store.initialize(), store.initialize(), store.initialize());
        assert!(matches!(first, Err(DatabaseError::Migration { .. })));
        assert!(matches!(second, Err(DatabaseError::NotReady { state: Error })));
        assert!(matches!(third, Err(DatabaseError::NotReady { state: Error })));

        assert_eq!(*attempts.lock(), 1);
        assert_eq!(store.state(), Error);
    }
}
