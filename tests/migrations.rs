#[cfg(test)]
mod tests {
    use memodiary::db::error::DatabaseError;
    use memodiary::db::migrations::{Migration, MigrationRunner};
    use memodiary::libs::logger::Logger;
    use rusqlite::Connection;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct MigrationTestContext {
        _temp_dir: TempDir,
        conn: Connection,
    }

    impl TestContext for MigrationTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let conn = Connection::open(temp_dir.path().join("memodiary.db")).unwrap();
            MigrationTestContext { _temp_dir: temp_dir, conn }
        }
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn runner(migrations: Vec<Migration>) -> MigrationRunner {
        MigrationRunner::with_migrations(migrations, Logger::disabled()).unwrap()
    }

    #[test_context(MigrationTestContext)]
    #[test]
    fn test_second_run_performs_no_writes(ctx: &mut MigrationTestContext) {
        let runner = MigrationRunner::new(Logger::disabled());

        let first = runner.run(&mut ctx.conn).unwrap();
        assert_eq!(first.current_version, runner.latest_version());
        assert!(table_exists(&ctx.conn, "memos"));
        assert!(table_exists(&ctx.conn, "diaries"));

        let changes_before = ctx.conn.total_changes();
        let second = runner.run(&mut ctx.conn).unwrap();
        assert!(second.is_noop());
        assert_eq!(second.current_version, first.current_version);
        assert_eq!(ctx.conn.total_changes(), changes_before);
        assert_eq!(runner.history(&ctx.conn).unwrap().len(), first.applied.len());
    }

    #[test_context(MigrationTestContext)]
    #[test]
    fn test_failure_rolls_back_only_that_migration(ctx: &mut MigrationTestContext) {
        let runner = runner(vec![
            Migration::new(1, "create_a", vec!["CREATE TABLE a (x INTEGER)"]),
            Migration::new(2, "create_b_then_fail", vec!["CREATE TABLE b (x INTEGER)", "INSERT INTO missing VALUES (1)"]),
            Migration::new(3, "create_c", vec!["CREATE TABLE c (x INTEGER)"]),
        ]);

        let err = runner.run(&mut ctx.conn).unwrap_err();
        assert!(matches!(err, DatabaseError::Migration { version: 2, .. }));
        assert_eq!(err.code(), "MIGRATION_ERROR");

        assert_eq!(runner.current_version(&ctx.conn).unwrap(), 1);
        assert!(table_exists(&ctx.conn, "a"));
        assert!(!table_exists(&ctx.conn, "b"));
        assert!(!table_exists(&ctx.conn, "c"));

        let history = runner.history(&ctx.conn).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "create_a");
    }

    #[test_context(MigrationTestContext)]
    #[test]
    fn test_resumes_from_recorded_version(ctx: &mut MigrationTestContext) {
        let v1 = Migration::new(1, "create_a", vec!["CREATE TABLE a (x INTEGER)"]);
        let v2 = Migration::new(2, "add_a_y", vec!["ALTER TABLE a ADD COLUMN y TEXT"]);

        runner(vec![v1.clone()]).run(&mut ctx.conn).unwrap();

        let upgraded = runner(vec![v1, v2]);
        assert!(upgraded.needs_migration(&ctx.conn).unwrap());
        let report = upgraded.run(&mut ctx.conn).unwrap();
        assert_eq!(report.applied, vec![2]);
        assert_eq!(report.current_version, 2);

        let status = upgraded.status(&ctx.conn).unwrap();
        assert!(status.is_up_to_date());
    }

    #[test]
    fn test_rejects_sequences_not_starting_at_one() {
        let err = MigrationRunner::with_migrations(
            vec![Migration::new(2, "two", vec!["CREATE TABLE a (x INTEGER)"])],
            Logger::disabled(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, DatabaseError::Migration { version: 2, .. }));
    }

    #[test]
    fn test_empty_sequence_only_creates_metadata() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = runner(Vec::new());

        let report = runner.run(&mut conn).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.current_version, 0);
        assert!(table_exists(&conn, "schema_version"));
        assert!(table_exists(&conn, "schema_migrations"));
    }
}
