#[cfg(test)]
mod tests {
    use rocket::tokio;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Row, SqlitePool};

    use crate::database::{ColumnInfo, SchemaMigrator, ensure_schema, get_table_columns};

    const SINGLE_TABLE_SCHEMA: &str = r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL
        );
    "#;

    const EXTENDED_SCHEMA: &str = r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL,
            nickname TEXT,
            role TEXT NOT NULL DEFAULT 'parent',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY,
            body TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_email ON users (email);
    "#;

    async fn create_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database")
    }

    async fn get_table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .expect("Failed to fetch table names")
        .into_iter()
        .map(|row| row.get::<String, _>(0))
        .collect()
    }

    fn column(name: &str, data_type: &str, not_null: bool, default: Option<&str>) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            not_null,
            default_value: default.map(str::to_string),
            primary_key: false,
        }
    }

    #[tokio::test]
    async fn test_fresh_database_gets_full_schema() {
        let pool = create_test_db().await;

        let report = ensure_schema(&pool).await.expect("migration failed");

        assert!(report.changed());
        let tables = get_table_names(&pool).await;
        for table in [
            "ablls_tasks",
            "assessments",
            "audit_logs",
            "child_parent_assignments",
            "child_therapist_assignments",
            "children",
            "edit_requests",
            "user_sessions",
            "users",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
        assert!(report.created_indexes.contains(&"idx_assessments_child_skill".to_string()));
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() {
        let pool = create_test_db().await;
        ensure_schema(&pool).await.expect("first migration failed");

        let report = ensure_schema(&pool).await.expect("second migration failed");

        assert!(!report.changed());
    }

    #[tokio::test]
    async fn test_missing_columns_are_appended_and_data_kept() {
        let pool = create_test_db().await;
        SchemaMigrator::new(pool.clone(), SINGLE_TABLE_SCHEMA)
            .migrate()
            .await
            .expect("initial migration failed");
        sqlx::query("INSERT INTO users (email) VALUES ('kept@example.com')")
            .execute(&pool)
            .await
            .unwrap();

        let report = SchemaMigrator::new(pool.clone(), EXTENDED_SCHEMA)
            .migrate()
            .await
            .expect("extending migration failed");

        assert_eq!(report.created_tables, vec!["notes".to_string()]);
        assert_eq!(
            report.added_columns,
            vec![
                "users.nickname".to_string(),
                "users.role".to_string(),
                "users.created_at".to_string(),
            ]
        );
        assert_eq!(report.created_indexes, vec!["idx_users_email".to_string()]);

        let row = sqlx::query("SELECT email, nickname, role, created_at IS NOT NULL FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>(0), "kept@example.com");
        assert_eq!(row.get::<Option<String>, _>(1), None);
        assert_eq!(row.get::<String, _>(2), "parent");
        assert_eq!(row.get::<i64, _>(3), 1, "created_at was not backfilled");
    }

    #[tokio::test]
    async fn test_unknown_tables_are_left_alone() {
        let pool = create_test_db().await;
        sqlx::query("CREATE TABLE legacy (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();

        SchemaMigrator::new(pool.clone(), SINGLE_TABLE_SCHEMA)
            .migrate()
            .await
            .expect("migration failed");

        let tables = get_table_names(&pool).await;
        assert_eq!(tables, vec!["legacy".to_string(), "users".to_string()]);
    }

    #[tokio::test]
    async fn test_table_columns_are_introspected() {
        let pool = create_test_db().await;
        SchemaMigrator::new(pool.clone(), EXTENDED_SCHEMA)
            .migrate()
            .await
            .unwrap();

        let columns = get_table_columns(&pool, "users").await.unwrap();

        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "email", "nickname", "role", "created_at"]);
        assert!(columns[0].primary_key);
        assert!(columns[1].not_null);
        assert_eq!(columns[3].default_value.as_deref(), Some("'parent'"));
    }

    #[test]
    fn test_add_column_statements() {
        assert_eq!(
            column("nickname", "TEXT", false, None)
                .add_column_statements("users")
                .unwrap(),
            vec!["ALTER TABLE users ADD COLUMN nickname TEXT".to_string()]
        );
        assert_eq!(
            column("role", "TEXT", true, Some("'parent'"))
                .add_column_statements("users")
                .unwrap(),
            vec!["ALTER TABLE users ADD COLUMN role TEXT NOT NULL DEFAULT 'parent'".to_string()]
        );
        assert_eq!(
            column("created_at", "TIMESTAMP", true, Some("CURRENT_TIMESTAMP"))
                .add_column_statements("users")
                .unwrap(),
            vec![
                "ALTER TABLE users ADD COLUMN created_at TIMESTAMP".to_string(),
                "UPDATE users SET created_at = CURRENT_TIMESTAMP".to_string(),
            ]
        );
        assert!(
            column("email", "TEXT", true, None)
                .add_column_statements("users")
                .is_err()
        );

        let mut key = column("id", "INTEGER", false, None);
        key.primary_key = true;
        assert!(key.add_column_statements("users").is_err());
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_schema_future_can_run_on_multithreaded_runtime() {
        let pool = create_test_db().await;
        let future = ensure_schema(&pool);
        assert_send(&future);
        let report = future.await.unwrap();
        assert!(report.changed());

        let migrator = SchemaMigrator::new(create_test_db().await, SINGLE_TABLE_SCHEMA);
        let migrate = migrator.migrate();
        assert_send(&migrate);
        migrate.await.unwrap();
    }
}
