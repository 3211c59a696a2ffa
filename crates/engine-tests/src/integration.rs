#[cfg(test)]
mod tests {
    use crate::{
        TEST_MYSQL_ADDRESS, TEST_MYSQL_ARCHIVE_DB, TEST_MYSQL_PASSWORD, TEST_MYSQL_SOURCE_DB,
        TEST_MYSQL_USER, execute, row_count,
    };
    use engine_config::settings::{JobConfig, JobSettings};
    use engine_runtime::{error::ErrorKind, execution::executor::run};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tracing_test::traced_test;

    const ORDERS_DDL: &str = r#"
        CREATE TABLE {table} (
            id INT NOT NULL PRIMARY KEY,
            customer VARCHAR(32) NOT NULL,
            note VARCHAR(64) NULL,
            created_at DATETIME NOT NULL,
            total INT GENERATED ALWAYS AS (id * 10) VIRTUAL
        )"#;

    const EVENTS_DDL: &str = r#"
        CREATE TABLE {table} (
            kind VARCHAR(16) NULL,
            payload VARCHAR(64) NULL
        )"#;

    fn ddl(template: &str, table: &str) -> String {
        template.replace("{table}", table)
    }

    fn config(table: &str, limit: usize, filter: Option<&str>) -> JobConfig {
        let mut settings = JobSettings::default();
        settings.source.address = TEST_MYSQL_ADDRESS.into();
        settings.source.username = TEST_MYSQL_USER.into();
        settings.source.password = TEST_MYSQL_PASSWORD.into();
        settings.source.database = TEST_MYSQL_SOURCE_DB.into();
        settings.source_table = table.into();
        settings.target.address = TEST_MYSQL_ADDRESS.into();
        settings.target.username = TEST_MYSQL_USER.into();
        settings.target.password = TEST_MYSQL_PASSWORD.into();
        settings.target.database = Some(TEST_MYSQL_ARCHIVE_DB.into());
        settings.filter = filter.map(str::to_string);
        settings.limit = limit;
        settings.progress = Duration::ZERO;
        settings.control = false;
        settings.validate().expect("valid settings")
    }

    async fn reset(table: &str, template: &str) {
        let drop = format!("DROP TABLE IF EXISTS `{table}`");
        let create = ddl(template, table);
        execute(TEST_MYSQL_SOURCE_DB, &[&drop, &create]).await;
        execute(TEST_MYSQL_ARCHIVE_DB, &[&drop, &create]).await;
    }

    // Scenario: 25 orders, limit 10, primary key, generated column on both sides.
    // Expected: all rows move in three batches and the generated column is not copied.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a MySQL server on 127.0.0.1:3306"]
    async fn moves_primary_keyed_table() {
        reset("it_orders", ORDERS_DDL).await;
        let inserts: Vec<String> = (1..=25)
            .map(|id| {
                format!(
                    "INSERT INTO it_orders (id, customer, note, created_at) \
                     VALUES ({id}, 'c{}', {}, '2020-01-{:02} 00:00:00')",
                    id % 4,
                    if id % 5 == 0 { "NULL".to_string() } else { format!("'n{id}'") },
                    id
                )
            })
            .collect();
        let inserts: Vec<&str> = inserts.iter().map(String::as_str).collect();
        execute(TEST_MYSQL_SOURCE_DB, &inserts).await;

        let summary = run(config("it_orders", 10, None), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.batches, 3);
        assert_eq!(summary.counts.deleted, 25);
        assert_eq!(row_count(TEST_MYSQL_SOURCE_DB, "it_orders").await, 0);
        assert_eq!(row_count(TEST_MYSQL_ARCHIVE_DB, "it_orders").await, 25);
        assert!(logs_contain("Batch moved"));
    }

    // Scenario: filter on the creation date.
    // Expected: only matching rows move; the rest stay in the source.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a MySQL server on 127.0.0.1:3306"]
    async fn moves_only_filtered_rows() {
        reset("it_orders_f", ORDERS_DDL).await;
        let inserts: Vec<String> = (1..=20)
            .map(|id| {
                format!(
                    "INSERT INTO it_orders_f (id, customer, created_at) \
                     VALUES ({id}, 'c', '2020-01-{id:02} 00:00:00')"
                )
            })
            .collect();
        let inserts: Vec<&str> = inserts.iter().map(String::as_str).collect();
        execute(TEST_MYSQL_SOURCE_DB, &inserts).await;

        let summary = run(
            config("it_orders_f", 4, Some("created_at < '2020-01-08'")),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.counts.deleted, 7);
        assert_eq!(row_count(TEST_MYSQL_SOURCE_DB, "it_orders_f").await, 13);
        assert_eq!(row_count(TEST_MYSQL_ARCHIVE_DB, "it_orders_f").await, 7);
    }

    // Scenario: table without indexes and rows containing NULLs.
    // Expected: whole-row deletes remove every moved row.
    #[traced_test]
    #[tokio::test]
    #[ignore = "requires a MySQL server on 127.0.0.1:3306"]
    async fn moves_keyless_table_with_nulls() {
        reset("it_events", EVENTS_DDL).await;
        execute(
            TEST_MYSQL_SOURCE_DB,
            &[
                "INSERT INTO it_events VALUES ('a', NULL), (NULL, 'b'), (NULL, NULL), \
                 ('a', NULL), ('c', 'd')",
            ],
        )
        .await;

        let summary = run(config("it_events", 10, None), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.batches, 1);
        assert_eq!(summary.counts.inserted, 5);
        assert_eq!(summary.counts.deleted, 5);
        assert_eq!(row_count(TEST_MYSQL_SOURCE_DB, "it_events").await, 0);
    }

    #[tokio::test]
    #[ignore = "requires a MySQL server on 127.0.0.1:3306"]
    async fn missing_target_table_fails_before_moving() {
        reset("it_orders_m", ORDERS_DDL).await;
        execute(TEST_MYSQL_ARCHIVE_DB, &["DROP TABLE IF EXISTS `it_orders_m`"]).await;

        let failure = run(config("it_orders_m", 10, None), CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::Schema);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connect_error() {
        let mut cfg = config("it_orders", 10, None);
        cfg.source.endpoint.address = "127.0.0.1:1".into();

        let failure = run(cfg, CancellationToken::new()).await.unwrap_err();

        assert_eq!(failure.kind(), ErrorKind::Connect);
        assert_eq!(failure.summary.counts.selected, 0);
    }
}
