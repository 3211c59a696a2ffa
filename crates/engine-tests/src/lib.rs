#![allow(dead_code)]

use mysql_async::{Opts, OptsBuilder, Pool, prelude::Queryable};

pub mod integration;
pub mod memory_db;
pub mod utils;

// Live MySQL used by the ignored integration tests.
const TEST_MYSQL_ADDRESS: &str = "127.0.0.1:3306";
const TEST_MYSQL_USER: &str = "user";
const TEST_MYSQL_PASSWORD: &str = "password";
const TEST_MYSQL_SOURCE_DB: &str = "testdb";
const TEST_MYSQL_ARCHIVE_DB: &str = "testdb_archive";

fn mysql_pool(database: &str) -> Pool {
    let (host, port) = TEST_MYSQL_ADDRESS.split_once(':').expect("host:port");
    let opts = OptsBuilder::default()
        .ip_or_hostname(host)
        .tcp_port(port.parse().expect("port"))
        .user(Some(TEST_MYSQL_USER))
        .pass(Some(TEST_MYSQL_PASSWORD))
        .db_name(Some(database));
    Pool::new(Opts::from(opts))
}

/// Runs each statement on `database`, panicking on the first failure.
async fn execute(database: &str, statements: &[&str]) {
    let pool = mysql_pool(database);
    let mut conn = pool.get_conn().await.expect("connect mysql");
    for sql in statements {
        conn.query_drop(*sql)
            .await
            .unwrap_or_else(|e| panic!("{sql}: {e}"));
    }
    drop(conn);
    pool.disconnect().await.expect("disconnect mysql");
}

async fn row_count(database: &str, table: &str) -> i64 {
    let pool = mysql_pool(database);
    let mut conn = pool.get_conn().await.expect("connect mysql");
    let count: Option<i64> = conn
        .query_first(format!("SELECT COUNT(*) FROM `{table}`"))
        .await
        .expect("count rows");
    drop(conn);
    pool.disconnect().await.expect("disconnect mysql");
    count.unwrap_or_default()
}
