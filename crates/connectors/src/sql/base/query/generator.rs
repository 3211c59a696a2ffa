use crate::sql::base::{error::DbError, query::statement::Statement};
use model::{
    core::{
        key::{ColumnSet, KeyDescriptor, KeyKind},
        value::Value,
    },
    records::batch::Batch,
};
use tracing::debug;

/// Marker comment placed in every generated statement so DBAs can spot the
/// archiver's traffic in the processlist and slow log.
const STATEMENT_TAG: &str = "/* tablemover */";

/// Statement pair that moves one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveStatements {
    pub insert: Statement,
    pub delete: Statement,
}

struct CachedTemplates {
    row_count: usize,
    insert_sql: String,
    /// `None` for keyless tables, whose delete depends on which values are NULL.
    delete_sql: Option<String>,
}

/// Builds the SELECT/INSERT/DELETE statements for one archive job.
///
/// The SELECT is fixed for the whole job. INSERT and keyed DELETE templates
/// depend only on the number of rows in a batch and are rebuilt only when
/// that number changes (usually just for the trailing batch).
pub struct StatementFactory {
    source: String,
    target: String,
    columns: ColumnSet,
    key: KeyDescriptor,
    filter: Option<String>,
    select: Statement,
    cached: Option<CachedTemplates>,
    template_builds: u64,
}

impl StatementFactory {
    pub fn new(
        source: &str,
        target: &str,
        columns: ColumnSet,
        key: KeyDescriptor,
        filter: Option<String>,
        limit: usize,
    ) -> Self {
        let filter = filter.filter(|f| !f.trim().is_empty());
        let select = Statement::raw(select_sql(
            source,
            &columns,
            &key,
            filter.as_deref(),
            limit,
        ));

        StatementFactory {
            source: source.to_string(),
            target: target.to_string(),
            columns,
            key,
            filter,
            select,
            cached: None,
            template_builds: 0,
        }
    }

    pub fn select(&self) -> &Statement {
        &self.select
    }

    /// How many times the row-count dependent templates were (re)built.
    pub fn template_builds(&self) -> u64 {
        self.template_builds
    }

    /// Insert and delete statements for `batch`, bound to the values captured
    /// from exactly the fetched rows.
    pub fn statements_for(&mut self, batch: &Batch) -> Result<MoveStatements, DbError> {
        let row_count = batch.row_count();
        if row_count == 0 {
            return Err(DbError::QueryBuildError(
                "cannot build move statements for an empty batch".to_string(),
            ));
        }
        if let Some(bad) = batch.rows.iter().find(|r| r.len() != self.columns.len()) {
            return Err(DbError::QueryBuildError(format!(
                "row has {} values but the table has {} columns",
                bad.len(),
                self.columns.len()
            )));
        }

        if self.cached.as_ref().map(|c| c.row_count) != Some(row_count) {
            self.rebuild_templates(row_count);
        }
        let cached = self
            .cached
            .as_ref()
            .ok_or_else(|| DbError::QueryBuildError("statement templates missing".to_string()))?;

        let insert = Statement::new(
            cached.insert_sql.clone(),
            batch
                .rows
                .iter()
                .flat_map(|r| r.values().iter().cloned())
                .collect(),
        );

        let null_key = self.key.kind() == KeyKind::Secondary
            && batch.key_values.iter().flatten().any(Value::is_null);
        let delete = match &cached.delete_sql {
            Some(_) if null_key => self.null_safe_key_delete(batch),
            Some(sql) => Statement::new(
                sql.clone(),
                batch.key_values.iter().flatten().cloned().collect(),
            ),
            None => self.full_match_delete(batch),
        };

        Ok(MoveStatements { insert, delete })
    }

    fn rebuild_templates(&mut self, row_count: usize) {
        debug!(
            rows = row_count,
            previous = ?self.cached.as_ref().map(|c| c.row_count),
            "Rebuilding statement templates"
        );

        let column_list = column_list(self.columns.names());
        let tuples = repeat_tuple(self.columns.len(), row_count);
        let insert_sql = format!(
            "INSERT {STATEMENT_TAG} INTO {} ({column_list}) VALUES {tuples}",
            quote_ident(&self.target)
        );

        let delete_sql = match self.key.kind() {
            KeyKind::None => None,
            KeyKind::Unique => Some(format!(
                "DELETE {STATEMENT_TAG} FROM {} WHERE ({}) IN ({})",
                quote_ident(&self.source),
                column_list_of(&self.key),
                repeat_tuple(self.key.columns().len(), row_count)
            )),
            KeyKind::Secondary => Some(format!(
                "DELETE {STATEMENT_TAG} FROM {} WHERE {}({}) IN ({}) ORDER BY {} LIMIT {row_count}",
                quote_ident(&self.source),
                self.scope(),
                column_list_of(&self.key),
                repeat_tuple(self.key.columns().len(), row_count),
                column_list_of(&self.key),
            )),
        };

        self.cached = Some(CachedTemplates {
            row_count,
            insert_sql,
            delete_sql,
        });
        self.template_builds += 1;
    }

    /// `(<where>) AND ` when the job is filtered.
    fn scope(&self) -> String {
        self.filter
            .as_ref()
            .map(|f| format!("({f}) AND "))
            .unwrap_or_default()
    }

    /// Secondary-key delete for a batch holding NULL key values, which `IN`
    /// never matches: `((k1 <=> ? AND k2 <=> ?) OR (...)) ORDER BY k LIMIT n`.
    fn null_safe_key_delete(&self, batch: &Batch) -> Statement {
        let terms = self
            .key
            .columns()
            .iter()
            .map(|c| format!("{} <=> ?", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let clauses = vec![format!("({terms})"); batch.row_count()].join(" OR ");

        Statement::new(
            format!(
                "DELETE {STATEMENT_TAG} FROM {} WHERE {}({clauses}) ORDER BY {} LIMIT {}",
                quote_ident(&self.source),
                self.scope(),
                column_list_of(&self.key),
                batch.row_count()
            ),
            batch.key_values.iter().flatten().cloned().collect(),
        )
    }

    /// `(a = ? AND b IS NULL) OR (...) LIMIT n`: matches every fetched row on
    /// all of its columns.
    fn full_match_delete(&self, batch: &Batch) -> Statement {
        let mut params = Vec::with_capacity(batch.row_count() * self.columns.len());
        let clauses = batch
            .rows
            .iter()
            .map(|row| {
                let terms = self
                    .columns
                    .names()
                    .iter()
                    .zip(row.values())
                    .map(|(column, value)| match value {
                        Value::Null => format!("{} IS NULL", quote_ident(column)),
                        v => {
                            params.push(v.clone());
                            format!("{} = ?", quote_ident(column))
                        }
                    })
                    .collect::<Vec<_>>();
                format!("({})", terms.join(" AND "))
            })
            .collect::<Vec<_>>();

        Statement::new(
            format!(
                "DELETE {STATEMENT_TAG} FROM {} WHERE {} LIMIT {}",
                quote_ident(&self.source),
                clauses.join(" OR "),
                batch.row_count()
            ),
            params,
        )
    }
}

fn select_sql(
    source: &str,
    columns: &ColumnSet,
    key: &KeyDescriptor,
    filter: Option<&str>,
    limit: usize,
) -> String {
    let mut sql = format!(
        "SELECT {STATEMENT_TAG} {} FROM {}",
        column_list(columns.names()),
        quote_ident(source)
    );
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    if key.kind() != KeyKind::None {
        sql.push_str(" ORDER BY ");
        sql.push_str(&column_list_of(key));
    }
    sql.push_str(&format!(" LIMIT {limit}"));
    sql
}

/// Backtick-quotes an identifier, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn column_list_of(key: &KeyDescriptor) -> String {
    column_list(key.columns())
}

/// `(?, ?), (?, ?)` for `width = 2, count = 2`.
fn repeat_tuple(width: usize, count: usize) -> String {
    let tuple = format!("({})", vec!["?"; width].join(", "));
    vec![tuple; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::records::row::Row;

    fn columns() -> ColumnSet {
        ColumnSet::new(vec!["a".into(), "b".into(), "c".into()])
    }

    fn unique_a() -> KeyDescriptor {
        KeyDescriptor::indexed("PRIMARY", KeyKind::Unique, vec!["a".into()], vec![0]).unwrap()
    }

    fn rows(n: i64) -> Vec<Row> {
        (0..n)
            .map(|i| Row::new(vec![Value::Int(i), Value::from(format!("b{i}")), Value::Null]))
            .collect()
    }

    #[test]
    fn select_orders_by_key_and_applies_filter() {
        let factory = StatementFactory::new(
            "orders",
            "orders_archive",
            columns(),
            unique_a(),
            Some("created_at < '2020-01-01'".into()),
            500,
        );
        assert_eq!(
            factory.select().sql,
            "SELECT /* tablemover */ `a`, `b`, `c` FROM `orders` WHERE created_at < '2020-01-01' ORDER BY `a` LIMIT 500"
        );
        assert!(factory.select().params.is_empty());
    }

    #[test]
    fn select_without_key_has_no_order_by() {
        let factory =
            StatementFactory::new("t", "t2", columns(), KeyDescriptor::none(), Some("  ".into()), 10);
        assert_eq!(
            factory.select().sql,
            "SELECT /* tablemover */ `a`, `b`, `c` FROM `t` LIMIT 10"
        );
    }

    #[test]
    fn unique_key_statement_shape() {
        let mut factory = StatementFactory::new("t", "t2", columns(), unique_a(), None, 4);
        let batch = Batch::new(0, rows(2), &[0]);
        let stmts = factory.statements_for(&batch).unwrap();

        assert_eq!(
            stmts.insert.sql,
            "INSERT /* tablemover */ INTO `t2` (`a`, `b`, `c`) VALUES (?, ?, ?), (?, ?, ?)"
        );
        assert_eq!(stmts.insert.params.len(), 6);
        assert_eq!(stmts.insert.placeholder_count(), 6);

        assert_eq!(
            stmts.delete.sql,
            "DELETE /* tablemover */ FROM `t` WHERE (`a`) IN ((?), (?))"
        );
        assert_eq!(stmts.delete.params, vec![Value::Int(0), Value::Int(1)]);
    }

    #[test]
    fn secondary_key_delete_is_bounded_and_scoped() {
        let key = KeyDescriptor::indexed(
            "idx_bc",
            KeyKind::Secondary,
            vec!["b".into(), "c".into()],
            vec![1, 2],
        )
        .unwrap();
        let mut factory = StatementFactory::new("t", "t2", columns(), key, Some("a > 0".into()), 3);
        let batch = Batch::new(0, rows(3), &[1, 2]);
        let stmts = factory.statements_for(&batch).unwrap();

        assert_eq!(
            stmts.delete.sql,
            "DELETE /* tablemover */ FROM `t` WHERE (a > 0) AND (`b`, `c`) IN ((?, ?), (?, ?), (?, ?)) ORDER BY `b`, `c` LIMIT 3"
        );
        assert_eq!(stmts.delete.params.len(), 6);
    }

    #[test]
    fn secondary_delete_with_null_keys_uses_null_safe_equality() {
        let key = KeyDescriptor::indexed("idx_c", KeyKind::Secondary, vec!["c".into()], vec![2])
            .unwrap();
        let mut factory = StatementFactory::new("t", "t2", columns(), key, Some("a > 0".into()), 3);
        let batch = Batch::new(
            0,
            vec![
                Row::new(vec![Value::Int(1), "x".into(), Value::Null]),
                Row::new(vec![Value::Int(2), "y".into(), Value::Int(7)]),
            ],
            &[2],
        );
        let stmts = factory.statements_for(&batch).unwrap();

        assert_eq!(
            stmts.delete.sql,
            "DELETE /* tablemover */ FROM `t` WHERE (a > 0) AND ((`c` <=> ?) OR (`c` <=> ?)) ORDER BY `c` LIMIT 2"
        );
        assert_eq!(stmts.delete.params, vec![Value::Null, Value::Int(7)]);

        // Batches without NULL keys keep the cached `IN` form.
        let plain = Batch::new(
            1,
            vec![
                Row::new(vec![Value::Int(3), "z".into(), Value::Int(8)]),
                Row::new(vec![Value::Int(4), "w".into(), Value::Int(9)]),
            ],
            &[2],
        );
        let stmts = factory.statements_for(&plain).unwrap();
        assert!(stmts.delete.sql.contains("(a > 0) AND (`c`) IN ((?), (?))"));
        assert_eq!(factory.template_builds(), 1);
    }

    #[test]
    fn keyless_delete_matches_every_column_and_nulls() {
        let mut factory = StatementFactory::new("t", "t2", columns(), KeyDescriptor::none(), None, 10);
        let batch = Batch::new(
            0,
            vec![
                Row::new(vec![Value::Int(1), "x".into(), Value::Null]),
                Row::new(vec![Value::Null, "y".into(), Value::Int(3)]),
            ],
            &[],
        );
        let stmts = factory.statements_for(&batch).unwrap();

        assert_eq!(
            stmts.delete.sql,
            "DELETE /* tablemover */ FROM `t` WHERE (`a` = ? AND `b` = ? AND `c` IS NULL) OR (`a` IS NULL AND `b` = ? AND `c` = ?) LIMIT 2"
        );
        assert_eq!(
            stmts.delete.params,
            vec![Value::Int(1), "x".into(), "y".into(), Value::Int(3)]
        );
    }

    #[test]
    fn templates_rebuild_only_when_row_count_changes() {
        let mut factory = StatementFactory::new("t", "t2", columns(), unique_a(), None, 4);

        factory.statements_for(&Batch::new(0, rows(4), &[0])).unwrap();
        factory.statements_for(&Batch::new(1, rows(4), &[0])).unwrap();
        assert_eq!(factory.template_builds(), 1);

        let tail = factory.statements_for(&Batch::new(2, rows(2), &[0])).unwrap();
        assert_eq!(factory.template_builds(), 2);
        assert_eq!(tail.insert.placeholder_count(), 6);
    }

    #[test]
    fn rejects_empty_and_misshapen_batches() {
        let mut factory = StatementFactory::new("t", "t2", columns(), unique_a(), None, 4);
        assert!(factory.statements_for(&Batch::new(0, vec![], &[0])).is_err());

        let short = Batch::new(0, vec![Row::new(vec![Value::Int(1)])], &[0]);
        assert!(matches!(
            factory.statements_for(&short),
            Err(DbError::QueryBuildError(_))
        ));
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }
}
