//! An in-memory stand-in for one MySQL schema.
//!
//! It understands exactly the statement shapes the archiver generates, keeps
//! transaction effects private until commit, and records every statement and
//! transaction event so tests can assert on ordering.

use async_trait::async_trait;
use connectors::sql::base::{
    adapter::SqlAdapter,
    error::DbError,
    metadata::index::{IndexColumn, IndexInfo, PlannerEstimate},
    query::statement::Statement,
    transaction::SqlTransaction,
};
use model::{core::value::Value, records::row::Row};
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

/// Ordered transaction events shared by the source and target databases.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn push(&self, event: String) {
        lock(&self.0).push(event);
    }

    pub fn events(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    /// Events of the form `<db>:<what>`, in order.
    pub fn of(&self, what: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.ends_with(&format!(":{what}")))
            .collect()
    }
}

/// A predicate standing in for a SQL `WHERE` clause.
pub type RowFilter = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// Injected failures. Counters are 1-based and per database.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub fail_exec_at: Option<usize>,
    pub fail_commit_at: Option<usize>,
    /// Every INSERT silently writes one row fewer than it was given.
    pub short_inserts: bool,
    /// Every DELETE affects no rows, as if another session removed them first.
    pub empty_deletes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub indexes: Vec<IndexInfo>,
    pub planner_key: Option<String>,
}

impl MemoryTable {
    pub fn new(columns: &[&str]) -> Self {
        MemoryTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_index(mut self, name: &str, unique: bool, columns: &[(&str, bool)]) -> Self {
        self.indexes.push(IndexInfo {
            name: name.to_string(),
            unique,
            columns: columns
                .iter()
                .map(|(c, nullable)| IndexColumn {
                    name: c.to_string(),
                    nullable: *nullable,
                })
                .collect(),
            cardinality: None,
        });
        self
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<String, MemoryTable>,
    filters: HashMap<String, RowFilter>,
    faults: Faults,
    execs: usize,
    commits: usize,
    statements: Vec<String>,
}

#[derive(Clone)]
pub struct MemoryDb {
    name: &'static str,
    state: Arc<Mutex<State>>,
    log: EventLog,
}

impl MemoryDb {
    pub fn new(name: &'static str, log: &EventLog) -> Self {
        MemoryDb {
            name,
            state: Arc::new(Mutex::new(State::default())),
            log: log.clone(),
        }
    }

    pub fn with_table(self, name: &str, table: MemoryTable) -> Self {
        lock(&self.state).tables.insert(name.to_string(), table);
        self
    }

    /// Registers the predicate evaluated for the literal `WHERE` text `sql`.
    pub fn with_filter(self, sql: &str, filter: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        lock(&self.state)
            .filters
            .insert(sql.to_string(), Arc::new(filter));
        self
    }

    pub fn set_faults(&self, faults: Faults) {
        let mut state = lock(&self.state);
        state.faults = faults;
        state.execs = 0;
        state.commits = 0;
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        lock(&self.state)
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Every statement sent to this database, in order.
    pub fn statements(&self) -> Vec<String> {
        lock(&self.state).statements.clone()
    }

    fn record(&self, sql: &str) {
        lock(&self.state).statements.push(sql.to_string());
    }
}

#[async_trait]
impl SqlAdapter for MemoryDb {
    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn query_rows(&self, stmt: &Statement) -> Result<Vec<Row>, DbError> {
        self.record(&stmt.sql);
        let select = parse_select(&stmt.sql)?;

        let state = lock(&self.state);
        let table = table(&state, &select.table)?;
        let filter = filter(&state, select.filter.as_deref())?;
        let positions = select
            .columns
            .iter()
            .map(|c| {
                table
                    .position(c)
                    .ok_or_else(|| DbError::Unknown(format!("Unknown column '{c}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows: Vec<&Row> = table
            .rows
            .iter()
            .filter(|r| filter.as_ref().is_none_or(|f| f(*r)))
            .collect();
        if let Some(order) = &select.order {
            let order = key_positions(table, order)?;
            rows.sort_by(|a, b| compare_rows(a, b, &order));
        }

        Ok(rows
            .into_iter()
            .take(select.limit)
            .map(|r| Row::new(r.project(&positions)))
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn SqlTransaction>, DbError> {
        self.log.push(format!("{}:begin", self.name));
        Ok(Box::new(MemoryTransaction {
            db: self.clone(),
            inserts: Vec::new(),
            deletes: Vec::new(),
        }))
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DbError> {
        Ok(lock(&self.state).tables.contains_key(table))
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        Ok(lock(&self.state)
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn explain(&self, table: &str, filter: Option<&str>) -> Result<PlannerEstimate, DbError> {
        let state = lock(&self.state);
        let t = self::table(&state, table)?;
        let filter = self::filter(&state, filter)?;
        Ok(PlannerEstimate {
            key: t.planner_key.clone(),
            rows: t
                .rows
                .iter()
                .filter(|r| filter.as_ref().is_none_or(|f| f(*r)))
                .count() as i64,
        })
    }

    async fn index_catalog(&self, table: &str) -> Result<Vec<IndexInfo>, DbError> {
        Ok(self::table(&lock(&self.state), table)?.indexes.clone())
    }
}

struct MemoryTransaction {
    db: MemoryDb,
    inserts: Vec<(String, Row)>,
    deletes: Vec<(String, Row)>,
}

#[async_trait]
impl SqlTransaction for MemoryTransaction {
    async fn exec(&mut self, stmt: &Statement) -> Result<i64, DbError> {
        // Give the peer worker a chance to run between statements.
        tokio::task::yield_now().await;
        self.db.record(&stmt.sql);

        let mut state = lock(&self.db.state);
        state.execs += 1;
        if state.faults.fail_exec_at == Some(state.execs) {
            return Err(DbError::Unknown(format!("{}: injected exec failure", self.db.name)));
        }

        if stmt.sql.starts_with("INSERT") {
            let (table, rows) = self.plan_insert(&state, stmt)?;
            let mut rows = rows;
            if state.faults.short_inserts {
                rows.pop();
            }
            let affected = rows.len() as i64;
            self.inserts.extend(rows.into_iter().map(|r| (table.clone(), r)));
            Ok(affected)
        } else if stmt.sql.starts_with("DELETE") {
            let (table, mut rows) = self.plan_delete(&state, stmt)?;
            if state.faults.empty_deletes {
                rows.clear();
            }
            let affected = rows.len() as i64;
            self.deletes.extend(rows.into_iter().map(|r| (table.clone(), r)));
            Ok(affected)
        } else {
            Err(DbError::Unknown(format!("unsupported statement: {}", stmt.sql)))
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        let mut state = lock(&self.db.state);
        state.commits += 1;
        if state.faults.fail_commit_at == Some(state.commits) {
            return Err(DbError::Unknown(format!("{}: injected commit failure", self.db.name)));
        }

        for (table, row) in &self.deletes {
            if let Some(t) = state.tables.get_mut(table)
                && let Some(pos) = t.rows.iter().position(|r| r == row)
            {
                t.rows.remove(pos);
            }
        }
        for (table, row) in self.inserts {
            if let Some(t) = state.tables.get_mut(&table) {
                t.rows.push(row);
            }
        }
        drop(state);

        self.db.log.push(format!("{}:commit", self.db.name));
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.db.log.push(format!("{}:rollback", self.db.name));
        Ok(())
    }
}

impl MemoryTransaction {
    fn plan_insert(&self, state: &State, stmt: &Statement) -> Result<(String, Vec<Row>), DbError> {
        let rest = expect_prefix(&stmt.sql, "INSERT /* tablemover */ INTO ")?;
        let (table_name, rest) = parse_ident(rest)?;
        let (column_list, _) = rest
            .trim_start()
            .split_once(" VALUES ")
            .ok_or_else(|| malformed(&stmt.sql))?;
        let columns = parse_ident_list(column_list)?;
        if columns.is_empty() || stmt.params.len() % columns.len() != 0 {
            return Err(malformed(&stmt.sql));
        }

        let table = table(state, &table_name)?;
        let rows: Vec<Row> = stmt
            .params
            .chunks(columns.len())
            .map(|values| {
                Row::new(
                    table
                        .columns
                        .iter()
                        .map(|c| {
                            columns
                                .iter()
                                .position(|ic| ic == c)
                                .map(|i| values[i].clone())
                                .unwrap_or(Value::Null)
                        })
                        .collect(),
                )
            })
            .collect();

        for index in table.indexes.iter().filter(|i| i.unique) {
            let positions = key_positions(table, &index.column_names())?;
            let existing = table.rows.iter().chain(
                self.inserts
                    .iter()
                    .filter(|(t, _)| *t == table_name)
                    .map(|(_, r)| r),
            );
            let mut seen: Vec<Vec<Value>> = existing.map(|r| r.project(&positions)).collect();
            for row in &rows {
                let key = row.project(&positions);
                if key.iter().any(Value::is_null) {
                    continue;
                }
                if seen.contains(&key) {
                    return Err(DbError::Unknown(format!(
                        "Duplicate entry for key '{}'",
                        index.name
                    )));
                }
                seen.push(key);
            }
        }

        Ok((table_name, rows))
    }

    fn plan_delete(&self, state: &State, stmt: &Statement) -> Result<(String, Vec<Row>), DbError> {
        let rest = expect_prefix(&stmt.sql, "DELETE /* tablemover */ FROM ")?;
        let (table_name, rest) = parse_ident(rest)?;
        let predicate = expect_prefix(rest, " WHERE ")?;
        let (predicate, limit) = match predicate.rsplit_once(" LIMIT ") {
            Some((p, l)) => (p, Some(l.parse::<usize>().map_err(|_| malformed(&stmt.sql))?)),
            None => (predicate, None),
        };
        let (predicate, order) = match predicate.rsplit_once(" ORDER BY ") {
            Some((p, o)) => (p, Some(parse_ident_list(&format!("({o})"))?)),
            None => (predicate, None),
        };

        let table = table(state, &table_name)?;
        let matcher = Matcher::parse(predicate, &stmt.params, table, state)?;

        let pending: Vec<&Row> = self
            .deletes
            .iter()
            .filter(|(t, _)| *t == table_name)
            .map(|(_, r)| r)
            .collect();
        let mut candidates: Vec<&Row> = table
            .rows
            .iter()
            .filter(|r| !pending.contains(r) && matcher.matches(r))
            .collect();
        if let Some(order) = order {
            let order = key_positions(table, &order)?;
            candidates.sort_by(|a, b| compare_rows(a, b, &order));
        }

        Ok((
            table_name,
            candidates
                .into_iter()
                .take(limit.unwrap_or(usize::MAX))
                .cloned()
                .collect(),
        ))
    }
}

enum Term {
    Eq(usize, Value),
    IsNull(usize),
    NullSafeEq(usize, Value),
}

enum Matcher {
    /// `[(<filter>) AND ](<cols>) IN ((?, ..), ..)`
    KeyIn {
        filter: Option<RowFilter>,
        positions: Vec<usize>,
        tuples: Vec<Vec<Value>>,
    },
    /// `(<c> = ? AND <c> IS NULL ..) OR (..)`, or
    /// `[(<filter>) AND ]((<c> <=> ? ..) OR (..))`
    Clauses {
        filter: Option<RowFilter>,
        clauses: Vec<Vec<Term>>,
    },
}

impl Matcher {
    fn parse(
        predicate: &str,
        params: &[Value],
        table: &MemoryTable,
        state: &State,
    ) -> Result<Self, DbError> {
        if let Some(in_at) = predicate.find(") IN (") {
            let open = predicate[..in_at]
                .rfind("(`")
                .ok_or_else(|| malformed(predicate))?;
            let columns = parse_ident_list(&predicate[open..=in_at])?;
            let positions = key_positions(table, &columns)?;
            let scope = predicate[..open].trim_end().strip_suffix(" AND");

            return Ok(Matcher::KeyIn {
                filter: scope_filter(state, scope)?,
                tuples: params.chunks(positions.len()).map(|c| c.to_vec()).collect(),
                positions,
            });
        }

        if predicate.contains(" <=> ?") {
            let (scope, disjunction) = match predicate.find(" AND ((`") {
                Some(at) => (Some(&predicate[..at]), &predicate[at + " AND ".len()..]),
                None => (None, predicate),
            };
            let disjunction = strip_parens(disjunction)?;
            return Ok(Matcher::Clauses {
                filter: scope_filter(state, scope)?,
                clauses: parse_clauses(disjunction, params, table)?,
            });
        }

        Ok(Matcher::Clauses {
            filter: None,
            clauses: parse_clauses(predicate, params, table)?,
        })
    }

    fn matches(&self, row: &Row) -> bool {
        match self {
            Matcher::KeyIn {
                filter,
                positions,
                tuples,
            } => {
                let key = row.project(positions);
                // NULL never compares equal in SQL.
                !key.iter().any(Value::is_null)
                    && filter.as_ref().is_none_or(|f| f(row))
                    && tuples.contains(&key)
            }
            Matcher::Clauses { filter, clauses } => {
                filter.as_ref().is_none_or(|f| f(row))
                    && clauses.iter().any(|terms| {
                        terms.iter().all(|term| match term {
                            Term::Eq(p, v) => row.get(*p).is_some_and(|x| !x.is_null() && x == v),
                            Term::IsNull(p) => row.get(*p).is_none_or(Value::is_null),
                            Term::NullSafeEq(p, v) => match row.get(*p) {
                                Some(x) if x.is_null() || v.is_null() => x.is_null() && v.is_null(),
                                Some(x) => x == v,
                                None => v.is_null(),
                            },
                        })
                    })
            }
        }
    }
}

/// Resolves the registered predicate for a `(<filter>)` scope.
fn scope_filter(state: &State, scope: Option<&str>) -> Result<Option<RowFilter>, DbError> {
    match scope {
        Some(scope) => filter(state, Some(strip_parens(scope)?)),
        None => Ok(None),
    }
}

fn strip_parens(s: &str) -> Result<&str, DbError> {
    s.strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| malformed(s))
}

/// Reads `(<term> AND ..) OR (..)`, binding `?` terms to `params` in order.
fn parse_clauses(s: &str, params: &[Value], table: &MemoryTable) -> Result<Vec<Vec<Term>>, DbError> {
    let mut params = params.iter();
    strip_parens(s)?
        .split(") OR (")
        .map(|clause| {
            clause
                .split(" AND ")
                .map(|term| {
                    let (column, rest) = parse_ident(term)?;
                    let position = key_positions(table, &[column])?[0];
                    let mut bind = || params.next().cloned().ok_or_else(|| malformed(s));
                    match rest {
                        " IS NULL" => Ok(Term::IsNull(position)),
                        " = ?" => Ok(Term::Eq(position, bind()?)),
                        " <=> ?" => Ok(Term::NullSafeEq(position, bind()?)),
                        _ => Err(malformed(s)),
                    }
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect()
}

struct Select {
    columns: Vec<String>,
    table: String,
    filter: Option<String>,
    order: Option<Vec<String>>,
    limit: usize,
}

fn parse_select(sql: &str) -> Result<Select, DbError> {
    let rest = expect_prefix(sql, "SELECT /* tablemover */ ")?;
    let (column_list, rest) = rest.split_once(" FROM ").ok_or_else(|| malformed(sql))?;
    let columns = parse_ident_list(&format!("({column_list})"))?;
    let (table, rest) = parse_ident(rest)?;
    let (rest, limit) = rest.rsplit_once(" LIMIT ").ok_or_else(|| malformed(sql))?;
    let limit = limit.parse().map_err(|_| malformed(sql))?;
    let (rest, order) = match rest.rsplit_once(" ORDER BY ") {
        Some((r, o)) => (r, Some(parse_ident_list(&format!("({o})"))?)),
        None => (rest, None),
    };
    let filter = rest.strip_prefix(" WHERE ").map(str::to_string);

    Ok(Select {
        columns,
        table,
        filter,
        order,
        limit,
    })
}

/// Reads a leading backtick-quoted identifier.
fn parse_ident(s: &str) -> Result<(String, &str), DbError> {
    let body = s.strip_prefix('`').ok_or_else(|| malformed(s))?;
    let mut name = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '`' {
            if chars.peek().is_some_and(|(_, n)| *n == '`') {
                chars.next();
                name.push('`');
                continue;
            }
            return Ok((name, &body[i + 1..]));
        }
        name.push(c);
    }
    Err(malformed(s))
}

/// Reads `(`a`, `b`)`.
fn parse_ident_list(s: &str) -> Result<Vec<String>, DbError> {
    let mut rest = s.trim().strip_prefix('(').ok_or_else(|| malformed(s))?;
    let mut names = Vec::new();
    loop {
        let (name, tail) = parse_ident(rest.trim_start())?;
        names.push(name);
        if let Some(tail) = tail.strip_prefix(',') {
            rest = tail;
        } else if tail.starts_with(')') {
            return Ok(names);
        } else {
            return Err(malformed(s));
        }
    }
}

fn key_positions(table: &MemoryTable, columns: &[String]) -> Result<Vec<usize>, DbError> {
    columns
        .iter()
        .map(|c| {
            table
                .position(c)
                .ok_or_else(|| DbError::Unknown(format!("Unknown column '{c}'")))
        })
        .collect()
}

fn compare_rows(a: &Row, b: &Row, positions: &[usize]) -> Ordering {
    positions
        .iter()
        .map(|p| compare_values(a.get(*p), b.get(*p)))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// NULLs first, numbers numerically, everything else by text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let null = |v: Option<&Value>| v.is_none_or(Value::is_null);
    match (null(a), null(b)) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    let (Some(a), Some(b)) = (a, b) else {
        return Ordering::Equal;
    };
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn table<'s>(state: &'s State, name: &str) -> Result<&'s MemoryTable, DbError> {
    state
        .tables
        .get(name)
        .ok_or_else(|| DbError::Unknown(format!("Table '{name}' doesn't exist")))
}

fn filter(state: &State, sql: Option<&str>) -> Result<Option<RowFilter>, DbError> {
    match sql {
        None => Ok(None),
        Some(sql) => state
            .filters
            .get(sql)
            .cloned()
            .map(Some)
            .ok_or_else(|| DbError::Unknown(format!("unsupported filter: {sql}"))),
    }
}

fn expect_prefix<'a>(s: &'a str, prefix: &str) -> Result<&'a str, DbError> {
    s.strip_prefix(prefix).ok_or_else(|| malformed(s))
}

fn malformed(sql: &str) -> DbError {
    DbError::Unknown(format!("You have an error in your SQL syntax near '{sql}'"))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
