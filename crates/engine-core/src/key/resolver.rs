use crate::error::EngineError;
use connectors::sql::base::{adapter::SqlAdapter, metadata::index::IndexInfo};
use model::core::key::{ColumnSet, KeyDescriptor, KeyKind};
use tracing::{info, warn};

const PRIMARY: &str = "PRIMARY";

/// The key chosen for a job and the planner's row estimate for its filter.
#[derive(Debug, Clone)]
pub struct KeyResolution {
    pub key: KeyDescriptor,
    /// Optimizer estimate; only used for progress output.
    pub estimated_rows: i64,
}

/// Picks the index used to order the fetch and address rows for deletion.
///
/// Runs once per job, before the first batch.
pub struct KeyResolver<'a> {
    adapter: &'a dyn SqlAdapter,
    table: &'a str,
}

impl<'a> KeyResolver<'a> {
    pub fn new(adapter: &'a dyn SqlAdapter, table: &'a str) -> Self {
        KeyResolver { adapter, table }
    }

    pub async fn resolve(
        &self,
        columns: &ColumnSet,
        filter: Option<&str>,
    ) -> Result<KeyResolution, EngineError> {
        if columns.is_empty() {
            return Err(EngineError::NoColumns(self.table.to_string()));
        }

        let estimate = self.adapter.explain(self.table, filter).await?;
        let catalog = self.adapter.index_catalog(self.table).await?;
        let key = choose_key(&catalog, estimate.key.as_deref(), columns)?;

        match key.kind() {
            KeyKind::None => warn!(
                table = self.table,
                "No usable index found; rows will be deleted by full column match"
            ),
            kind => info!(
                table = self.table,
                key = key.name(),
                kind = %kind,
                columns = ?key.columns(),
                estimated_rows = estimate.rows,
                "Resolved archive key"
            ),
        }

        Ok(KeyResolution {
            key,
            estimated_rows: estimate.rows,
        })
    }
}

/// Applies the key precedence to a table's index catalog:
///
/// 1. a unique index whose columns are all `NOT NULL` (`PRIMARY` first, then
///    the highest cardinality one, then any);
/// 2. the index the planner picked for the filter;
/// 3. the highest cardinality index of any kind;
/// 4. no key.
///
/// Indexes over columns outside `columns` (generated columns, for instance)
/// are never chosen. Equal cardinalities keep catalog order.
pub fn choose_key(
    catalog: &[IndexInfo],
    planner_key: Option<&str>,
    columns: &ColumnSet,
) -> Result<KeyDescriptor, EngineError> {
    let candidates: Vec<(&IndexInfo, Vec<usize>)> = catalog
        .iter()
        .filter_map(|idx| positions_of(idx, columns).map(|pos| (idx, pos)))
        .collect();

    let non_null_unique: Vec<_> = candidates
        .iter()
        .filter(|(idx, _)| idx.is_non_null_unique())
        .collect();
    let unique = non_null_unique
        .iter()
        .find(|(idx, _)| idx.name == PRIMARY)
        .copied()
        .or_else(|| highest_cardinality(non_null_unique.iter().copied()));
    if let Some((idx, positions)) = unique {
        return descriptor(idx, KeyKind::Unique, positions);
    }

    let planned = planner_key.and_then(|name| candidates.iter().find(|(idx, _)| idx.name == name));
    if let Some((idx, positions)) = planned.or_else(|| highest_cardinality(candidates.iter())) {
        return descriptor(idx, KeyKind::Secondary, positions);
    }

    Ok(KeyDescriptor::none())
}

fn positions_of(index: &IndexInfo, columns: &ColumnSet) -> Option<Vec<usize>> {
    if index.columns.is_empty() {
        return None;
    }
    index
        .columns
        .iter()
        .map(|c| columns.position(&c.name))
        .collect()
}

/// First index with the strictly highest known cardinality, falling back to
/// the first index when none has statistics.
fn highest_cardinality<'c, I>(mut indexes: I) -> Option<&'c (&'c IndexInfo, Vec<usize>)>
where
    I: Iterator<Item = &'c (&'c IndexInfo, Vec<usize>)>,
{
    let first = indexes.next()?;
    let mut best = first;
    for candidate in indexes {
        if candidate.0.cardinality > best.0.cardinality {
            best = candidate;
        }
    }
    Some(best)
}

fn descriptor(
    index: &IndexInfo,
    kind: KeyKind,
    positions: &[usize],
) -> Result<KeyDescriptor, EngineError> {
    Ok(KeyDescriptor::indexed(
        index.name.clone(),
        kind,
        index.column_names(),
        positions.to_vec(),
    )?)
}
