/// One BTREE index of a table as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    /// Columns in index sequence order.
    pub columns: Vec<IndexColumn>,
    /// Highest cardinality reported for any column of the index, if the
    /// server has statistics for it.
    pub cardinality: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    pub name: String,
    pub nullable: bool,
}

impl IndexInfo {
    /// Unique and every column declared `NOT NULL`.
    pub fn is_non_null_unique(&self) -> bool {
        self.unique && !self.columns.is_empty() && self.columns.iter().all(|c| !c.nullable)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// The part of an `EXPLAIN` plan that concerns the source table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlannerEstimate {
    /// Index the optimizer would use, if any.
    pub key: Option<String>,
    /// Optimizer row estimate; display only.
    pub rows: i64,
}

/// Raw catalog rows (one per index column) grouped into indexes.
///
/// Indexes keep the order in which the catalog first reported them; columns
/// are sorted by their sequence number within the index.
pub fn group_index_rows<I>(rows: I) -> Vec<IndexInfo>
where
    I: IntoIterator<Item = IndexRow>,
{
    let mut indexes: Vec<(IndexInfo, Vec<(u32, IndexColumn)>)> = Vec::new();

    for row in rows {
        let slot = match indexes.iter().position(|(idx, _)| idx.name == row.index_name) {
            Some(pos) => pos,
            None => {
                indexes.push((
                    IndexInfo {
                        name: row.index_name.clone(),
                        unique: true,
                        columns: Vec::new(),
                        cardinality: None,
                    },
                    Vec::new(),
                ));
                indexes.len() - 1
            }
        };

        let (info, columns) = &mut indexes[slot];
        info.unique &= !row.non_unique;
        info.cardinality = match (info.cardinality, row.cardinality) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        columns.push((
            row.seq_in_index,
            IndexColumn {
                name: row.column_name,
                nullable: row.nullable,
            },
        ));
    }

    indexes
        .into_iter()
        .map(|(mut info, mut columns)| {
            columns.sort_by_key(|(seq, _)| *seq);
            info.columns = columns.into_iter().map(|(_, c)| c).collect();
            info
        })
        .collect()
}

/// A single row of the index catalog query.
#[derive(Debug, Clone)]
pub struct IndexRow {
    pub index_name: String,
    pub non_unique: bool,
    pub seq_in_index: u32,
    pub column_name: String,
    pub nullable: bool,
    pub cardinality: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: &str, non_unique: bool, seq: u32, col: &str, card: Option<u64>) -> IndexRow {
        IndexRow {
            index_name: index.into(),
            non_unique,
            seq_in_index: seq,
            column_name: col.into(),
            nullable: false,
            cardinality: card,
        }
    }

    #[test]
    fn groups_rows_in_catalog_order() {
        let grouped = group_index_rows(vec![
            row("idx_b", true, 2, "b2", Some(5)),
            row("PRIMARY", false, 1, "id", Some(100)),
            row("idx_b", true, 1, "b1", Some(9)),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].name, "idx_b");
        assert_eq!(grouped[0].column_names(), vec!["b1", "b2"]);
        assert_eq!(grouped[0].cardinality, Some(9));
        assert!(!grouped[0].unique);
        assert!(grouped[1].is_non_null_unique());
    }

    #[test]
    fn nullable_unique_index_is_not_non_null_unique() {
        let mut r = row("uk", false, 1, "email", None);
        r.nullable = true;
        let grouped = group_index_rows(vec![r]);
        assert!(grouped[0].unique);
        assert!(!grouped[0].is_non_null_unique());
    }
}
