use crate::{core::value::Value, records::row::Row};

/// Rows fetched in one cursor step together with the key values captured
/// from exactly those rows.
#[derive(Debug, Clone)]
pub struct Batch {
    pub seq: u64,
    pub rows: Vec<Row>,
    pub key_values: Vec<Vec<Value>>, // one entry per row, empty for keyless tables
}

impl Batch {
    pub fn new(seq: u64, rows: Vec<Row>, key_positions: &[usize]) -> Self {
        let key_values = if key_positions.is_empty() {
            Vec::new()
        } else {
            rows.iter().map(|r| r.project(key_positions)).collect()
        };
        Batch {
            seq,
            rows,
            key_values,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_key_values_per_row() {
        let rows = vec![
            Row::new(vec![Value::Int(1), "a".into(), Value::Int(10)]),
            Row::new(vec![Value::Int(2), "b".into(), Value::Int(20)]),
        ];
        let batch = Batch::new(0, rows, &[2, 0]);

        assert_eq!(batch.row_count(), 2);
        assert_eq!(
            batch.key_values,
            vec![
                vec![Value::Int(10), Value::Int(1)],
                vec![Value::Int(20), Value::Int(2)]
            ]
        );
    }

    #[test]
    fn keyless_batches_capture_nothing() {
        let batch = Batch::new(3, vec![Row::new(vec![Value::Null])], &[]);
        assert!(batch.key_values.is_empty());
        assert_eq!(batch.seq, 3);
    }
}
