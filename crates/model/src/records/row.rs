use crate::core::value::Value;
use serde::{Deserialize, Serialize};

/// One fetched row, values ordered like the job's `ColumnSet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Row(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Value> {
        self.0.get(position)
    }

    /// Values at `positions`, in the order given. Missing positions yield `NULL`.
    pub fn project(&self, positions: &[usize]) -> Vec<Value> {
        positions
            .iter()
            .map(|&p| self.0.get(p).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row(values)
    }
}
