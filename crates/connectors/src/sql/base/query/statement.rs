use model::core::value::Value;

/// A rendered SQL text and its positional (`?`) parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Statement {
            sql: sql.into(),
            params,
        }
    }

    /// A statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Statement::new(sql, Vec::new())
    }

    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}
