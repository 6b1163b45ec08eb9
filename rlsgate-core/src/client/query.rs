//! Chainable query builder the policy gate appends its constraint to

/// Minimal builder surface: an equality filter
pub trait QueryFilter: Sized {
    fn eq(self, column: &str, value: &str) -> Self;
}

/// PostgREST-style read of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestQuery {
    table: String,
    select: String,
    filters: Vec<(String, String)>,
    limit: Option<u32>,
}

impl RestQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: "*".to_string(),
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = columns.into();
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Filters in insertion order as `(column, "eq.value")`
    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    pub fn has_filter(&self, column: &str) -> bool {
        self.filters.iter().any(|(c, _)| c == column)
    }

    /// Query string pairs for `GET /rest/v1/<table>`
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.select.clone())];
        pairs.extend(self.filters.iter().cloned());
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

impl QueryFilter for RestQuery {
    fn eq(mut self, column: &str, value: &str) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value)));
        self
    }
}
