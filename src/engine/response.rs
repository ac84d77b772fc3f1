// ABOUTME: SQL statements produced by actions
// ABOUTME: Ordered, unterminated statements awaiting output or execution

/// Statements produced by one action, in emission order, without terminators
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlResponse {
    action_queries: Vec<String>,
}

impl SqlResponse {
    pub fn new(action_queries: Vec<String>) -> Self {
        Self { action_queries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(query: impl Into<String>) -> Self {
        Self {
            action_queries: vec![query.into()],
        }
    }

    pub fn has_action_queries(&self) -> bool {
        !self.action_queries.is_empty()
    }

    pub fn action_queries(&self) -> &[String] {
        &self.action_queries
    }

    pub fn into_action_queries(self) -> Vec<String> {
        self.action_queries
    }
}
