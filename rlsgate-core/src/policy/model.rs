//! Policy conditions and their SQL rendering

use crate::domain::OrganizationId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyOperation {
    Select,
    Insert,
    Update,
    Delete,
}

impl PolicyOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyOperation::Select => "select",
            PolicyOperation::Insert => "insert",
            PolicyOperation::Update => "update",
            PolicyOperation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for PolicyOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolicyOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "select" => Ok(PolicyOperation::Select),
            "insert" => Ok(PolicyOperation::Insert),
            "update" => Ok(PolicyOperation::Update),
            "delete" => Ok(PolicyOperation::Delete),
            other => Err(format!("unknown operation: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOperator {
    Eq,
    Neq,
    In,
    NotIn,
    Is,
    IsNot,
}

impl PolicyOperator {
    pub fn sql(&self) -> &'static str {
        match self {
            PolicyOperator::Eq => "=",
            PolicyOperator::Neq => "!=",
            PolicyOperator::In => "IN",
            PolicyOperator::NotIn => "NOT IN",
            PolicyOperator::Is => "IS",
            PolicyOperator::IsNot => "IS NOT",
        }
    }

    fn is_list(&self) -> bool {
        matches!(self, PolicyOperator::In | PolicyOperator::NotIn)
    }
}

impl std::str::FromStr for PolicyOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(PolicyOperator::Eq),
            "neq" => Ok(PolicyOperator::Neq),
            "in" => Ok(PolicyOperator::In),
            "not_in" => Ok(PolicyOperator::NotIn),
            "is" => Ok(PolicyOperator::Is),
            "is_not" => Ok(PolicyOperator::IsNot),
            other => Err(format!("unknown operator: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PolicyValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
    List(Vec<String>),
}

impl PolicyValue {
    /// Interpret a command-line literal. List operators split on commas.
    pub fn parse(raw: &str, operator: PolicyOperator) -> Self {
        if operator.is_list() {
            return PolicyValue::List(raw.split(',').map(|v| v.trim().to_string()).collect());
        }

        match raw.trim() {
            s if s.eq_ignore_ascii_case("null") => PolicyValue::Null,
            s if s.eq_ignore_ascii_case("true") => PolicyValue::Bool(true),
            s if s.eq_ignore_ascii_case("false") => PolicyValue::Bool(false),
            s => match s.parse::<serde_json::Number>() {
                Ok(n) => PolicyValue::Number(n),
                Err(_) => PolicyValue::Text(s.to_string()),
            },
        }
    }

    fn render(&self) -> String {
        match self {
            PolicyValue::Text(s) => quote(s),
            PolicyValue::Number(n) => n.to_string(),
            PolicyValue::Bool(true) => "TRUE".to_string(),
            PolicyValue::Bool(false) => "FALSE".to_string(),
            PolicyValue::Null => "NULL".to_string(),
            PolicyValue::List(items) => items.iter().map(|i| quote(i)).collect::<Vec<_>>().join(","),
        }
    }
}

impl From<&str> for PolicyValue {
    fn from(s: &str) -> Self {
        PolicyValue::Text(s.to_string())
    }
}

impl From<String> for PolicyValue {
    fn from(s: String) -> Self {
        PolicyValue::Text(s)
    }
}

impl From<bool> for PolicyValue {
    fn from(b: bool) -> Self {
        PolicyValue::Bool(b)
    }
}

impl From<i64> for PolicyValue {
    fn from(n: i64) -> Self {
        PolicyValue::Number(n.into())
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyCondition {
    pub column: String,
    pub operator: PolicyOperator,
    pub value: PolicyValue,
}

impl PolicyCondition {
    pub fn new(column: impl Into<String>, operator: PolicyOperator, value: impl Into<PolicyValue>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Parse `column:operator:value`
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut parts = spec.splitn(3, ':');
        let (Some(column), Some(operator), Some(value)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("expected column:operator:value, got '{}'", spec));
        };
        if column.trim().is_empty() {
            return Err(format!("missing column in '{}'", spec));
        }

        let operator: PolicyOperator = operator.parse()?;
        Ok(Self {
            column: column.trim().to_string(),
            operator,
            value: PolicyValue::parse(value, operator),
        })
    }

    fn render(&self) -> String {
        let value = self.value.render();
        if self.operator.is_list() {
            format!("{} {} ({})", self.column, self.operator.sql(), value)
        } else {
            format!("{} {} {}", self.column, self.operator.sql(), value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RlsPolicy {
    pub table: String,
    pub operation: PolicyOperation,
    pub conditions: Vec<PolicyCondition>,
    name: Option<String>,
}

impl RlsPolicy {
    pub fn new(table: impl Into<String>, operation: PolicyOperation, conditions: Vec<PolicyCondition>) -> Self {
        Self {
            table: table.into(),
            operation,
            conditions,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `<table>_<operation>_policy` unless overridden
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}_{}_policy", self.table, self.operation))
    }
}

/// Organization equality first, then `extra` in order
pub fn build_policy(
    table: &str,
    operation: PolicyOperation,
    organization_id: OrganizationId,
    extra: Vec<PolicyCondition>,
) -> RlsPolicy {
    let mut conditions = vec![PolicyCondition::new(
        "organization_id",
        PolicyOperator::Eq,
        organization_id.to_string(),
    )];
    conditions.extend(extra);
    RlsPolicy::new(table, operation, conditions)
}

/// Deterministic `CREATE POLICY` statement for migration tooling
pub fn render_policy_sql(policy: &RlsPolicy) -> String {
    let conditions = policy
        .conditions
        .iter()
        .map(PolicyCondition::render)
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(
        "CREATE POLICY \"{}\" ON \"{}\"\n    FOR {} TO authenticated\n    USING ({});",
        policy.name(),
        policy.table,
        policy.operation.as_str().to_ascii_uppercase(),
        conditions
    )
}
