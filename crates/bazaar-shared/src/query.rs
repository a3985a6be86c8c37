//! Table query model shared by the HTTP backend (which renders it to
//! PostgREST query parameters) and the in-memory backend (which evaluates
//! it against JSON rows).

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::QueryError;
use crate::types::Table;

/// Row filter. Top-level filters of a [`Query`] are AND-ed together.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::Eq(column.to_string(), value.into())
    }

    pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    /// Evaluate against a JSON row.
    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Self::Eq(col, expected) => row.get(col).is_some_and(|v| values_equal(v, expected)),
            Self::In(col, options) => row
                .get(col)
                .is_some_and(|v| options.iter().any(|o| values_equal(v, o))),
            Self::And(parts) => parts.iter().all(|f| f.matches(row)),
            Self::Or(parts) => parts.iter().any(|f| f.matches(row)),
        }
    }

    /// Render as a top-level `(key, value)` query parameter.
    fn to_param(&self) -> Result<(String, String), QueryError> {
        match self {
            Self::Eq(col, v) => Ok((col.clone(), format!("eq.{}", scalar_text(v)))),
            Self::In(col, vs) => Ok((col.clone(), format!("in.({})", list_text(vs)))),
            Self::And(parts) => Ok(("and".to_string(), group_text(parts)?)),
            Self::Or(parts) => Ok(("or".to_string(), group_text(parts)?)),
        }
    }

    /// Render in the nested form used inside `and(...)` / `or(...)`.
    fn to_nested(&self) -> Result<String, QueryError> {
        match self {
            Self::Eq(col, v) => Ok(format!("{col}.eq.{}", scalar_text(v))),
            Self::In(col, vs) => Ok(format!("{col}.in.({})", list_text(vs))),
            Self::And(parts) => Ok(format!("and{}", group_text(parts)?)),
            Self::Or(parts) => Ok(format!("or{}", group_text(parts)?)),
        }
    }
}

fn group_text(parts: &[Filter]) -> Result<String, QueryError> {
    if parts.is_empty() {
        return Err(QueryError::EmptyGroup);
    }
    let inner = parts
        .iter()
        .map(Filter::to_nested)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("({})", inner.join(",")))
}

fn list_text(values: &[Value]) -> String {
    values.iter().map(scalar_text).collect::<Vec<_>>().join(",")
}

/// Text form of a scalar as the backend compares it.
fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// JSON equality with a textual fallback, so `7` matches `"7"` the way a
/// text comparison on the backend would.
fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || scalar_text(a) == scalar_text(b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A `select` against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: Table,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// PostgREST query parameters, in a stable order.
    pub fn to_params(&self) -> Result<Vec<(String, String)>, QueryError> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        for f in &self.filters {
            params.push(f.to_param()?);
        }
        if let Some(order) = &self.order {
            let dir = match order.direction {
                Direction::Ascending => "asc",
                Direction::Descending => "desc",
            };
            params.push(("order".to_string(), format!("{}.{dir}", order.column)));
        }
        if let Some(n) = self.limit {
            params.push(("limit".to_string(), n.to_string()));
        }
        Ok(params)
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Apply filters, ordering and limit to a set of rows. Column
    /// projection is not applied.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Value>) -> Vec<Value> {
        let mut out: Vec<Value> = rows.into_iter().filter(|r| self.matches(r)).cloned().collect();
        if let Some(order) = &self.order {
            out.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

/// Total order over optional JSON scalars: missing/null first, then
/// numbers, then text. RFC 3339 timestamps in one offset compare correctly
/// as text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            _ => 2,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(x), Some(y)) if rank(a) == 2 && rank(b) == 2 => scalar_text(x).cmp(&scalar_text(y)),
        _ => rank(a).cmp(&rank(b)),
    }
}
