//! Metadata filters for similarity search and deletion.

use serde::{Deserialize, Serialize};

/// Filter over document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataFilter {
    Comparison(ComparisonFilter),
    Compound(CompoundFilter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonFilter {
    #[serde(rename = "type")]
    pub operator: ComparisonOperator,
    pub key: String,
    pub value: FilterValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundFilter {
    #[serde(rename = "type")]
    pub operator: LogicalOperator,
    pub filters: Vec<MetadataFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ComparisonOperator {
    fn as_sql(&self) -> &'static str {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Ne => "!=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Gte => ">=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl MetadataFilter {
    fn comparison(
        operator: ComparisonOperator,
        key: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self::Comparison(ComparisonFilter {
            operator,
            key: key.into(),
            value: value.into(),
        })
    }

    pub fn eq(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::comparison(ComparisonOperator::Eq, key, value)
    }

    pub fn ne(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::comparison(ComparisonOperator::Ne, key, value)
    }

    pub fn gt(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::comparison(ComparisonOperator::Gt, key, value)
    }

    pub fn gte(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::comparison(ComparisonOperator::Gte, key, value)
    }

    pub fn lt(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::comparison(ComparisonOperator::Lt, key, value)
    }

    pub fn lte(key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::comparison(ComparisonOperator::Lte, key, value)
    }

    pub fn and(filters: Vec<MetadataFilter>) -> Self {
        Self::Compound(CompoundFilter {
            operator: LogicalOperator::And,
            filters,
        })
    }

    pub fn or(filters: Vec<MetadataFilter>) -> Self {
        Self::Compound(CompoundFilter {
            operator: LogicalOperator::Or,
            filters,
        })
    }

    /// True when the filter places no constraint on metadata, e.g. an
    /// empty `and`.
    pub fn matches_all(&self) -> bool {
        match self {
            Self::Comparison(_) => false,
            Self::Compound(compound) => match compound.operator {
                LogicalOperator::And => compound.filters.iter().all(Self::matches_all),
                LogicalOperator::Or => compound.filters.iter().any(Self::matches_all),
            },
        }
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// A bind value for parameterized SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlBindValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// A SQL WHERE fragment over the JSONB `metadata` column.
#[derive(Debug)]
pub struct FilterSql {
    pub clause: String,
    /// Values for `$start_param_idx..`, in order.
    pub bind_values: Vec<SqlBindValue>,
}

/// Build a parameterized WHERE fragment for a metadata filter.
///
/// Keys and values are both bound; nothing from the filter is interpolated
/// into the SQL text.
pub fn build_filter_sql(filter: &MetadataFilter, start_param_idx: usize) -> FilterSql {
    let mut bind_values = Vec::new();
    let clause = build_clause(filter, start_param_idx, &mut bind_values);
    FilterSql {
        clause,
        bind_values,
    }
}

fn build_clause(
    filter: &MetadataFilter,
    start_param_idx: usize,
    bind_values: &mut Vec<SqlBindValue>,
) -> String {
    match filter {
        MetadataFilter::Comparison(comp) => {
            let key_idx = start_param_idx + bind_values.len();
            let value_idx = key_idx + 1;
            let op = comp.operator.as_sql();
            bind_values.push(SqlBindValue::String(comp.key.clone()));

            match &comp.value {
                FilterValue::String(s) => {
                    bind_values.push(SqlBindValue::String(s.clone()));
                    format!("(metadata->>${key_idx} {op} ${value_idx})")
                }
                FilterValue::Number(n) => {
                    bind_values.push(SqlBindValue::Number(*n));
                    format!("((metadata->>${key_idx})::double precision {op} ${value_idx})")
                }
                FilterValue::Boolean(b) => {
                    bind_values.push(SqlBindValue::Boolean(*b));
                    format!("((metadata->>${key_idx})::boolean {op} ${value_idx})")
                }
            }
        }
        MetadataFilter::Compound(compound) => {
            if compound.filters.is_empty() {
                return match compound.operator {
                    LogicalOperator::And => "TRUE".to_string(),
                    LogicalOperator::Or => "FALSE".to_string(),
                };
            }
            let joiner = match compound.operator {
                LogicalOperator::And => " AND ",
                LogicalOperator::Or => " OR ",
            };
            let clauses: Vec<String> = compound
                .filters
                .iter()
                .map(|f| build_clause(f, start_param_idx, bind_values))
                .collect();
            format!("({})", clauses.join(joiner))
        }
    }
}
