use crate::expression;
use crate::expression::{condition, update};

use indexmap::IndexMap;

/// Value of one query or scan specification entry.
///
/// Plain values feed key templates and become equality filters; conditions
/// become filter fragments and stop partial key substitution.
#[derive(Clone, Debug, PartialEq)]
pub enum SpecValue<T> {
    /// A plain value.
    Value(T),
    /// A condition applied as a filter.
    Condition(condition::Condition<T>),
}

/// Query or scan specification: property name to value or condition.
///
/// ```rust
/// use dynamodb_mapper::expression::condition::Condition;
/// use dynamodb_mapper::repository::spec;
/// use indexmap::IndexMap;
/// use serde_json::Value;
///
/// let specification: spec::QuerySpec<Value> = IndexMap::from([
///     (
///         "name".to_string(),
///         spec::SpecValue::Value(Value::String("PROJECT_A".to_string())),
///     ),
///     (
///         "date".to_string(),
///         spec::SpecValue::Condition(Condition::Between(
///             Value::Number(1662541000.into()),
///             Value::Number(1662541200.into()),
///         )),
///     ),
/// ]);
/// ```
pub type QuerySpec<T> = IndexMap<String, SpecValue<T>>;

/// Value of one update specification entry.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateValue<T> {
    /// A plain value, assigned with `SET`.
    Value(T),
    /// An update action.
    Action(update::UpdateAction<T>),
}

/// Update specification: property name to value or action.
pub type UpdateSpec<T> = IndexMap<String, UpdateValue<T>>;

/// Comparator applied to the sort key condition of a query.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortKeyOperator {
    /// The sort key begins with the substituted prefix (the default).
    #[default]
    BeginsWith,
    /// The sort key equals the substituted value.
    Equals,
    /// The sort key is less than the substituted value.
    LessThan,
    /// The sort key is less than or equal to the substituted value.
    LessThanOrEqual,
    /// The sort key is greater than the substituted value.
    GreaterThan,
    /// The sort key is greater than or equal to the substituted value.
    GreaterThanOrEqual,
}

impl SortKeyOperator {
    pub(crate) fn comparator(self) -> Option<expression::Comparator> {
        match self {
            Self::BeginsWith => None,
            Self::Equals => Some(expression::Comparator::Equal),
            Self::LessThan => Some(expression::Comparator::LessThan),
            Self::LessThanOrEqual => Some(expression::Comparator::LessThanOrEqual),
            Self::GreaterThan => Some(expression::Comparator::GreaterThan),
            Self::GreaterThanOrEqual => Some(expression::Comparator::GreaterThanOrEqual),
        }
    }
}

/// Query configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryConfig {
    /// Name of the index to query instead of the table.
    pub index: Option<String>,
    /// Comparator applied to the sort key condition.
    pub sort_key_operator: SortKeyOperator,
}

/// Scan configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanConfig {
    /// Name of the index to scan instead of the table.
    pub index: Option<String>,
}
