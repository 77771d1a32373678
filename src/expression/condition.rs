use crate::error::Error;
use crate::expression;

use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::to_attribute_value;
use std::collections;

/// Stored representation kind checked by [`Condition::HasType`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttributeValueKind {
    /// A string.
    String,
    /// A string set.
    StringSet,
    /// A number.
    Number,
    /// A number set.
    NumberSet,
    /// A binary value.
    Binary,
    /// A binary set.
    BinarySet,
    /// A boolean.
    Boolean,
    /// The null marker.
    Null,
    /// A list.
    List,
    /// A map.
    Map,
}

impl AttributeValueKind {
    fn code(self) -> &'static str {
        match self {
            Self::String => "S",
            Self::StringSet => "SS",
            Self::Number => "N",
            Self::NumberSet => "NS",
            Self::Binary => "B",
            Self::BinarySet => "BS",
            Self::Boolean => "BOOL",
            Self::Null => "NULL",
            Self::List => "L",
            Self::Map => "M",
        }
    }
}

/// Composable condition over one attribute.
///
/// ```rust
/// use dynamodb_mapper::expression::condition::Condition;
///
/// let range = Condition::Between(1662541000, 1662541200);
/// let either = Condition::Or(vec![
///     Condition::Equals("Initial".to_string()),
///     Condition::Equals("Final".to_string()),
/// ]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition<T> {
    /// The attribute equals the value.
    Equals(T),
    /// The attribute does not equal the value.
    NotEqual(T),
    /// The attribute is less than the value.
    LessThan(T),
    /// The attribute is less than or equal to the value.
    LessThanOrEqual(T),
    /// The attribute is greater than the value.
    GreaterThan(T),
    /// The attribute is greater than or equal to the value.
    GreaterThanOrEqual(T),
    /// The attribute is between the two values, inclusive.
    Between(T, T),
    /// The attribute equals one of the values; empty lists match nothing
    /// and produce no fragment.
    In(Vec<T>),
    /// The attribute is present on the item.
    Exists,
    /// The attribute is absent from the item.
    NotExists,
    /// The attribute's stored representation has the given kind.
    HasType(AttributeValueKind),
    /// The attribute begins with the prefix (strings only).
    BeginsWith(String),
    /// The attribute contains the value.
    Contains(T),
    /// The attribute's size compares against the value.
    Size(expression::Comparator, u64),
    /// Every sub-condition holds; empty lists produce no fragment.
    And(Vec<Condition<T>>),
    /// At least one sub-condition holds; empty lists produce no fragment.
    Or(Vec<Condition<T>>),
    /// The sub-condition does not hold.
    Not(Box<Condition<T>>),
}

/// Stateful builder producing one boolean condition expression.
///
/// A single builder produces the key condition expression of a query and
/// then continues into its filter expression, keeping the placeholder
/// sequence contiguous so the two maps merge without collision.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionBuilder {
    placeholders: expression::Placeholders,
    fragments: Vec<String>,
}

impl ConditionBuilder {
    /// Append the fragment of one condition over one attribute.
    ///
    /// Empty `And`/`Or`/`In` conditions append nothing.
    pub fn push<T: Serialize>(
        &mut self,
        attribute: &str,
        condition: Condition<T>,
    ) -> Result<(), Error> {
        if let Some(fragment) = self.evaluate(attribute, condition)? {
            self.fragments.push(fragment);
        }
        Ok(())
    }

    pub(crate) fn push_comparison(
        &mut self,
        attribute: &str,
        comparator: expression::Comparator,
        value: types::AttributeValue,
    ) {
        let fragment = self.comparison(attribute, comparator, value);
        self.fragments.push(fragment);
    }

    pub(crate) fn push_begins_with(&mut self, attribute: &str, value: types::AttributeValue) {
        let name = self.placeholders.name(attribute);
        let value = self.placeholders.value(value);
        self.fragments.push(format!("begins_with({name}, {value})"));
    }

    pub(crate) fn push_contains(&mut self, attribute: &str, value: types::AttributeValue) {
        let name = self.placeholders.name(attribute);
        let value = self.placeholders.value(value);
        self.fragments.push(format!("contains({name}, {value})"));
    }

    fn comparison(
        &mut self,
        attribute: &str,
        comparator: expression::Comparator,
        value: types::AttributeValue,
    ) -> String {
        let name = self.placeholders.name(attribute);
        let value = self.placeholders.value(value);
        let operator: &str = &comparator;
        format!("{name} {operator} {value}")
    }

    fn evaluate<T: Serialize>(
        &mut self,
        attribute: &str,
        condition: Condition<T>,
    ) -> Result<Option<String>, Error> {
        let fragment = match condition {
            Condition::Equals(value) => Some(self.comparison(
                attribute,
                expression::Comparator::Equal,
                to_attribute_value(value)?,
            )),
            Condition::NotEqual(value) => Some(self.comparison(
                attribute,
                expression::Comparator::NotEqual,
                to_attribute_value(value)?,
            )),
            Condition::LessThan(value) => Some(self.comparison(
                attribute,
                expression::Comparator::LessThan,
                to_attribute_value(value)?,
            )),
            Condition::LessThanOrEqual(value) => Some(self.comparison(
                attribute,
                expression::Comparator::LessThanOrEqual,
                to_attribute_value(value)?,
            )),
            Condition::GreaterThan(value) => Some(self.comparison(
                attribute,
                expression::Comparator::GreaterThan,
                to_attribute_value(value)?,
            )),
            Condition::GreaterThanOrEqual(value) => Some(self.comparison(
                attribute,
                expression::Comparator::GreaterThanOrEqual,
                to_attribute_value(value)?,
            )),
            Condition::Between(from, to) => {
                let name = self.placeholders.name(attribute);
                let from = self.placeholders.value(to_attribute_value(from)?);
                let to = self.placeholders.value(to_attribute_value(to)?);
                Some(format!("{name} BETWEEN {from} AND {to}"))
            }
            Condition::In(values) => {
                if values.is_empty() {
                    None
                } else {
                    let name = self.placeholders.name(attribute);
                    let mut placeholders = Vec::with_capacity(values.len());
                    for value in values {
                        placeholders.push(self.placeholders.value(to_attribute_value(value)?));
                    }
                    Some(format!("{name} IN ({})", placeholders.join(", ")))
                }
            }
            Condition::Exists => {
                let name = self.placeholders.name(attribute);
                Some(format!("attribute_exists({name})"))
            }
            Condition::NotExists => {
                let name = self.placeholders.name(attribute);
                Some(format!("attribute_not_exists({name})"))
            }
            Condition::HasType(kind) => {
                let name = self.placeholders.name(attribute);
                let value = self
                    .placeholders
                    .value(types::AttributeValue::S(kind.code().to_string()));
                Some(format!("attribute_type({name}, {value})"))
            }
            Condition::BeginsWith(prefix) => {
                let name = self.placeholders.name(attribute);
                let value = self.placeholders.value(types::AttributeValue::S(prefix));
                Some(format!("begins_with({name}, {value})"))
            }
            Condition::Contains(value) => {
                let name = self.placeholders.name(attribute);
                let value = self.placeholders.value(to_attribute_value(value)?);
                Some(format!("contains({name}, {value})"))
            }
            Condition::Size(comparator, size) => {
                let name = self.placeholders.name(attribute);
                let value = self
                    .placeholders
                    .value(types::AttributeValue::N(size.to_string()));
                let operator: &str = &comparator;
                Some(format!("size({name}) {operator} {value}"))
            }
            Condition::And(conditions) => self.combine(attribute, conditions, " AND ")?,
            Condition::Or(conditions) => self.combine(attribute, conditions, " OR ")?,
            Condition::Not(condition) => self
                .evaluate(attribute, *condition)?
                .map(|fragment| format!("NOT ({fragment})")),
        };
        Ok(fragment)
    }

    fn combine<T: Serialize>(
        &mut self,
        attribute: &str,
        conditions: Vec<Condition<T>>,
        operator: &str,
    ) -> Result<Option<String>, Error> {
        let mut fragments = Vec::with_capacity(conditions.len());
        for condition in conditions {
            if let Some(fragment) = self.evaluate(attribute, condition)? {
                fragments.push(fragment);
            }
        }
        if fragments.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("({})", fragments.join(operator))))
        }
    }

    /// Join and drain the accumulated fragments with ` AND `.
    ///
    /// Returns `None` when no fragment accumulated since the last call, so
    /// the same builder can emit a key condition expression and then an
    /// optional filter expression.
    pub fn take_expression(&mut self) -> Option<String> {
        if self.fragments.is_empty() {
            None
        } else {
            let fragments: Vec<String> = self.fragments.drain(..).collect();
            Some(fragments.join(" AND "))
        }
    }

    /// The accumulated placeholder maps.
    pub fn finish(
        self,
    ) -> (
        collections::HashMap<String, String>,
        collections::HashMap<String, types::AttributeValue>,
    ) {
        self.placeholders.finish()
    }
}
