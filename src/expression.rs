//! Expression building for conditions and updates.
//!
//! Both builders share one placeholder scheme: `#a<N>` name placeholders are
//! assigned once per distinct attribute name within a builder, `:v<N>` value
//! placeholders are assigned monotonically per value. A builder lives for
//! exactly one expression-building pass; the key condition and filter
//! expression of a single request are produced by the same builder so their
//! placeholder maps merge without collision.

/// Condition expression building.
pub mod condition;

/// Update expression building.
pub mod update;

use crate::error::Error;

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use std::{collections, ops};

const NAME_PREFIX: &str = "#a";
const VALUE_PREFIX: &str = ":v";

/// Comparator usable in conditions and size checks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Comparator {
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

impl ops::Deref for Comparator {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
        }
    }
}

/// Accumulator of `#a<N>` name and `:v<N>` value placeholders.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Placeholders {
    names: IndexMap<String, String>,
    values: IndexMap<String, types::AttributeValue>,
}

impl Placeholders {
    /// The name placeholder of an attribute, assigned on first use.
    pub(crate) fn name(&mut self, attribute: &str) -> String {
        let existing = self
            .names
            .iter()
            .find_map(|(placeholder, name)| (name == attribute).then_some(placeholder.clone()));
        if let Some(placeholder) = existing {
            return placeholder;
        }
        let placeholder = format!("{NAME_PREFIX}{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    /// A fresh value placeholder holding the given value.
    pub(crate) fn value(&mut self, value: types::AttributeValue) -> String {
        let placeholder = format!("{VALUE_PREFIX}{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    pub(crate) fn finish(
        self,
    ) -> (
        collections::HashMap<String, String>,
        collections::HashMap<String, types::AttributeValue>,
    ) {
        (
            self.names.into_iter().collect(),
            self.values.into_iter().collect(),
        )
    }
}

/// Wrap scalar values as a string set or a number set.
///
/// Mixing kinds, or passing values that are neither strings nor numbers,
/// is rejected; numeric attributes are updated with increment/decrement
/// rather than set actions.
pub(crate) fn value_set(values: Vec<types::AttributeValue>) -> Result<types::AttributeValue, Error> {
    let mut strings = Vec::with_capacity(values.len());
    let mut numbers = Vec::with_capacity(values.len());
    for value in &values {
        match value {
            types::AttributeValue::S(text) => strings.push(text.clone()),
            types::AttributeValue::N(number) => numbers.push(number.clone()),
            _ => return Err(Error::MixedValueSet),
        }
    }
    match (strings.is_empty(), numbers.is_empty()) {
        (false, true) => Ok(types::AttributeValue::Ss(strings)),
        (true, false) => Ok(types::AttributeValue::Ns(numbers)),
        _ => Err(Error::MixedValueSet),
    }
}
