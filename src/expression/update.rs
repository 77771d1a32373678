use crate::error::Error;
use crate::expression;

use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::to_attribute_value;
use std::collections;

/// Update action over one attribute.
///
/// ```rust
/// use dynamodb_mapper::expression::update::UpdateAction;
///
/// let bump = UpdateAction::Increment(10);
/// let tags = UpdateAction::AddSet(vec!["new".to_string(), "feature".to_string()]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateAction<T> {
    /// Add the value to a numeric attribute.
    Increment(T),
    /// Subtract the value from a numeric attribute.
    Decrement(T),
    /// Append the values to the end of a list attribute; empty lists append
    /// nothing.
    AppendList(Vec<T>),
    /// Remove the attribute from the item.
    Remove,
    /// Add the values to a string or number set attribute; empty lists add
    /// nothing. Not valid for numeric attributes, which use
    /// `Increment`/`Decrement` instead.
    AddSet(Vec<T>),
    /// Delete the values from a string or number set attribute; empty lists
    /// delete nothing.
    DeleteSet(Vec<T>),
}

/// A built update expression with its placeholder maps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateExpression {
    /// The update expression string.
    pub expression: String,
    /// The `#a<N>` placeholder to attribute name map.
    pub expression_attribute_names: collections::HashMap<String, String>,
    /// The `:v<N>` placeholder to attribute value map.
    pub expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

/// Stateful builder accumulating SET, ADD, REMOVE, and DELETE clauses.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateBuilder {
    placeholders: expression::Placeholders,
    set: Vec<String>,
    add: Vec<String>,
    remove: Vec<String>,
    delete: Vec<String>,
}

impl UpdateBuilder {
    /// Append a plain `SET attribute = value` assignment.
    pub fn assign(&mut self, attribute: &str, value: types::AttributeValue) {
        let name = self.placeholders.name(attribute);
        let value = self.placeholders.value(value);
        self.set.push(format!("{name} = {value}"));
    }

    /// Append the clause of one update action.
    pub fn apply<T: Serialize>(
        &mut self,
        attribute: &str,
        action: UpdateAction<T>,
    ) -> Result<(), Error> {
        match action {
            UpdateAction::Increment(value) => {
                let value: types::AttributeValue = to_attribute_value(value)?;
                let name = self.placeholders.name(attribute);
                let value = self.placeholders.value(value);
                self.set.push(format!("{name} = {name} + {value}"));
            }
            UpdateAction::Decrement(value) => {
                let value: types::AttributeValue = to_attribute_value(value)?;
                let name = self.placeholders.name(attribute);
                let value = self.placeholders.value(value);
                self.set.push(format!("{name} = {name} - {value}"));
            }
            UpdateAction::AppendList(values) => {
                if !values.is_empty() {
                    let list = convert(values)?;
                    let name = self.placeholders.name(attribute);
                    let value = self.placeholders.value(types::AttributeValue::L(list));
                    self.set
                        .push(format!("{name} = list_append({name}, {value})"));
                }
            }
            UpdateAction::Remove => {
                let name = self.placeholders.name(attribute);
                self.remove.push(name);
            }
            UpdateAction::AddSet(values) => {
                if !values.is_empty() {
                    let set = expression::value_set(convert(values)?)?;
                    let name = self.placeholders.name(attribute);
                    let value = self.placeholders.value(set);
                    self.add.push(format!("{name} {value}"));
                }
            }
            UpdateAction::DeleteSet(values) => {
                if !values.is_empty() {
                    let set = expression::value_set(convert(values)?)?;
                    let name = self.placeholders.name(attribute);
                    let value = self.placeholders.value(set);
                    self.delete.push(format!("{name} {value}"));
                }
            }
        }
        Ok(())
    }

    /// Build the update expression, or `None` if no clause accumulated.
    ///
    /// Non-empty clause groups concatenate in SET, ADD, REMOVE, DELETE
    /// order, each preceded by its keyword.
    pub fn build(self) -> Option<UpdateExpression> {
        let mut clauses = Vec::new();
        if !self.set.is_empty() {
            clauses.push(format!("SET {}", self.set.join(", ")));
        }
        if !self.add.is_empty() {
            clauses.push(format!("ADD {}", self.add.join(", ")));
        }
        if !self.remove.is_empty() {
            clauses.push(format!("REMOVE {}", self.remove.join(", ")));
        }
        if !self.delete.is_empty() {
            clauses.push(format!("DELETE {}", self.delete.join(", ")));
        }
        if clauses.is_empty() {
            return None;
        }
        let (expression_attribute_names, expression_attribute_values) = self.placeholders.finish();
        Some(UpdateExpression {
            expression: clauses.join(" "),
            expression_attribute_names,
            expression_attribute_values,
        })
    }
}

fn convert<T: Serialize>(values: Vec<T>) -> Result<Vec<types::AttributeValue>, Error> {
    let mut converted = Vec::with_capacity(values.len());
    for value in values {
        converted.push(to_attribute_value(value)?);
    }
    Ok(converted)
}
