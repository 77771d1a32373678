use crate::error::Error;
use crate::expression;
use crate::expression::{condition, update};
use crate::repository::spec;
use crate::schema::{key, metadata, template};

use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::to_attribute_value;
use std::collections;

/// Resolved specification entry: plain values are converted up front so they
/// can feed key templates and equality filters alike.
enum Entry<T> {
    Value(types::AttributeValue),
    Condition(condition::Condition<T>),
}

/// Resolved update specification entry.
pub(crate) enum UpdateEntry<T> {
    Value(types::AttributeValue),
    Action(update::UpdateAction<T>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct QueryInput {
    pub(crate) key_condition_expression: String,
    pub(crate) filter_expression: Option<String>,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl QueryInput {
    pub(crate) fn new<T: Serialize>(
        metadata: &metadata::Metadata,
        partition_key: &key::KeyDef,
        sort_key: Option<&key::KeyDef>,
        specification: spec::QuerySpec<T>,
        operator: spec::SortKeyOperator,
    ) -> Result<Self, Error> {
        let (entries, props) = resolve_spec(specification)?;
        let mut builder = condition::ConditionBuilder::default();
        let value = partition_key.template().substitute(&props)?;
        builder.push_comparison(
            partition_key.name(),
            expression::Comparator::Equal,
            partition_key.scalar_type().coerce(&value)?,
        );
        if let Some(sort_key) = sort_key {
            if let Some(prefix) = sort_key.template().partial_substitute(&props)? {
                push_sort_key_condition(&mut builder, sort_key, operator, &prefix)?;
            }
        }
        let key_condition_expression = builder.take_expression().unwrap_or_default();
        push_filters(&mut builder, metadata, partition_key, sort_key, entries)?;
        let filter_expression = builder.take_expression();
        let (expression_attribute_names, expression_attribute_values) = builder.finish();
        Ok(Self {
            key_condition_expression,
            filter_expression,
            expression_attribute_names,
            expression_attribute_values,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ScanInput {
    pub(crate) filter_expression: Option<String>,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl ScanInput {
    pub(crate) fn new<T: Serialize>(
        metadata: &metadata::Metadata,
        partition_key: &key::KeyDef,
        sort_key: Option<&key::KeyDef>,
        specification: spec::QuerySpec<T>,
    ) -> Result<Self, Error> {
        let (entries, props) = resolve_spec(specification)?;
        let mut builder = condition::ConditionBuilder::default();
        push_key_fragments(&mut builder, partition_key, &props)?;
        if let Some(sort_key) = sort_key {
            push_key_fragments(&mut builder, sort_key, &props)?;
        }
        push_filters(&mut builder, metadata, partition_key, sort_key, entries)?;
        let filter_expression = builder.take_expression();
        let (expression_attribute_names, expression_attribute_values) = builder.finish();
        Ok(Self {
            filter_expression,
            expression_attribute_names,
            expression_attribute_values,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct UpdateInput {
    pub(crate) update_expression: Option<String>,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl UpdateInput {
    pub(crate) fn new<T: Serialize>(
        metadata: &metadata::Metadata,
        entries: Vec<(String, UpdateEntry<T>)>,
        props: &collections::HashMap<String, types::AttributeValue>,
    ) -> Result<Self, Error> {
        let mut builder = update::UpdateBuilder::default();
        for (property, entry) in entries {
            if is_key_member(metadata.partition_key(), metadata.sort_key(), &property) {
                continue;
            }
            let store_name = metadata.store_name(&property).to_string();
            match entry {
                UpdateEntry::Value(value) => {
                    // pre-update hooks may have adjusted the supplied value
                    let value = props.get(&property).cloned().unwrap_or(value);
                    let value =
                        key::coerce_attribute_value(&property, value, metadata.declared_type(&property))?;
                    builder.assign(&store_name, value);
                }
                UpdateEntry::Action(action) => builder.apply(&store_name, action)?,
            }
        }
        let input = match builder.build() {
            Some(built) => Self {
                update_expression: Some(built.expression),
                expression_attribute_names: built.expression_attribute_names,
                expression_attribute_values: built.expression_attribute_values,
            },
            None => Self::default(),
        };
        Ok(input)
    }
}

type ResolvedSpec<T> = (
    Vec<(String, Entry<T>)>,
    collections::HashMap<String, types::AttributeValue>,
);

fn resolve_spec<T: Serialize>(specification: spec::QuerySpec<T>) -> Result<ResolvedSpec<T>, Error> {
    let mut entries = Vec::with_capacity(specification.len());
    let mut props = collections::HashMap::with_capacity(specification.len());
    for (property, value) in specification {
        match value {
            spec::SpecValue::Value(value) => {
                let value: types::AttributeValue = to_attribute_value(value)?;
                props.insert(property.clone(), value.clone());
                entries.push((property, Entry::Value(value)));
            }
            spec::SpecValue::Condition(condition) => {
                entries.push((property, Entry::Condition(condition)));
            }
        }
    }
    Ok((entries, props))
}

fn push_sort_key_condition(
    builder: &mut condition::ConditionBuilder,
    sort_key: &key::KeyDef,
    operator: spec::SortKeyOperator,
    prefix: &str,
) -> Result<(), Error> {
    match operator.comparator() {
        None => match sort_key.scalar_type() {
            key::ScalarType::String => {
                builder.push_begins_with(
                    sort_key.name(),
                    types::AttributeValue::S(prefix.to_string()),
                );
            }
            // begins_with is not defined over numbers
            key::ScalarType::Number => builder.push_comparison(
                sort_key.name(),
                expression::Comparator::Equal,
                sort_key.scalar_type().coerce(prefix)?,
            ),
        },
        Some(comparator) => builder.push_comparison(
            sort_key.name(),
            comparator,
            sort_key.scalar_type().coerce(prefix)?,
        ),
    }
    Ok(())
}

fn push_key_fragments(
    builder: &mut condition::ConditionBuilder,
    key_def: &key::KeyDef,
    props: &collections::HashMap<String, types::AttributeValue>,
) -> Result<(), Error> {
    if key_def.scalar_type() == key::ScalarType::Number {
        // begins_with and contains are not defined over numbers, so numeric
        // keys match only when the template is fully supplied
        if key_def
            .template_attributes()
            .iter()
            .all(|property| props.contains_key(property))
        {
            let value = key_def.template().substitute(props)?;
            builder.push_comparison(
                key_def.name(),
                expression::Comparator::Equal,
                key_def.scalar_type().coerce(&value)?,
            );
        }
        return Ok(());
    }
    for fragment in key_def.template().match_fragments(props)? {
        match fragment {
            template::MatchFragment::Exact(text) => builder.push_comparison(
                key_def.name(),
                expression::Comparator::Equal,
                types::AttributeValue::S(text),
            ),
            template::MatchFragment::Prefix(text) => {
                builder.push_begins_with(key_def.name(), types::AttributeValue::S(text));
            }
            template::MatchFragment::Infix(text) => {
                builder.push_contains(key_def.name(), types::AttributeValue::S(text));
            }
        }
    }
    Ok(())
}

fn push_filters<T: Serialize>(
    builder: &mut condition::ConditionBuilder,
    metadata: &metadata::Metadata,
    partition_key: &key::KeyDef,
    sort_key: Option<&key::KeyDef>,
    entries: Vec<(String, Entry<T>)>,
) -> Result<(), Error> {
    for (property, entry) in entries {
        if is_key_member(partition_key, sort_key, &property) {
            continue;
        }
        let store_name = metadata.store_name(&property).to_string();
        match entry {
            Entry::Value(value) => {
                builder.push_comparison(&store_name, expression::Comparator::Equal, value);
            }
            Entry::Condition(condition) => builder.push(&store_name, condition)?,
        }
    }
    Ok(())
}

fn is_key_member(
    partition_key: &key::KeyDef,
    sort_key: Option<&key::KeyDef>,
    property: &str,
) -> bool {
    partition_key.template_attributes().contains(property)
        || sort_key.is_some_and(|sort_key| sort_key.template_attributes().contains(property))
}
