use crate::error::Error;
use crate::schema::template;

use aws_sdk_dynamodb::types;
use indexmap::IndexSet;

/// Scalar type of a key or attribute value.
///
/// The store represents every key as either a string or a number; declared
/// attributes may carry the same tag to force coercion on read and write.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ScalarType {
    /// A string value.
    #[default]
    String,
    /// A numeric value.
    Number,
}

impl ScalarType {
    /// Coerce a raw string into an attribute value of this type.
    pub(crate) fn coerce(self, raw: &str) -> Result<types::AttributeValue, Error> {
        match self {
            Self::String => Ok(types::AttributeValue::S(raw.to_string())),
            Self::Number => {
                raw.parse::<f64>().map_err(|_| Error::InvalidNumber {
                    value: raw.to_string(),
                })?;
                Ok(types::AttributeValue::N(raw.to_string()))
            }
        }
    }
}

/// Coerce an attribute value through an optionally declared scalar type.
pub(crate) fn coerce_attribute_value(
    name: &str,
    value: types::AttributeValue,
    scalar_type: Option<ScalarType>,
) -> Result<types::AttributeValue, Error> {
    let incompatible = |expected| Error::IncompatibleValue {
        name: name.to_string(),
        expected,
    };
    match (scalar_type, value) {
        (None, value) => Ok(value),
        (Some(ScalarType::String), types::AttributeValue::S(text)) => {
            Ok(types::AttributeValue::S(text))
        }
        (Some(ScalarType::String), types::AttributeValue::N(number)) => {
            Ok(types::AttributeValue::S(number))
        }
        (Some(ScalarType::String), _) => Err(incompatible(ScalarType::String)),
        (Some(ScalarType::Number), types::AttributeValue::N(number)) => {
            Ok(types::AttributeValue::N(number))
        }
        (Some(ScalarType::Number), types::AttributeValue::S(text)) => {
            ScalarType::Number.coerce(&text)
        }
        (Some(ScalarType::Number), _) => Err(incompatible(ScalarType::Number)),
    }
}

/// Store-level definition of a key attribute: its name and scalar type.
///
/// ```rust
/// use dynamodb_mapper::schema::key;
///
/// let definition = key::KeyDefinition {
///     name: "pk".to_string(),
///     scalar_type: key::ScalarType::String,
/// };
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyDefinition {
    /// The store attribute name of the key.
    pub name: String,
    /// The scalar type of the key value.
    pub scalar_type: ScalarType,
}

/// Declaration-time key: a store definition plus an unparsed template.
///
/// An empty `definition.name` falls back to the positional default (`pk` for
/// partition keys, `sk` for sort keys) at registration time.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeySchema {
    /// The store definition of the key.
    pub definition: KeyDefinition,
    /// The key template expression, e.g. `"VER:{{version}}#REV:{{revision}}"`.
    pub expression: String,
}

/// A finalized key: definition, parsed template, and template members.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyDef {
    definition: KeyDefinition,
    template: template::KeyTemplate,
    template_attributes: IndexSet<String>,
}

impl KeyDef {
    pub(crate) fn new(definition: KeyDefinition, template: template::KeyTemplate) -> Self {
        let template_attributes = template.properties().map(str::to_string).collect();
        Self {
            definition,
            template,
            template_attributes,
        }
    }

    /// The store attribute name of the key.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// The scalar type of the key value.
    pub fn scalar_type(&self) -> ScalarType {
        self.definition.scalar_type
    }

    /// The parsed key template.
    pub fn template(&self) -> &template::KeyTemplate {
        &self.template
    }

    /// The property names appearing in the key template.
    pub fn template_attributes(&self) -> &IndexSet<String> {
        &self.template_attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::string_passthrough(ScalarType::String, "TEST_C", types::AttributeValue::S("TEST_C".to_string()))]
    #[case::number_parse(ScalarType::Number, "1846", types::AttributeValue::N("1846".to_string()))]
    #[case::number_float(ScalarType::Number, "18.46", types::AttributeValue::N("18.46".to_string()))]
    fn test_coerce(
        #[case] scalar_type: ScalarType,
        #[case] raw: &str,
        #[case] expected: types::AttributeValue,
    ) {
        assert_eq!(scalar_type.coerce(raw).unwrap(), expected);
    }

    #[rstest]
    fn test_coerce_rejects_non_numeric_text() {
        let error = ScalarType::Number.coerce("REV#1846").unwrap_err();
        assert!(matches!(error, Error::InvalidNumber { .. }));
    }

    #[rstest]
    #[case::undeclared_passthrough(
        None,
        types::AttributeValue::Bool(true),
        types::AttributeValue::Bool(true)
    )]
    #[case::number_from_text(
        Some(ScalarType::Number),
        types::AttributeValue::S("515".to_string()),
        types::AttributeValue::N("515".to_string())
    )]
    #[case::string_from_number(
        Some(ScalarType::String),
        types::AttributeValue::N("515".to_string()),
        types::AttributeValue::S("515".to_string())
    )]
    fn test_coerce_attribute_value(
        #[case] scalar_type: Option<ScalarType>,
        #[case] value: types::AttributeValue,
        #[case] expected: types::AttributeValue,
    ) {
        let actual = coerce_attribute_value("a", value, scalar_type).unwrap();
        assert_eq!(actual, expected);
    }

    #[rstest]
    fn test_coerce_attribute_value_rejects_incompatible_kind() {
        let value = types::AttributeValue::Bool(true);
        let error = coerce_attribute_value("a", value, Some(ScalarType::Number)).unwrap_err();
        assert!(matches!(error, Error::IncompatibleValue { .. }));
    }
}
