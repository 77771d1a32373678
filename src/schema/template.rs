use crate::error::{ConfigurationError, Error};

use aws_sdk_dynamodb::types;
use std::collections;

const PLACEHOLDER_OPEN: &str = "{{";
const PLACEHOLDER_CLOSE: &str = "}}";

#[derive(Clone, Debug, Eq, PartialEq)]
enum Segment {
    Text(String),
    Property(String),
}

/// Fragment of a key value reconstructed from a partially supplied template.
///
/// Scans cannot express key conditions, so partially supplied key templates
/// are matched with string functions instead: a run of supplied values
/// anchored at the start of the template becomes a prefix check, a later run
/// becomes a containment check, and a template without placeholders becomes
/// an exact match.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum MatchFragment {
    /// The whole key equals this static text.
    Exact(String),
    /// The key begins with this text.
    Prefix(String),
    /// The key contains this text.
    Infix(String),
}

/// A parsed key template: static text interleaved with `{{property}}`
/// placeholders.
///
/// ```rust
/// use dynamodb_mapper::schema::template;
///
/// let template = template::KeyTemplate::parse("VER:{{version}}#REV:{{revision}}").unwrap();
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyTemplate {
    expression: String,
    segments: Vec<Segment>,
}

impl KeyTemplate {
    /// Parse a template expression.
    ///
    /// Two placeholders with no static separator between them are rejected,
    /// since inverse parsing of such a template would be ambiguous.
    pub fn parse(expression: &str) -> Result<Self, ConfigurationError> {
        let mut segments = Vec::new();
        let mut rest = expression;
        let mut previous_was_property = false;
        while !rest.is_empty() {
            match rest.find(PLACEHOLDER_OPEN) {
                Some(0) => {
                    let end = rest.find(PLACEHOLDER_CLOSE).ok_or_else(|| {
                        ConfigurationError::UnterminatedPlaceholder {
                            expression: expression.to_string(),
                        }
                    })?;
                    if previous_was_property {
                        return Err(ConfigurationError::AdjacentPlaceholders {
                            expression: expression.to_string(),
                        });
                    }
                    let name = &rest[PLACEHOLDER_OPEN.len()..end];
                    segments.push(Segment::Property(name.to_string()));
                    previous_was_property = true;
                    rest = &rest[end + PLACEHOLDER_CLOSE.len()..];
                }
                Some(start) => {
                    segments.push(Segment::Text(rest[..start].to_string()));
                    previous_was_property = false;
                    rest = &rest[start..];
                }
                None => {
                    segments.push(Segment::Text(rest.to_string()));
                    break;
                }
            }
        }
        Ok(Self {
            expression: expression.to_string(),
            segments,
        })
    }

    /// The original template expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The property names appearing in the template, in order.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Property(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    fn has_placeholders(&self) -> bool {
        self.properties().next().is_some()
    }

    /// Substitute every placeholder from the property map.
    ///
    /// Every placeholder must resolve; a missing property is an error.
    pub fn substitute(
        &self,
        props: &collections::HashMap<String, types::AttributeValue>,
    ) -> Result<String, Error> {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::Property(name) => {
                    let value =
                        props
                            .get(name)
                            .ok_or_else(|| Error::MissingTemplateProperty {
                                property: name.clone(),
                            })?;
                    output.push_str(&stringify(name, value)?);
                }
            }
        }
        Ok(output)
    }

    /// Substitute placeholders left to right until one is missing.
    ///
    /// Each matched placeholder contributes its preceding static text plus
    /// its value; the separator after the last matched placeholder is
    /// dropped. Returns `None` when no placeholder matched at all, including
    /// for templates without placeholders.
    pub fn partial_substitute(
        &self,
        props: &collections::HashMap<String, types::AttributeValue>,
    ) -> Result<Option<String>, Error> {
        let mut output = String::new();
        let mut pending = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => pending.push_str(text),
                Segment::Property(name) => match props.get(name) {
                    Some(value) => {
                        output.push_str(&pending);
                        pending.clear();
                        output.push_str(&stringify(name, value)?);
                    }
                    None => break,
                },
            }
        }
        if output.is_empty() {
            Ok(None)
        } else {
            Ok(Some(output))
        }
    }

    /// Inverse-parse a stored key value into property assignments.
    ///
    /// A numeric value, or a template without static text, maps entirely to
    /// the single placeholder. Otherwise the static segments are located
    /// left to right in the value and the substrings between them are
    /// assigned to the enclosed placeholders.
    pub fn parse_value(
        &self,
        value: &types::AttributeValue,
    ) -> Result<Vec<(String, String)>, Error> {
        let mismatch = |raw: &str| Error::TemplateMismatch {
            template: self.expression.clone(),
            value: raw.to_string(),
        };
        let raw = match value {
            types::AttributeValue::N(number) => {
                return Ok(self
                    .properties()
                    .next()
                    .map(|name| (name.to_string(), number.clone()))
                    .into_iter()
                    .collect());
            }
            types::AttributeValue::S(text) => text,
            _ => return Err(mismatch("")),
        };
        let has_static = self
            .segments
            .iter()
            .any(|segment| matches!(segment, Segment::Text(_)));
        if !has_static {
            return Ok(self
                .properties()
                .next()
                .map(|name| (name.to_string(), raw.clone()))
                .into_iter()
                .collect());
        }
        let mut assignments = Vec::new();
        let mut cursor = 0;
        let mut pending: Option<&str> = None;
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => {
                    let start = raw[cursor..]
                        .find(text.as_str())
                        .ok_or_else(|| mismatch(raw))?
                        + cursor;
                    if let Some(name) = pending.take() {
                        assignments.push((name.to_string(), raw[cursor..start].to_string()));
                    }
                    cursor = start + text.len();
                }
                Segment::Property(name) => pending = Some(name),
            }
        }
        if let Some(name) = pending {
            assignments.push((name.to_string(), raw[cursor..].to_string()));
        }
        Ok(assignments)
    }

    /// Decompose the template into scan-filter match fragments.
    ///
    /// Each maximal run of consecutively supplied placeholders yields one
    /// fragment of its values chained with the static text between them; the
    /// run anchored at the template start is a prefix, later runs are
    /// infixes. A template without placeholders yields a single exact match.
    pub(crate) fn match_fragments(
        &self,
        props: &collections::HashMap<String, types::AttributeValue>,
    ) -> Result<Vec<MatchFragment>, Error> {
        if !self.has_placeholders() {
            return Ok(vec![MatchFragment::Exact(self.expression.clone())]);
        }
        let mut fragments = Vec::new();
        let mut pending = String::new();
        let mut current: Option<(String, bool)> = None;
        let mut gap_before = false;
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => pending.push_str(text),
                Segment::Property(name) => match props.get(name) {
                    Some(value) => {
                        let text = stringify(name, value)?;
                        match current.as_mut() {
                            Some((chunk, _)) => {
                                chunk.push_str(&pending);
                                chunk.push_str(&text);
                            }
                            None => {
                                let mut chunk = pending.clone();
                                chunk.push_str(&text);
                                current = Some((chunk, !gap_before));
                            }
                        }
                        pending.clear();
                    }
                    None => {
                        if let Some((chunk, anchored)) = current.take() {
                            fragments.push(run_fragment(chunk, anchored));
                        }
                        gap_before = true;
                        pending.clear();
                    }
                },
            }
        }
        if let Some((chunk, anchored)) = current {
            fragments.push(run_fragment(chunk, anchored));
        }
        Ok(fragments)
    }
}

fn run_fragment(chunk: String, anchored: bool) -> MatchFragment {
    if anchored {
        MatchFragment::Prefix(chunk)
    } else {
        MatchFragment::Infix(chunk)
    }
}

/// String form of a property value appearing in a key.
pub(crate) fn stringify(property: &str, value: &types::AttributeValue) -> Result<String, Error> {
    match value {
        types::AttributeValue::S(text) => Ok(text.clone()),
        types::AttributeValue::N(number) => Ok(number.clone()),
        types::AttributeValue::Bool(flag) => Ok(flag.to_string()),
        _ => Err(Error::UnsupportedKeyValue {
            property: property.to_string(),
        }),
    }
}
