use crate::error::ConfigurationError;
use crate::schema::{key, metadata, template};

use indexmap::IndexMap;
use std::{any, collections, sync};

const DEFAULT_PARTITION_KEY_NAME: &str = "pk";
const DEFAULT_SORT_KEY_NAME: &str = "sk";

/// Key definitions of a global secondary index, declared at the table level.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GlobalIndexSchema {
    /// The partition key definition of the index.
    pub partition_key: key::KeyDefinition,
    /// The sort key definition of the index, if it has one.
    pub sort_key: Option<key::KeyDefinition>,
}

/// Table-level index declarations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableIndexes {
    /// Local secondary indexes: index name to sort key definition.
    pub local: IndexMap<String, key::KeyDefinition>,
    /// Global secondary indexes: index name to key definitions.
    pub global: IndexMap<String, GlobalIndexSchema>,
}

/// Table declaration of a record type.
///
/// ```rust
/// use dynamodb_mapper::schema::registry;
///
/// let table = registry::TableSchema {
///     name: "projects".to_string(),
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TableSchema {
    /// The table name.
    pub name: String,
    /// The indexes declared on the table, if any.
    pub indexes: Option<TableIndexes>,
}

/// Template expressions a record type declares for one of its table's indexes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IndexExpressions {
    /// The partition key template of a global secondary index.
    pub partition_key: Option<String>,
    /// The sort key template of the index.
    pub sort_key: Option<String>,
}

/// Sort key declaration of a record type.
///
/// The tri-state lets a record extending a base declaration drop the
/// inherited sort key explicitly.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum SortKeySchema {
    /// Keep the base declaration's sort key (none for a fresh declaration).
    #[default]
    Inherit,
    /// The record has no sort key, dropping any inherited one.
    Unset,
    /// The record uses this sort key.
    Key(key::KeySchema),
}

/// Store name override and declared type of an attribute.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttributeSchema {
    /// The store attribute name, when it differs from the property name.
    pub store_name: Option<String>,
    /// The scalar type the attribute is coerced through on read and write.
    pub scalar_type: Option<key::ScalarType>,
}

/// Declaration of a record type, applied once at registration time.
#[derive(Clone, Debug, Default)]
pub struct RecordSchema {
    /// The table declaration; required unless inherited from a base.
    pub table: Option<TableSchema>,
    /// The partition key declaration; required unless inherited from a base.
    pub partition_key: Option<key::KeySchema>,
    /// The sort key declaration.
    pub sort_key: SortKeySchema,
    /// Template expressions for the table's secondary indexes.
    pub index_expressions: IndexMap<String, IndexExpressions>,
    /// Attribute declarations: property name to overrides.
    pub attributes: IndexMap<String, AttributeSchema>,
}

#[derive(Debug)]
struct Registration {
    metadata: sync::Arc<metadata::Metadata>,
    schema: RecordSchema,
}

/// Registry of record type declarations.
///
/// Every configuration check runs eagerly at registration, so calling code
/// can never obtain metadata in a broken state. Successful registration
/// finalizes the declaration into an immutable [`metadata::Metadata`].
#[derive(Debug, Default)]
pub struct Registry {
    records: collections::HashMap<any::TypeId, Registration>,
}

impl Registry {
    /// Register a record type from its declaration.
    pub fn register<T: 'static>(&mut self, schema: RecordSchema) -> Result<(), ConfigurationError> {
        self.insert::<T>(schema)
    }

    /// Register a record type extending a previously registered base.
    ///
    /// The base declaration is value-copied before the extending declaration
    /// is overlaid, so later changes through one registration never show up
    /// in the base or in sibling registrations.
    pub fn register_extending<Base: 'static, T: 'static>(
        &mut self,
        schema: RecordSchema,
    ) -> Result<(), ConfigurationError> {
        let base = self.records.get(&any::TypeId::of::<Base>()).ok_or_else(|| {
            ConfigurationError::UnregisteredBase {
                type_name: short_type_name::<Base>(),
            }
        })?;
        let merged = merge(base.schema.clone(), schema);
        self.insert::<T>(merged)
    }

    fn insert<T: 'static>(&mut self, schema: RecordSchema) -> Result<(), ConfigurationError> {
        let type_id = any::TypeId::of::<T>();
        if self.records.contains_key(&type_id) {
            return Err(ConfigurationError::AlreadyRegistered {
                type_name: short_type_name::<T>(),
            });
        }
        let metadata = finalize(&short_type_name::<T>(), &schema)?;
        let registration = Registration {
            metadata: sync::Arc::new(metadata),
            schema,
        };
        self.records.insert(type_id, registration);
        Ok(())
    }

    /// The finalized metadata of a registered record type.
    pub fn metadata<T: 'static>(
        &self,
    ) -> Result<sync::Arc<metadata::Metadata>, ConfigurationError> {
        self.records
            .get(&any::TypeId::of::<T>())
            .map(|registration| registration.metadata.clone())
            .ok_or_else(|| ConfigurationError::UnregisteredRecord {
                type_name: short_type_name::<T>(),
            })
    }

    /// Whether a record type was explicitly registered.
    pub fn has_metadata<T: 'static>(&self) -> bool {
        self.records.contains_key(&any::TypeId::of::<T>())
    }
}

fn short_type_name<T>() -> String {
    let name = any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name).to_string()
}

fn merge(mut base: RecordSchema, extension: RecordSchema) -> RecordSchema {
    if extension.table.is_some() {
        base.table = extension.table;
    }
    if extension.partition_key.is_some() {
        base.partition_key = extension.partition_key;
    }
    match extension.sort_key {
        SortKeySchema::Inherit => {}
        sort_key => base.sort_key = sort_key,
    }
    base.index_expressions.extend(extension.index_expressions);
    base.attributes.extend(extension.attributes);
    base
}

fn finalize(
    type_name: &str,
    schema: &RecordSchema,
) -> Result<metadata::Metadata, ConfigurationError> {
    let table = schema
        .table
        .as_ref()
        .filter(|table| !table.name.trim().is_empty())
        .ok_or_else(|| ConfigurationError::MissingTable {
            type_name: type_name.to_string(),
        })?;
    let partition_key = schema
        .partition_key
        .as_ref()
        .filter(|partition_key| !partition_key.expression.trim().is_empty())
        .ok_or_else(|| ConfigurationError::EmptyPartitionKeyExpression {
            type_name: type_name.to_string(),
        })?;
    let partition_key = finalize_key(partition_key, DEFAULT_PARTITION_KEY_NAME)?;
    let sort_key = match &schema.sort_key {
        SortKeySchema::Inherit | SortKeySchema::Unset => None,
        SortKeySchema::Key(sort_key) => {
            if sort_key.expression.trim().is_empty() {
                return Err(ConfigurationError::MissingSortKeyExpression {
                    type_name: type_name.to_string(),
                });
            }
            Some(finalize_key(sort_key, DEFAULT_SORT_KEY_NAME)?)
        }
    };
    let (local, global) = finalize_indexes(type_name, table, &schema.index_expressions)?;
    let attributes = schema
        .attributes
        .iter()
        .map(|(property, attribute)| {
            let definition = metadata::AttributeDefinition::new(
                attribute.store_name.clone(),
                attribute.scalar_type,
            );
            (property.clone(), definition)
        })
        .collect();
    Ok(metadata::Metadata::new(
        table.name.clone(),
        partition_key,
        sort_key,
        local,
        global,
        attributes,
    ))
}

fn finalize_key(
    schema: &key::KeySchema,
    default_name: &str,
) -> Result<key::KeyDef, ConfigurationError> {
    let template = template::KeyTemplate::parse(&schema.expression)?;
    let mut definition = schema.definition.clone();
    if definition.name.is_empty() {
        definition.name = default_name.to_string();
    }
    Ok(key::KeyDef::new(definition, template))
}

type FinalizedIndexes = (
    IndexMap<String, key::KeyDef>,
    IndexMap<String, metadata::GlobalSecondaryIndex>,
);

fn finalize_indexes(
    type_name: &str,
    table: &TableSchema,
    index_expressions: &IndexMap<String, IndexExpressions>,
) -> Result<FinalizedIndexes, ConfigurationError> {
    let mut local = IndexMap::new();
    let mut global = IndexMap::new();
    if index_expressions.is_empty() {
        return Ok((local, global));
    }
    let indexes =
        table
            .indexes
            .as_ref()
            .ok_or_else(|| ConfigurationError::NoIndexesDeclared {
                type_name: type_name.to_string(),
            })?;
    let undeclared: Vec<&str> = index_expressions
        .keys()
        .filter(|name| !indexes.local.contains_key(*name) && !indexes.global.contains_key(*name))
        .map(String::as_str)
        .collect();
    if !undeclared.is_empty() {
        return Err(ConfigurationError::UndeclaredIndexes {
            table: table.name.clone(),
            indexes: undeclared.join(", "),
        });
    }
    for (name, expressions) in index_expressions {
        if let Some(definition) = indexes.local.get(name) {
            let expression = expressions
                .sort_key
                .as_deref()
                .filter(|expression| !expression.trim().is_empty())
                .ok_or_else(|| ConfigurationError::MissingSortKeyExpression {
                    type_name: type_name.to_string(),
                })?;
            let template = template::KeyTemplate::parse(expression)?;
            local.insert(name.clone(), key::KeyDef::new(definition.clone(), template));
        } else if let Some(definition) = indexes.global.get(name) {
            let expression = expressions
                .partition_key
                .as_deref()
                .filter(|expression| !expression.trim().is_empty())
                .ok_or_else(|| ConfigurationError::EmptyPartitionKeyExpression {
                    type_name: type_name.to_string(),
                })?;
            let template = template::KeyTemplate::parse(expression)?;
            let partition_key = key::KeyDef::new(definition.partition_key.clone(), template);
            let sort_key = match expressions
                .sort_key
                .as_deref()
                .filter(|expression| !expression.trim().is_empty())
            {
                Some(expression) => {
                    let template = template::KeyTemplate::parse(expression)?;
                    let definition =
                        definition
                            .sort_key
                            .clone()
                            .unwrap_or_else(|| key::KeyDefinition {
                                name: DEFAULT_SORT_KEY_NAME.to_string(),
                                ..Default::default()
                            });
                    Some(key::KeyDef::new(definition, template))
                }
                None => None,
            };
            let index = metadata::GlobalSecondaryIndex::new(partition_key, sort_key);
            global.insert(name.clone(), index);
        }
    }
    Ok((local, global))
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[derive(Default)]
    struct Project;
    #[derive(Default)]
    struct Library;
    #[derive(Default)]
    struct Application;
    #[derive(Default)]
    struct Unregistered;

    fn project_schema() -> RecordSchema {
        RecordSchema {
            table: Some(TableSchema {
                name: "projects".to_string(),
                ..Default::default()
            }),
            partition_key: Some(key::KeySchema {
                expression: "{{name}}".to_string(),
                ..Default::default()
            }),
            sort_key: SortKeySchema::Key(key::KeySchema {
                expression: "VER:{{version}}#REV:{{revision}}".to_string(),
                ..Default::default()
            }),
            attributes: IndexMap::from([(
                "date".to_string(),
                AttributeSchema {
                    scalar_type: Some(key::ScalarType::Number),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        }
    }

    #[rstest]
    fn test_register_applies_key_name_defaults() {
        let mut registry = Registry::default();
        registry.register::<Project>(project_schema()).unwrap();
        let metadata = registry.metadata::<Project>().unwrap();
        assert_eq!(metadata.table(), "projects");
        assert_eq!(metadata.partition_key().name(), "pk");
        assert_eq!(metadata.sort_key().unwrap().name(), "sk");
        assert_eq!(
            metadata.sort_key().unwrap().template_attributes().len(),
            2
        );
    }

    #[rstest]
    fn test_register_twice_is_rejected() {
        let mut registry = Registry::default();
        registry.register::<Project>(project_schema()).unwrap();
        let error = registry.register::<Project>(project_schema()).unwrap_err();
        assert!(matches!(error, ConfigurationError::AlreadyRegistered { .. }));
    }

    #[rstest]
    fn test_metadata_for_unregistered_type_names_it() {
        let registry = Registry::default();
        let error = registry.metadata::<Unregistered>().unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::UnregisteredRecord {
                type_name: "Unregistered".to_string(),
            }
        );
        assert!(!registry.has_metadata::<Unregistered>());
    }

    #[rstest]
    fn test_register_extending_inherits_and_stays_independent() {
        let mut registry = Registry::default();
        registry.register::<Project>(project_schema()).unwrap();
        registry
            .register_extending::<Project, Library>(RecordSchema {
                attributes: IndexMap::from([(
                    "license".to_string(),
                    AttributeSchema::default(),
                )]),
                ..Default::default()
            })
            .unwrap();
        registry
            .register_extending::<Project, Application>(RecordSchema::default())
            .unwrap();
        let library = registry.metadata::<Library>().unwrap();
        let application = registry.metadata::<Application>().unwrap();
        assert_eq!(library.table(), "projects");
        assert!(library.attributes().contains_key("date"));
        assert!(library.attributes().contains_key("license"));
        assert!(!application.attributes().contains_key("license"));
        let base = registry.metadata::<Project>().unwrap();
        assert!(!base.attributes().contains_key("license"));
    }

    #[rstest]
    fn test_register_extending_can_unset_sort_key() {
        let mut registry = Registry::default();
        registry.register::<Project>(project_schema()).unwrap();
        registry
            .register_extending::<Project, Library>(RecordSchema {
                sort_key: SortKeySchema::Unset,
                ..Default::default()
            })
            .unwrap();
        let metadata = registry.metadata::<Library>().unwrap();
        assert!(metadata.sort_key().is_none());
    }

    #[rstest]
    fn test_register_extending_unregistered_base() {
        let mut registry = Registry::default();
        let error = registry
            .register_extending::<Unregistered, Library>(RecordSchema::default())
            .unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::UnregisteredBase {
                type_name: "Unregistered".to_string(),
            }
        );
    }

    #[rstest]
    #[case::missing_table(
        RecordSchema::default(),
        ConfigurationError::MissingTable {
            type_name: "Project".to_string(),
        }
    )]
    #[case::empty_partition_key_expression(
        RecordSchema {
            table: Some(
                TableSchema {
                    name: "projects".to_string(),
                    ..Default::default()
                }
            ),
            partition_key: Some(
                key::KeySchema {
                    expression: "   ".to_string(),
                    ..Default::default()
                }
            ),
            ..Default::default()
        },
        ConfigurationError::EmptyPartitionKeyExpression {
            type_name: "Project".to_string(),
        }
    )]
    #[case::sort_key_without_expression(
        RecordSchema {
            table: Some(
                TableSchema {
                    name: "projects".to_string(),
                    ..Default::default()
                }
            ),
            partition_key: Some(
                key::KeySchema {
                    expression: "{{name}}".to_string(),
                    ..Default::default()
                }
            ),
            sort_key: SortKeySchema::Key(key::KeySchema::default()),
            ..Default::default()
        },
        ConfigurationError::MissingSortKeyExpression {
            type_name: "Project".to_string(),
        }
    )]
    #[case::adjacent_placeholders(
        RecordSchema {
            table: Some(
                TableSchema {
                    name: "projects".to_string(),
                    ..Default::default()
                }
            ),
            partition_key: Some(
                key::KeySchema {
                    expression: "{{name}}{{version}}".to_string(),
                    ..Default::default()
                }
            ),
            ..Default::default()
        },
        ConfigurationError::AdjacentPlaceholders {
            expression: "{{name}}{{version}}".to_string(),
        }
    )]
    #[case::index_expressions_without_table_indexes(
        RecordSchema {
            table: Some(
                TableSchema {
                    name: "projects".to_string(),
                    ..Default::default()
                }
            ),
            partition_key: Some(
                key::KeySchema {
                    expression: "{{name}}".to_string(),
                    ..Default::default()
                }
            ),
            index_expressions: IndexMap::from(
                [(
                    "date-index".to_string(),
                    IndexExpressions {
                        partition_key: Some("{{date}}".to_string()),
                        ..Default::default()
                    },
                )]
            ),
            ..Default::default()
        },
        ConfigurationError::NoIndexesDeclared {
            type_name: "Project".to_string(),
        }
    )]
    #[case::undeclared_index(
        RecordSchema {
            table: Some(
                TableSchema {
                    name: "projects".to_string(),
                    indexes: Some(
                        TableIndexes {
                            global: IndexMap::from(
                                [(
                                    "owner-index".to_string(),
                                    GlobalIndexSchema::default(),
                                )]
                            ),
                            ..Default::default()
                        }
                    ),
                }
            ),
            partition_key: Some(
                key::KeySchema {
                    expression: "{{name}}".to_string(),
                    ..Default::default()
                }
            ),
            index_expressions: IndexMap::from(
                [(
                    "date-index".to_string(),
                    IndexExpressions {
                        partition_key: Some("{{date}}".to_string()),
                        ..Default::default()
                    },
                )]
            ),
            ..Default::default()
        },
        ConfigurationError::UndeclaredIndexes {
            table: "projects".to_string(),
            indexes: "date-index".to_string(),
        }
    )]
    fn test_register_rejects_invalid_schema(
        #[case] schema: RecordSchema,
        #[case] expected: ConfigurationError,
    ) {
        let mut registry = Registry::default();
        let error = registry.register::<Project>(schema).unwrap_err();
        assert_eq!(error, expected);
    }

    #[rstest]
    fn test_register_finalizes_declared_indexes() {
        let mut registry = Registry::default();
        let mut schema = project_schema();
        schema.table = Some(TableSchema {
            name: "projects".to_string(),
            indexes: Some(TableIndexes {
                local: IndexMap::from([(
                    "revision-index".to_string(),
                    key::KeyDefinition {
                        name: "lsi_sk".to_string(),
                        scalar_type: key::ScalarType::Number,
                    },
                )]),
                global: IndexMap::from([(
                    "date-index".to_string(),
                    GlobalIndexSchema {
                        partition_key: key::KeyDefinition {
                            name: "gsi_pk".to_string(),
                            scalar_type: key::ScalarType::Number,
                        },
                        sort_key: None,
                    },
                )]),
            }),
        });
        schema.index_expressions = IndexMap::from([
            (
                "revision-index".to_string(),
                IndexExpressions {
                    sort_key: Some("{{revision}}".to_string()),
                    ..Default::default()
                },
            ),
            (
                "date-index".to_string(),
                IndexExpressions {
                    partition_key: Some("{{date}}".to_string()),
                    ..Default::default()
                },
            ),
        ]);
        registry.register::<Project>(schema).unwrap();
        let metadata = registry.metadata::<Project>().unwrap();
        let (partition_key, sort_key) = metadata
            .key_definitions_for(Some("revision-index"))
            .unwrap();
        assert_eq!(partition_key.name(), "pk");
        assert_eq!(sort_key.unwrap().name(), "lsi_sk");
        assert_eq!(sort_key.unwrap().scalar_type(), key::ScalarType::Number);
        let (partition_key, sort_key) = metadata.key_definitions_for(Some("date-index")).unwrap();
        assert_eq!(partition_key.name(), "gsi_pk");
        assert!(sort_key.is_none());
    }
}
