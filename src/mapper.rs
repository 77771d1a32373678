//! Serialization between typed records and flat store items.

use crate::error::Error;
use crate::record;
use crate::schema::{key, metadata};

use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::{from_item, to_item};
use std::{collections, sync};

/// Serializer between typed records and flat store items.
///
/// Keys are built through template substitution on the way out and inverse
/// template parsing on the way back; template members are never written as
/// independent attributes.
#[derive(Clone, Debug)]
pub struct ItemMapper {
    metadata: sync::Arc<metadata::Metadata>,
}

impl ItemMapper {
    pub(crate) fn new(metadata: sync::Arc<metadata::Metadata>) -> Self {
        Self { metadata }
    }

    pub(crate) fn metadata(&self) -> &metadata::Metadata {
        &self.metadata
    }

    /// Serialize a record to a flat store item.
    pub fn serialize<T: record::Record>(
        &self,
        record: &T,
    ) -> Result<collections::HashMap<String, types::AttributeValue>, Error> {
        let props = properties(record)?;
        let mut item = self.key_map_for(
            &props,
            self.metadata.partition_key(),
            self.metadata.sort_key(),
        )?;
        for (property, value) in &props {
            if self.metadata.is_key_member(property) {
                continue;
            }
            let store_name = self.metadata.store_name(property);
            if item.contains_key(store_name) {
                continue;
            }
            let value =
                key::coerce_attribute_value(property, value.clone(), self.metadata.declared_type(property))?;
            item.insert(store_name.to_string(), value);
        }
        Ok(item)
    }

    /// Build the primary key map of a partial key input.
    ///
    /// Only key attributes are produced; non-key properties of the input are
    /// stripped by construction. Every template property must be present.
    pub fn key_map<K: Serialize>(
        &self,
        partial_key: &K,
    ) -> Result<collections::HashMap<String, types::AttributeValue>, Error> {
        let props = properties(partial_key)?;
        self.key_map_for(
            &props,
            self.metadata.partition_key(),
            self.metadata.sort_key(),
        )
    }

    fn key_map_for(
        &self,
        props: &collections::HashMap<String, types::AttributeValue>,
        partition_key: &key::KeyDef,
        sort_key: Option<&key::KeyDef>,
    ) -> Result<collections::HashMap<String, types::AttributeValue>, Error> {
        let mut keys = collections::HashMap::new();
        let value = partition_key.template().substitute(props)?;
        keys.insert(
            partition_key.name().to_string(),
            partition_key.scalar_type().coerce(&value)?,
        );
        if let Some(sort_key) = sort_key {
            let value = sort_key.template().substitute(props)?;
            keys.insert(
                sort_key.name().to_string(),
                sort_key.scalar_type().coerce(&value)?,
            );
        }
        Ok(keys)
    }

    /// Deserialize a flat store item against the table's key definitions.
    pub fn deserialize<T: record::Record>(
        &self,
        item: collections::HashMap<String, types::AttributeValue>,
    ) -> Result<T, Error> {
        self.deserialize_with_keys(
            item,
            self.metadata.partition_key(),
            self.metadata.sort_key(),
        )
    }

    /// Deserialize a flat store item against explicit key definitions.
    ///
    /// Required for rows returned from a secondary index, whose key
    /// definitions differ from the table's.
    pub fn deserialize_with_keys<T: record::Record>(
        &self,
        item: collections::HashMap<String, types::AttributeValue>,
        partition_key: &key::KeyDef,
        sort_key: Option<&key::KeyDef>,
    ) -> Result<T, Error> {
        self.deserialize_over(collections::HashMap::new(), item, partition_key, sort_key)
    }

    /// Deserialize an item over a base property map.
    ///
    /// Item attributes overwrite base entries and key parsing overwrites
    /// both, so an item returned from a post-update read merges onto the
    /// record it was built from.
    pub(crate) fn deserialize_over<T: record::Record>(
        &self,
        mut props: collections::HashMap<String, types::AttributeValue>,
        item: collections::HashMap<String, types::AttributeValue>,
        partition_key: &key::KeyDef,
        sort_key: Option<&key::KeyDef>,
    ) -> Result<T, Error> {
        for (name, value) in &item {
            if name.as_str() == partition_key.name()
                || sort_key.is_some_and(|sort_key| name.as_str() == sort_key.name())
            {
                continue;
            }
            let property = self.metadata.property_for_store_name(name);
            let value =
                key::coerce_attribute_value(property, value.clone(), self.metadata.declared_type(property))?;
            props.insert(property.to_string(), value);
        }
        self.parse_key(&mut props, &item, partition_key)?;
        if let Some(sort_key) = sort_key {
            self.parse_key(&mut props, &item, sort_key)?;
        }
        let mut record: T = from_item(props)?;
        record.post_load();
        Ok(record)
    }

    fn parse_key(
        &self,
        props: &mut collections::HashMap<String, types::AttributeValue>,
        item: &collections::HashMap<String, types::AttributeValue>,
        key_def: &key::KeyDef,
    ) -> Result<(), Error> {
        let value = item
            .get(key_def.name())
            .ok_or_else(|| Error::MissingTemplateProperty {
                property: key_def.name().to_string(),
            })?;
        for (property, raw) in key_def.template().parse_value(value)? {
            let scalar_type = self
                .metadata
                .declared_type(&property)
                .unwrap_or(key_def.scalar_type());
            props.insert(property, scalar_type.coerce(&raw)?);
        }
        Ok(())
    }
}

/// The property map of a serializable value, with null entries dropped.
///
/// Absent optional fields serialize as the null marker; treating them as
/// absent keeps them out of key substitution and written items.
pub(crate) fn properties<T: Serialize>(
    value: &T,
) -> Result<collections::HashMap<String, types::AttributeValue>, Error> {
    let mut props: collections::HashMap<String, types::AttributeValue> = to_item(value)?;
    props.retain(|_, value| !matches!(value, types::AttributeValue::Null(_)));
    Ok(props)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::schema::registry;

    use rstest::rstest;
    use serde::Deserialize;
    use std::sync::atomic;

    static LOADED: atomic::AtomicUsize = atomic::AtomicUsize::new(0);

    #[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
    struct Project {
        name: String,
        version: String,
        revision: u32,
        date: u64,
        owner: Option<String>,
    }

    impl record::Record for Project {
        fn post_load(&mut self) {
            LOADED.fetch_add(1, atomic::Ordering::SeqCst);
        }
    }

    fn mapper() -> ItemMapper {
        let mut registry = registry::Registry::default();
        registry
            .register::<Project>(registry::RecordSchema {
                table: Some(registry::TableSchema {
                    name: "projects".to_string(),
                    ..Default::default()
                }),
                partition_key: Some(key::KeySchema {
                    expression: "{{name}}".to_string(),
                    ..Default::default()
                }),
                sort_key: registry::SortKeySchema::Key(key::KeySchema {
                    expression: "VER:{{version}}#REV:{{revision}}".to_string(),
                    ..Default::default()
                }),
                attributes: indexmap::IndexMap::from([
                    (
                        "revision".to_string(),
                        registry::AttributeSchema {
                            scalar_type: Some(key::ScalarType::Number),
                            ..Default::default()
                        },
                    ),
                    (
                        "date".to_string(),
                        registry::AttributeSchema {
                            store_name: Some("creation_date".to_string()),
                            scalar_type: Some(key::ScalarType::Number),
                            ..Default::default()
                        },
                    ),
                ]),
                ..Default::default()
            })
            .unwrap();
        ItemMapper::new(registry.metadata::<Project>().unwrap())
    }

    fn project() -> Project {
        Project {
            name: "PROJECT_A".to_string(),
            version: "Initial".to_string(),
            revision: 515,
            date: 1662541189,
            owner: None,
        }
    }

    #[rstest]
    fn test_serialize_builds_keys_and_skips_template_members() {
        let item = mapper().serialize(&project()).unwrap();
        assert_eq!(
            item.get("pk"),
            Some(&types::AttributeValue::S("PROJECT_A".to_string()))
        );
        assert_eq!(
            item.get("sk"),
            Some(&types::AttributeValue::S("VER:Initial#REV:515".to_string()))
        );
        assert_eq!(
            item.get("creation_date"),
            Some(&types::AttributeValue::N("1662541189".to_string()))
        );
        assert!(!item.contains_key("name"));
        assert!(!item.contains_key("version"));
        assert!(!item.contains_key("revision"));
        assert!(!item.contains_key("date"));
        assert!(!item.contains_key("owner"));
    }

    #[rstest]
    fn test_key_map_strips_non_key_attributes() {
        let keys = mapper().key_map(&project()).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys.get("pk"),
            Some(&types::AttributeValue::S("PROJECT_A".to_string()))
        );
        assert_eq!(
            keys.get("sk"),
            Some(&types::AttributeValue::S("VER:Initial#REV:515".to_string()))
        );
    }

    #[rstest]
    fn test_key_map_missing_template_property() {
        #[derive(Serialize)]
        struct ProjectKey {
            name: String,
        }
        let error = mapper()
            .key_map(&ProjectKey {
                name: "PROJECT_A".to_string(),
            })
            .unwrap_err();
        assert!(matches!(error, Error::MissingTemplateProperty { .. }));
    }

    #[rstest]
    fn test_round_trip() {
        let mapper = mapper();
        let original = project();
        let item = mapper.serialize(&original).unwrap();
        let loaded: Project = mapper.deserialize(item).unwrap();
        assert_eq!(loaded, original);
    }

    #[rstest]
    fn test_deserialize_invokes_post_load() {
        let mapper = mapper();
        let item = mapper.serialize(&project()).unwrap();
        let before = LOADED.load(atomic::Ordering::SeqCst);
        let _: Project = mapper.deserialize(item).unwrap();
        assert_eq!(LOADED.load(atomic::Ordering::SeqCst), before + 1);
    }

    #[rstest]
    fn test_deserialize_resolves_store_names_and_declared_types() {
        let mapper = mapper();
        let item = collections::HashMap::from([
            (
                "pk".to_string(),
                types::AttributeValue::S("PROJECT_A".to_string()),
            ),
            (
                "sk".to_string(),
                types::AttributeValue::S("VER:Initial#REV:515".to_string()),
            ),
            (
                "creation_date".to_string(),
                types::AttributeValue::S("1662541189".to_string()),
            ),
        ]);
        let loaded: Project = mapper.deserialize(item).unwrap();
        assert_eq!(loaded, project());
    }

    #[rstest]
    fn test_deserialize_with_index_keys() {
        let mapper = mapper();
        let index_key = key::KeyDef::new(
            key::KeyDefinition {
                name: "gsi_pk".to_string(),
                scalar_type: key::ScalarType::Number,
            },
            crate::schema::template::KeyTemplate::parse("{{date}}").unwrap(),
        );
        let item = collections::HashMap::from([
            (
                "gsi_pk".to_string(),
                types::AttributeValue::N("1662541189".to_string()),
            ),
            (
                "name".to_string(),
                types::AttributeValue::S("PROJECT_A".to_string()),
            ),
            (
                "version".to_string(),
                types::AttributeValue::S("Initial".to_string()),
            ),
            (
                "revision".to_string(),
                types::AttributeValue::N("515".to_string()),
            ),
        ]);
        let loaded: Project = mapper
            .deserialize_with_keys(item, &index_key, None)
            .unwrap();
        assert_eq!(loaded.date, 1662541189);
        assert_eq!(loaded.name, "PROJECT_A");
        assert_eq!(loaded.revision, 515);
    }
}
