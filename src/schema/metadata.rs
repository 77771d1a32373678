use crate::error::ConfigurationError;
use crate::schema::key;

use indexmap::IndexMap;

/// Store name override and declared type of a record attribute.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttributeDefinition {
    store_name: Option<String>,
    scalar_type: Option<key::ScalarType>,
}

impl AttributeDefinition {
    pub(crate) fn new(store_name: Option<String>, scalar_type: Option<key::ScalarType>) -> Self {
        Self {
            store_name,
            scalar_type,
        }
    }

    /// The store name override, if one was declared.
    pub fn store_name(&self) -> Option<&str> {
        self.store_name.as_deref()
    }

    /// The declared scalar type, if one was declared.
    pub fn scalar_type(&self) -> Option<key::ScalarType> {
        self.scalar_type
    }
}

/// Key definitions of a global secondary index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GlobalSecondaryIndex {
    partition_key: key::KeyDef,
    sort_key: Option<key::KeyDef>,
}

impl GlobalSecondaryIndex {
    pub(crate) fn new(partition_key: key::KeyDef, sort_key: Option<key::KeyDef>) -> Self {
        Self {
            partition_key,
            sort_key,
        }
    }

    /// The partition key of the index.
    pub fn partition_key(&self) -> &key::KeyDef {
        &self.partition_key
    }

    /// The sort key of the index, if it has one.
    pub fn sort_key(&self) -> Option<&key::KeyDef> {
        self.sort_key.as_ref()
    }
}

/// Finalized description of a registered record type.
///
/// One immutable instance exists per registered type; it is built and frozen
/// by the registry once validation succeeds, so every lookup after
/// registration is infallible except for unknown index names.
#[derive(Clone, Debug)]
pub struct Metadata {
    table: String,
    partition_key: key::KeyDef,
    sort_key: Option<key::KeyDef>,
    local_secondary_indexes: IndexMap<String, key::KeyDef>,
    global_secondary_indexes: IndexMap<String, GlobalSecondaryIndex>,
    attributes: IndexMap<String, AttributeDefinition>,
}

impl Metadata {
    pub(crate) fn new(
        table: String,
        partition_key: key::KeyDef,
        sort_key: Option<key::KeyDef>,
        local_secondary_indexes: IndexMap<String, key::KeyDef>,
        global_secondary_indexes: IndexMap<String, GlobalSecondaryIndex>,
        attributes: IndexMap<String, AttributeDefinition>,
    ) -> Self {
        Self {
            table,
            partition_key,
            sort_key,
            local_secondary_indexes,
            global_secondary_indexes,
            attributes,
        }
    }

    /// The table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The partition key of the table.
    pub fn partition_key(&self) -> &key::KeyDef {
        &self.partition_key
    }

    /// The sort key of the table, if configured.
    pub fn sort_key(&self) -> Option<&key::KeyDef> {
        self.sort_key.as_ref()
    }

    /// The local secondary indexes: index name to sort key definition.
    pub fn local_secondary_indexes(&self) -> &IndexMap<String, key::KeyDef> {
        &self.local_secondary_indexes
    }

    /// The global secondary indexes: index name to key definitions.
    pub fn global_secondary_indexes(&self) -> &IndexMap<String, GlobalSecondaryIndex> {
        &self.global_secondary_indexes
    }

    /// The declared attributes: property name to overrides.
    pub fn attributes(&self) -> &IndexMap<String, AttributeDefinition> {
        &self.attributes
    }

    /// Resolve the key definitions of the table or one of its indexes.
    ///
    /// Local secondary indexes share the table's partition key.
    pub fn key_definitions_for(
        &self,
        index: Option<&str>,
    ) -> Result<(&key::KeyDef, Option<&key::KeyDef>), ConfigurationError> {
        let Some(name) = index else {
            return Ok((&self.partition_key, self.sort_key.as_ref()));
        };
        if let Some(sort_key) = self.local_secondary_indexes.get(name) {
            return Ok((&self.partition_key, Some(sort_key)));
        }
        if let Some(index) = self.global_secondary_indexes.get(name) {
            return Ok((index.partition_key(), index.sort_key()));
        }
        Err(ConfigurationError::UnknownIndex {
            table: self.table.clone(),
            index: name.to_string(),
        })
    }

    /// The store attribute name of a property, honoring the declared override.
    pub fn store_name<'a>(&'a self, property: &'a str) -> &'a str {
        self.attributes
            .get(property)
            .and_then(AttributeDefinition::store_name)
            .unwrap_or(property)
    }

    /// The property a store attribute name maps back to.
    pub fn property_for_store_name<'a>(&'a self, store_name: &'a str) -> &'a str {
        self.attributes
            .iter()
            .find_map(|(property, definition)| {
                (definition.store_name() == Some(store_name)).then_some(property.as_str())
            })
            .unwrap_or(store_name)
    }

    /// The declared scalar type of a property, if any.
    pub fn declared_type(&self, property: &str) -> Option<key::ScalarType> {
        self.attributes
            .get(property)
            .and_then(AttributeDefinition::scalar_type)
    }

    /// Whether a property appears in the table's partition or sort key template.
    ///
    /// Template members are never written as independent attributes.
    pub(crate) fn is_key_member(&self, property: &str) -> bool {
        self.partition_key.template_attributes().contains(property)
            || self
                .sort_key
                .as_ref()
                .is_some_and(|sort_key| sort_key.template_attributes().contains(property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::schema::template;

    use rstest::rstest;

    fn key_def(name: &str, expression: &str) -> key::KeyDef {
        let definition = key::KeyDefinition {
            name: name.to_string(),
            scalar_type: key::ScalarType::String,
        };
        key::KeyDef::new(definition, template::KeyTemplate::parse(expression).unwrap())
    }

    fn metadata() -> Metadata {
        Metadata::new(
            "projects".to_string(),
            key_def("pk", "{{name}}"),
            Some(key_def("sk", "VER:{{version}}#REV:{{revision}}")),
            IndexMap::from([("revision-index".to_string(), key_def("lsi_sk", "{{revision}}"))]),
            IndexMap::from([(
                "date-index".to_string(),
                GlobalSecondaryIndex::new(key_def("gsi_pk", "{{date}}"), None),
            )]),
            IndexMap::from([
                (
                    "date".to_string(),
                    AttributeDefinition::new(
                        Some("creation_date".to_string()),
                        Some(key::ScalarType::Number),
                    ),
                ),
                ("owner".to_string(), AttributeDefinition::default()),
            ]),
        )
    }

    #[rstest]
    fn test_key_definitions_for_table() {
        let metadata = metadata();
        let (partition_key, sort_key) = metadata.key_definitions_for(None).unwrap();
        assert_eq!(partition_key.name(), "pk");
        assert_eq!(sort_key.unwrap().name(), "sk");
    }

    #[rstest]
    fn test_key_definitions_for_local_index_shares_partition_key() {
        let metadata = metadata();
        let (partition_key, sort_key) = metadata.key_definitions_for(Some("revision-index")).unwrap();
        assert_eq!(partition_key.name(), "pk");
        assert_eq!(sort_key.unwrap().name(), "lsi_sk");
    }

    #[rstest]
    fn test_key_definitions_for_global_index() {
        let metadata = metadata();
        let (partition_key, sort_key) = metadata.key_definitions_for(Some("date-index")).unwrap();
        assert_eq!(partition_key.name(), "gsi_pk");
        assert!(sort_key.is_none());
    }

    #[rstest]
    fn test_key_definitions_for_unknown_index() {
        let metadata = metadata();
        let error = metadata.key_definitions_for(Some("missing-index")).unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::UnknownIndex {
                table: "projects".to_string(),
                index: "missing-index".to_string(),
            }
        );
    }

    #[rstest]
    #[case::declared_override("date", "creation_date")]
    #[case::no_override("owner", "owner")]
    #[case::undeclared("extra", "extra")]
    fn test_store_name(#[case] property: &str, #[case] expected: &str) {
        assert_eq!(metadata().store_name(property), expected);
    }

    #[rstest]
    #[case::declared_override("creation_date", "date")]
    #[case::no_override("owner", "owner")]
    fn test_property_for_store_name(#[case] store_name: &str, #[case] expected: &str) {
        assert_eq!(metadata().property_for_store_name(store_name), expected);
    }

    #[rstest]
    #[case::partition_member("name", true)]
    #[case::sort_member("version", true)]
    #[case::sort_member_numeric("revision", true)]
    #[case::plain_attribute("date", false)]
    fn test_is_key_member(#[case] property: &str, #[case] expected: bool) {
        assert_eq!(metadata().is_key_member(property), expected);
    }
}
