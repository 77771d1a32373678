//! The explicit per-process context owning the store client, the registry,
//! and the repository cache.

use crate::error::ConfigurationError;
use crate::record;
use crate::repository;
use crate::schema::registry;

use aws_sdk_dynamodb::Client;
use std::{any, collections, sync};

/// Per-process entry point for registration and repository lookup.
///
/// Replaces process-wide singletons: construct one context per process,
/// register every record type at startup, and pass the context by reference.
/// Repositories are created on first request and cached for the life of the
/// context.
///
/// ```rust,no_run
/// use aws_sdk_dynamodb::Client;
/// use dynamodb_mapper::context::MapperContext;
/// use dynamodb_mapper::schema::key::KeySchema;
/// use dynamodb_mapper::schema::registry::{RecordSchema, TableSchema};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Deserialize, Serialize)]
/// struct Account {
///     id: String,
/// }
///
/// impl dynamodb_mapper::record::Record for Account {}
///
/// # fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
/// let context = MapperContext::new(client);
/// context.register::<Account>(RecordSchema {
///     table: Some(TableSchema {
///         name: "accounts".to_string(),
///         ..Default::default()
///     }),
///     partition_key: Some(KeySchema {
///         expression: "ACCOUNT#{{id}}".to_string(),
///         ..Default::default()
///     }),
///     ..Default::default()
/// })?;
/// let repository = context.repository::<Account>()?;
/// # Ok(())
/// # }
/// ```
pub struct MapperContext {
    client: Client,
    registry: sync::RwLock<registry::Registry>,
    repositories: sync::RwLock<collections::HashMap<any::TypeId, Box<dyn any::Any + Send + Sync>>>,
}

impl MapperContext {
    /// Create a context over a store client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            registry: sync::RwLock::new(registry::Registry::default()),
            repositories: sync::RwLock::new(collections::HashMap::new()),
        }
    }

    /// Register a record type from its declaration.
    ///
    /// Validation runs eagerly; a configuration error here means no
    /// repository can ever be obtained for the type.
    pub fn register<T: record::Record>(
        &self,
        schema: registry::RecordSchema,
    ) -> Result<(), ConfigurationError> {
        self.registry.write().unwrap().register::<T>(schema)
    }

    /// Register a record type extending a previously registered base.
    pub fn register_extending<Base: record::Record, T: record::Record>(
        &self,
        schema: registry::RecordSchema,
    ) -> Result<(), ConfigurationError> {
        self.registry
            .write()
            .unwrap()
            .register_extending::<Base, T>(schema)
    }

    /// Whether a record type was explicitly registered.
    pub fn has_metadata<T: record::Record>(&self) -> bool {
        self.registry.read().unwrap().has_metadata::<T>()
    }

    /// The repository of a registered record type.
    ///
    /// Requesting a repository for an unregistered type is a configuration
    /// error naming the type.
    pub fn repository<T: record::Record>(
        &self,
    ) -> Result<repository::Repository<T>, ConfigurationError> {
        let type_id = any::TypeId::of::<T>();
        if let Some(cached) = self.repositories.read().unwrap().get(&type_id) {
            if let Some(repository) = cached.downcast_ref::<repository::Repository<T>>() {
                return Ok(repository.clone());
            }
        }
        let metadata = self.registry.read().unwrap().metadata::<T>()?;
        let repository = repository::Repository::new(self.client.clone(), metadata);
        self.repositories
            .write()
            .unwrap()
            .insert(type_id, Box::new(repository.clone()));
        Ok(repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::schema::key;

    use indexmap::IndexMap;
    use rstest::rstest;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Deserialize, Serialize)]
    struct Project {
        name: String,
        version: String,
        revision: u32,
    }

    impl record::Record for Project {}

    #[derive(Debug, Default, Deserialize, Serialize)]
    struct Library {
        name: String,
        version: String,
        revision: u32,
        license: Option<String>,
    }

    impl record::Record for Library {}

    fn client() -> Client {
        let config = aws_sdk_dynamodb::config::Config::builder()
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        Client::from_conf(config)
    }

    fn project_schema() -> registry::RecordSchema {
        registry::RecordSchema {
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
            attributes: IndexMap::from([(
                "revision".to_string(),
                registry::AttributeSchema {
                    scalar_type: Some(key::ScalarType::Number),
                    ..Default::default()
                },
            )]),
            ..Default::default()
        }
    }

    #[rstest]
    fn test_repository_for_registered_type() {
        let context = MapperContext::new(client());
        context.register::<Project>(project_schema()).unwrap();
        assert!(context.has_metadata::<Project>());
        let repository = context.repository::<Project>().unwrap();
        assert_eq!(repository.metadata().table(), "projects");
    }

    #[rstest]
    fn test_repository_for_unregistered_type() {
        let context = MapperContext::new(client());
        assert!(!context.has_metadata::<Project>());
        let error = context.repository::<Project>().unwrap_err();
        assert_eq!(
            error,
            ConfigurationError::UnregisteredRecord {
                type_name: "Project".to_string(),
            }
        );
    }

    #[rstest]
    fn test_repository_extending_registered_base() {
        let context = MapperContext::new(client());
        context.register::<Project>(project_schema()).unwrap();
        context
            .register_extending::<Project, Library>(registry::RecordSchema {
                attributes: IndexMap::from([(
                    "license".to_string(),
                    registry::AttributeSchema::default(),
                )]),
                ..Default::default()
            })
            .unwrap();
        let repository = context.repository::<Library>().unwrap();
        assert_eq!(repository.metadata().table(), "projects");
        assert!(repository.metadata().attributes().contains_key("license"));
    }
}
