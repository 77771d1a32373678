#![deny(missing_docs)]
#![deny(warnings)]

//! # DynamoDB Mapper
//!
//! An object-mapping layer over Amazon DynamoDB that turns typed record
//! declarations into native store requests:
//! - Declares table, key, and index metadata per record type, validated
//!   eagerly at registration
//! - Builds composite keys from templates like
//!   `"VER:{{version}}#REV:{{revision}}"` and parses stored keys back into
//!   record properties
//! - Compiles composable conditions and update actions into DynamoDB
//!   expression strings with collision-free `#a<N>`/`:v<N>` placeholders
//! - Runs get/put/query/scan/update/delete with automatic pagination and
//!   unprocessed-batch resubmission
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use aws_sdk_dynamodb::Client;
//! use dynamodb_mapper::context::MapperContext;
//! use dynamodb_mapper::expression::update::UpdateAction;
//! use dynamodb_mapper::repository::spec::{QueryConfig, SpecValue, UpdateValue};
//! use dynamodb_mapper::schema::key::{KeySchema, ScalarType};
//! use dynamodb_mapper::schema::registry::{AttributeSchema, RecordSchema, SortKeySchema, TableSchema};
//! use indexmap::IndexMap;
//! use serde::{Deserialize, Serialize};
//! use serde_json::Value;
//!
//! #[derive(Debug, Default, Deserialize, Serialize)]
//! struct Project {
//!     name: String,
//!     version: String,
//!     revision: u32,
//!     date: u64,
//! }
//!
//! impl dynamodb_mapper::record::Record for Project {}
//!
//! # async fn example(client: Client) -> Result<(), Box<dyn std::error::Error>> {
//! let context = MapperContext::new(client);
//! context.register::<Project>(RecordSchema {
//!     table: Some(TableSchema {
//!         name: "projects".to_string(),
//!         ..Default::default()
//!     }),
//!     partition_key: Some(KeySchema {
//!         expression: "{{name}}".to_string(),
//!         ..Default::default()
//!     }),
//!     sort_key: SortKeySchema::Key(KeySchema {
//!         expression: "VER:{{version}}#REV:{{revision}}".to_string(),
//!         ..Default::default()
//!     }),
//!     attributes: IndexMap::from([
//!         (
//!             "revision".to_string(),
//!             AttributeSchema {
//!                 scalar_type: Some(ScalarType::Number),
//!                 ..Default::default()
//!             },
//!         ),
//!         (
//!             "date".to_string(),
//!             AttributeSchema {
//!                 scalar_type: Some(ScalarType::Number),
//!                 ..Default::default()
//!             },
//!         ),
//!     ]),
//!     ..Default::default()
//! })?;
//!
//! let repository = context.repository::<Project>()?;
//! repository
//!     .put(Project {
//!         name: "PROJECT_A".to_string(),
//!         version: "Initial".to_string(),
//!         revision: 515,
//!         date: 1662541189,
//!     })
//!     .await?;
//!
//! // Every record under the partition, sort key matched by prefix
//! let projects = repository
//!     .query::<Value>(
//!         IndexMap::from([(
//!             "name".to_string(),
//!             SpecValue::Value(Value::String("PROJECT_A".to_string())),
//!         )]),
//!         QueryConfig::default(),
//!     )
//!     .await?;
//!
//! // SET date = date + 10 against the key built from the plain values
//! let updated = repository
//!     .update::<Value>(IndexMap::from([
//!         (
//!             "name".to_string(),
//!             UpdateValue::Value(Value::String("PROJECT_A".to_string())),
//!         ),
//!         (
//!             "version".to_string(),
//!             UpdateValue::Value(Value::String("Initial".to_string())),
//!         ),
//!         (
//!             "revision".to_string(),
//!             UpdateValue::Value(Value::Number(515.into())),
//!         ),
//!         (
//!             "date".to_string(),
//!             UpdateValue::Action(UpdateAction::Increment(Value::Number(10.into()))),
//!         ),
//!     ]))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@schema`] - Key templates, metadata, and the registration machinery
//! - [`mod@expression`] - Condition and update expression building
//! - [`mod@mapper`] - Serialization between records and flat store items
//! - [`mod@repository`] - The typed operations over one record type
//! - [`mod@context`] - The per-process entry point

/// The explicit per-process context owning the client, registry, and
/// repository cache.
pub mod context;

/// Error taxonomy: eager configuration errors and per-operation failures.
pub mod error;

/// Condition and update expression building.
pub mod expression;

/// Serialization between typed records and flat store items.
pub mod mapper;

/// The trait a type implements to be mapped to table rows.
pub mod record;

/// Typed repositories over registered record types.
pub mod repository;

/// Record schema declarations and registration.
pub mod schema;
