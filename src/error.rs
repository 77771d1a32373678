use crate::schema;

use thiserror::Error as ThisError;

/// Error raised while registering a record type.
///
/// Configuration problems are detected eagerly, at registration time, so that
/// calling code can never obtain a repository in a broken state.
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ConfigurationError {
    /// The record type was registered more than once.
    #[error("record type `{type_name}` is already registered")]
    AlreadyRegistered {
        /// The name of the record type.
        type_name: String,
    },
    /// No table name was declared for the record type.
    #[error("record type `{type_name}` has no table name")]
    MissingTable {
        /// The name of the record type.
        type_name: String,
    },
    /// The partition key expression is empty or whitespace.
    #[error("partition key expression for record type `{type_name}` is empty")]
    EmptyPartitionKeyExpression {
        /// The name of the record type.
        type_name: String,
    },
    /// A sort key was declared without a template expression.
    #[error("sort key for record type `{type_name}` has no expression")]
    MissingSortKeyExpression {
        /// The name of the record type.
        type_name: String,
    },
    /// A key expression contains two placeholders with no static separator.
    ///
    /// Such a template cannot be inverse-parsed unambiguously.
    #[error("key expression `{expression}` contains adjacent placeholders")]
    AdjacentPlaceholders {
        /// The offending template expression.
        expression: String,
    },
    /// A key expression opens a placeholder that is never closed.
    #[error("key expression `{expression}` contains an unterminated placeholder")]
    UnterminatedPlaceholder {
        /// The offending template expression.
        expression: String,
    },
    /// Index expressions reference indexes the table does not declare.
    #[error("indexes [{indexes}] are not declared on table `{table}`")]
    UndeclaredIndexes {
        /// The table name.
        table: String,
        /// Comma-separated names of the missing indexes.
        indexes: String,
    },
    /// Index expressions exist but the table declares no indexes at all.
    #[error("record type `{type_name}` configures index expressions but its table declares no indexes")]
    NoIndexesDeclared {
        /// The name of the record type.
        type_name: String,
    },
    /// A base record type was named at registration but is not registered.
    #[error("base record type `{type_name}` is not registered")]
    UnregisteredBase {
        /// The name of the base record type.
        type_name: String,
    },
    /// A repository or metadata lookup targeted an unregistered record type.
    #[error("record type `{type_name}` is not registered")]
    UnregisteredRecord {
        /// The name of the record type.
        type_name: String,
    },
    /// A query or scan named an index the record's table does not declare.
    #[error("index `{index}` is not declared on table `{table}`")]
    UnknownIndex {
        /// The table name.
        table: String,
        /// The requested index name.
        index: String,
    },
}

/// Error raised by a repository operation.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The record type configuration is invalid or missing.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A record or value failed to serialize or deserialize.
    #[error(transparent)]
    Serde(#[from] serde_dynamo::Error),
    /// The store reported a failure.
    ///
    /// Store failures are passed through unchanged; this layer performs no
    /// retry beyond the unprocessed-batch continuation.
    #[error(transparent)]
    Store(#[from] aws_sdk_dynamodb::Error),
    /// A key template placeholder had no value to substitute.
    #[error("missing value for key template property `{property}`")]
    MissingTemplateProperty {
        /// The template property name.
        property: String,
    },
    /// A stored key value does not match its template's static structure.
    #[error("value `{value}` does not match key template `{template}`")]
    TemplateMismatch {
        /// The template expression.
        template: String,
        /// The stored key value.
        value: String,
    },
    /// A value declared as a number failed to parse as one.
    #[error("value `{value}` is not a number")]
    InvalidNumber {
        /// The offending value.
        value: String,
    },
    /// A key template property held a value with no scalar string form.
    #[error("property `{property}` holds a value that cannot appear in a key")]
    UnsupportedKeyValue {
        /// The property name.
        property: String,
    },
    /// An attribute value could not be coerced to its declared scalar type.
    #[error("attribute `{name}` cannot be coerced to {expected:?}")]
    IncompatibleValue {
        /// The attribute name.
        name: String,
        /// The declared scalar type.
        expected: schema::key::ScalarType,
    },
    /// A set action mixed string and number members, or used another kind.
    #[error("set values must be all strings or all numbers")]
    MixedValueSet,
}
