//! Typed repositories over registered record types.
//!
//! A repository orchestrates the metadata, key templates, expression
//! builders, and item mapper of one record type against the store client.
//! Pagination and unprocessed-batch resubmission are handled here; every
//! other store failure propagates unchanged.

/// Query, scan, and update specifications.
pub mod spec;

mod input;

use crate::error::Error;
use crate::mapper;
use crate::record;
use crate::schema::metadata;

use aws_sdk_dynamodb::{Client, types};
use futures::future;
use serde::Serialize;
use serde_dynamo::{from_item, to_attribute_value, to_item};
use std::{collections, marker, sync};

const BATCH_GET_SIZE: usize = 100;
const BATCH_WRITE_SIZE: usize = 25;

/// Typed repository over one registered record type.
///
/// Repositories are cheap to clone: they share the store client and the
/// immutable metadata of their record type. Obtain one through
/// [`crate::context::MapperContext::repository`].
#[derive(Debug)]
pub struct Repository<T: record::Record> {
    client: Client,
    mapper: mapper::ItemMapper,
    record: marker::PhantomData<fn() -> T>,
}

impl<T: record::Record> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            mapper: self.mapper.clone(),
            record: marker::PhantomData,
        }
    }
}

impl<T: record::Record> Repository<T> {
    pub(crate) fn new(client: Client, metadata: sync::Arc<metadata::Metadata>) -> Self {
        Self {
            client,
            mapper: mapper::ItemMapper::new(metadata),
            record: marker::PhantomData,
        }
    }

    /// The metadata of the mapped record type.
    pub fn metadata(&self) -> &metadata::Metadata {
        self.mapper.metadata()
    }

    /// The item mapper of the mapped record type.
    pub fn mapper(&self) -> &mapper::ItemMapper {
        &self.mapper
    }

    fn table(&self) -> &str {
        self.metadata().table()
    }

    /// Fetch one record by its primary key.
    ///
    /// Non-key properties of the input are stripped by construction.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.get", skip_all, err)
    )]
    pub async fn get<K: Serialize>(&self, partial_key: &K) -> Result<Option<T>, Error> {
        let keys = self.mapper.key_map(partial_key)?;
        let output = self
            .client
            .get_item()
            .table_name(self.table())
            .set_key(Some(keys))
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;
        output.item.map(|item| self.mapper.deserialize(item)).transpose()
    }

    /// Fetch many records by their primary keys.
    ///
    /// Keys are batched in chunks of 100, all chunks issued concurrently;
    /// keys the store reports as unprocessed are re-requested until none
    /// remain. Empty input returns without a store call.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.get_many", skip_all, err)
    )]
    pub async fn get_many<K: Serialize>(&self, partial_keys: &[K]) -> Result<Vec<T>, Error> {
        if partial_keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::with_capacity(partial_keys.len());
        for partial_key in partial_keys {
            keys.push(self.mapper.key_map(partial_key)?);
        }
        let batches = future::try_join_all(
            keys.chunks(BATCH_GET_SIZE)
                .map(|chunk| self.get_batch(chunk.to_vec())),
        )
        .await?;
        let mut records = Vec::new();
        for batch in batches {
            for item in batch {
                records.push(self.mapper.deserialize(item)?);
            }
        }
        Ok(records)
    }

    async fn get_batch(
        &self,
        mut keys: Vec<collections::HashMap<String, types::AttributeValue>>,
    ) -> Result<Vec<collections::HashMap<String, types::AttributeValue>>, Error> {
        let mut items = Vec::new();
        while !keys.is_empty() {
            let attributes = types::KeysAndAttributes::builder()
                .set_keys(Some(keys))
                .build()
                .unwrap();
            let output = self
                .client
                .batch_get_item()
                .request_items(self.table(), attributes)
                .send()
                .await
                .map_err(aws_sdk_dynamodb::Error::from)?;
            if let Some(mut responses) = output.responses {
                if let Some(found) = responses.remove(self.table()) {
                    items.extend(found);
                }
            }
            keys = output
                .unprocessed_keys
                .unwrap_or_default()
                .remove(self.table())
                .map(|attributes| attributes.keys)
                .unwrap_or_default();
        }
        Ok(items)
    }

    /// Write one record, replacing any existing row under the same key.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.put", skip_all, err)
    )]
    pub async fn put(&self, mut record: T) -> Result<(), Error> {
        record.pre_put();
        let item = self.mapper.serialize(&record)?;
        self.client
            .put_item()
            .table_name(self.table())
            .set_item(Some(item))
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;
        Ok(())
    }

    /// Write many records in batches of 25.
    ///
    /// Batches are issued concurrently; requests the store reports as
    /// unprocessed are resubmitted until none remain.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.put_all", skip_all, err)
    )]
    pub async fn put_all(&self, records: Vec<T>) -> Result<(), Error> {
        if records.is_empty() {
            return Ok(());
        }
        let mut requests = Vec::with_capacity(records.len());
        for mut record in records {
            record.pre_put();
            let item = self.mapper.serialize(&record)?;
            let put_request = types::PutRequest::builder()
                .set_item(Some(item))
                .build()
                .unwrap();
            requests.push(
                types::WriteRequest::builder()
                    .put_request(put_request)
                    .build(),
            );
        }
        self.write_batches(requests).await
    }

    /// Delete one record by its primary key.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.delete", skip_all, err)
    )]
    pub async fn delete<K: Serialize>(&self, partial_key: &K) -> Result<(), Error> {
        let keys = self.mapper.key_map(partial_key)?;
        self.client
            .delete_item()
            .table_name(self.table())
            .set_key(Some(keys))
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;
        Ok(())
    }

    /// Delete many records in batches of 25, symmetric to [`Self::put_all`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.delete_all", skip_all, err)
    )]
    pub async fn delete_all<K: Serialize>(&self, partial_keys: &[K]) -> Result<(), Error> {
        if partial_keys.is_empty() {
            return Ok(());
        }
        let mut requests = Vec::with_capacity(partial_keys.len());
        for partial_key in partial_keys {
            let keys = self.mapper.key_map(partial_key)?;
            let delete_request = types::DeleteRequest::builder()
                .set_key(Some(keys))
                .build()
                .unwrap();
            requests.push(
                types::WriteRequest::builder()
                    .delete_request(delete_request)
                    .build(),
            );
        }
        self.write_batches(requests).await
    }

    async fn write_batches(&self, requests: Vec<types::WriteRequest>) -> Result<(), Error> {
        future::try_join_all(
            requests
                .chunks(BATCH_WRITE_SIZE)
                .map(|chunk| self.write_batch(chunk.to_vec())),
        )
        .await?;
        Ok(())
    }

    async fn write_batch(&self, mut requests: Vec<types::WriteRequest>) -> Result<(), Error> {
        while !requests.is_empty() {
            let output = self
                .client
                .batch_write_item()
                .request_items(self.table(), requests)
                .send()
                .await
                .map_err(aws_sdk_dynamodb::Error::from)?;
            requests = output
                .unprocessed_items
                .unwrap_or_default()
                .remove(self.table())
                .unwrap_or_default();
        }
        Ok(())
    }

    /// Query the table or a named index.
    ///
    /// The specification must supply a plain value for every partition key
    /// template property. A partially supplied sort key becomes a key
    /// condition using the configured operator; every other entry becomes a
    /// filter. Pages are followed until the store returns no cursor.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.query", skip_all, err)
    )]
    pub async fn query<V: Serialize>(
        &self,
        specification: spec::QuerySpec<V>,
        config: spec::QueryConfig,
    ) -> Result<Vec<T>, Error> {
        let (partition_key, sort_key) = self
            .metadata()
            .key_definitions_for(config.index.as_deref())?;
        let input = input::QueryInput::new(
            self.metadata(),
            partition_key,
            sort_key,
            specification,
            config.sort_key_operator,
        )?;
        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let output = self
                .client
                .query()
                .table_name(self.table())
                .set_index_name(config.index.clone())
                .key_condition_expression(input.key_condition_expression.clone())
                .set_filter_expression(input.filter_expression.clone())
                .set_expression_attribute_names(Some(input.expression_attribute_names.clone()))
                .set_expression_attribute_values(non_empty(
                    input.expression_attribute_values.clone(),
                ))
                .set_exclusive_start_key(cursor.take())
                .send()
                .await
                .map_err(aws_sdk_dynamodb::Error::from)?;
            for item in output.items.unwrap_or_default() {
                records.push(self.mapper.deserialize_with_keys(item, partition_key, sort_key)?);
            }
            cursor = output.last_evaluated_key;
            if cursor.is_none() {
                break;
            }
        }
        Ok(records)
    }

    /// Scan the table or a named index.
    ///
    /// Supplied key template properties become string match filters (prefix,
    /// containment, or exact checks); every other entry becomes a plain
    /// filter. Pagination follows the query behavior.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.scan", skip_all, err)
    )]
    pub async fn scan<V: Serialize>(
        &self,
        specification: spec::QuerySpec<V>,
        config: spec::ScanConfig,
    ) -> Result<Vec<T>, Error> {
        let (partition_key, sort_key) = self
            .metadata()
            .key_definitions_for(config.index.as_deref())?;
        let input =
            input::ScanInput::new(self.metadata(), partition_key, sort_key, specification)?;
        let mut records = Vec::new();
        let mut cursor = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(self.table())
                .set_index_name(config.index.clone())
                .set_filter_expression(input.filter_expression.clone())
                .set_expression_attribute_names(non_empty(
                    input.expression_attribute_names.clone(),
                ))
                .set_expression_attribute_values(non_empty(
                    input.expression_attribute_values.clone(),
                ))
                .set_exclusive_start_key(cursor.take())
                .send()
                .await
                .map_err(aws_sdk_dynamodb::Error::from)?;
            for item in output.items.unwrap_or_default() {
                records.push(self.mapper.deserialize_with_keys(item, partition_key, sort_key)?);
            }
            cursor = output.last_evaluated_key;
            if cursor.is_none() {
                break;
            }
        }
        Ok(records)
    }

    /// Update one record and return its post-update state.
    ///
    /// Plain values are overlaid on a blank record to resolve the key and
    /// run the pre-update hook; update actions take precedence over plain
    /// values when the expression is built. The store's post-update item is
    /// merged over the resolved record.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.update", skip_all, err)
    )]
    pub async fn update<V: Serialize>(&self, specification: spec::UpdateSpec<V>) -> Result<T, Error> {
        let mut item: collections::HashMap<String, types::AttributeValue> =
            to_item(T::default())?;
        let mut entries = Vec::with_capacity(specification.len());
        for (property, value) in specification {
            match value {
                spec::UpdateValue::Value(value) => {
                    let value: types::AttributeValue = to_attribute_value(value)?;
                    item.insert(property.clone(), value.clone());
                    entries.push((property, input::UpdateEntry::Value(value)));
                }
                spec::UpdateValue::Action(action) => {
                    entries.push((property, input::UpdateEntry::Action(action)));
                }
            }
        }
        let mut record: T = from_item(item)?;
        record.pre_update();
        let props = mapper::properties(&record)?;
        let keys = self.mapper.key_map(&record)?;
        let input = input::UpdateInput::new(self.metadata(), entries, &props)?;
        let output = self
            .client
            .update_item()
            .table_name(self.table())
            .set_key(Some(keys))
            .set_update_expression(input.update_expression)
            .set_expression_attribute_names(non_empty(input.expression_attribute_names))
            .set_expression_attribute_values(non_empty(input.expression_attribute_values))
            .return_values(types::ReturnValue::AllNew)
            .send()
            .await
            .map_err(aws_sdk_dynamodb::Error::from)?;
        let item = output.attributes.unwrap_or_default();
        self.mapper.deserialize_over(
            props,
            item,
            self.metadata().partition_key(),
            self.metadata().sort_key(),
        )
    }

    /// Apply [`Self::update`] to each specification concurrently.
    ///
    /// Results are returned in input order; a failure in any update
    /// propagates without rolling back its in-flight siblings.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.update_all", skip_all, err)
    )]
    pub async fn update_all<V: Serialize>(
        &self,
        specifications: Vec<spec::UpdateSpec<V>>,
    ) -> Result<Vec<T>, Error> {
        future::try_join_all(
            specifications
                .into_iter()
                .map(|specification| self.update(specification)),
        )
        .await
    }
}

fn non_empty<K, V>(map: collections::HashMap<K, V>) -> Option<collections::HashMap<K, V>> {
    (!map.is_empty()).then_some(map)
}
