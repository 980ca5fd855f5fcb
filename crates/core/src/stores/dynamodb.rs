use crate::error::StoreError;
use crate::store::{ChunkItem, TableSpec, TableStatus, PARTITION_KEY_ATTRIBUTE, TEXT_ATTRIBUTE};
use crate::traits::ChunkStore;
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    PutRequest, ScalarAttributeType, TableStatus as DynamoTableStatus, WriteRequest,
};
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use tracing::debug;

pub struct DynamoDbChunkStore {
    client: Client,
}

impl DynamoDbChunkStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChunkStore for DynamoDbChunkStore {
    async fn create_table(&self, spec: &TableSpec) -> Result<(), StoreError> {
        let key_schema = KeySchemaElement::builder()
            .attribute_name(&spec.partition_key)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|error| invalid_request("create_table", error))?;
        let attribute = AttributeDefinition::builder()
            .attribute_name(&spec.partition_key)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|error| invalid_request("create_table", error))?;
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(spec.read_capacity)
            .write_capacity_units(spec.write_capacity)
            .build()
            .map_err(|error| invalid_request("create_table", error))?;

        let result = self
            .client
            .create_table()
            .table_name(&spec.name)
            .key_schema(key_schema)
            .attribute_definitions(attribute)
            .provisioned_throughput(throughput)
            .send()
            .await;

        match result {
            Ok(output) => {
                debug!(
                    table = %spec.name,
                    status = ?output.table_description().and_then(|table| table.table_status()),
                    "create_table accepted"
                );
                Ok(())
            }
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_resource_in_use_exception()) =>
            {
                Err(StoreError::TableAlreadyExists(spec.name.clone()))
            }
            Err(error) => Err(StoreError::backend(
                "create_table",
                DisplayErrorContext(&error),
            )),
        }
    }

    async fn table_status(&self, table: &str) -> Result<TableStatus, StoreError> {
        let result = self.client.describe_table().table_name(table).send().await;

        match result {
            Ok(output) => {
                let status = output.table().and_then(|description| description.table_status());
                Ok(table_status_of(status))
            }
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_resource_not_found_exception()) =>
            {
                Ok(TableStatus::Missing)
            }
            Err(error) => Err(StoreError::backend(
                "describe_table",
                DisplayErrorContext(&error),
            )),
        }
    }

    async fn batch_put(&self, table: &str, items: &[ChunkItem]) -> Result<Vec<String>, StoreError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let requests = items
            .iter()
            .map(|item| {
                let put = PutRequest::builder()
                    .item(
                        PARTITION_KEY_ATTRIBUTE,
                        AttributeValue::S(item.chunk_id.clone()),
                    )
                    .item(TEXT_ATTRIBUTE, text_attribute(&item.text))
                    .build()
                    .map_err(|error| invalid_request("batch_write_item", error))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(|error| StoreError::backend("batch_write_item", DisplayErrorContext(&error)))?;

        Ok(output
            .unprocessed_items()
            .map(|unprocessed| unprocessed_keys(table, unprocessed))
            .unwrap_or_default())
    }
}

/// Valid UTF-8 is stored as a string attribute; anything else as binary.
fn text_attribute(payload: &[u8]) -> AttributeValue {
    match std::str::from_utf8(payload) {
        Ok(text) => AttributeValue::S(text.to_string()),
        Err(_) => AttributeValue::B(Blob::new(payload.to_vec())),
    }
}

fn unprocessed_keys(table: &str, unprocessed: &HashMap<String, Vec<WriteRequest>>) -> Vec<String> {
    unprocessed
        .get(table)
        .map(|requests| {
            requests
                .iter()
                .filter_map(WriteRequest::put_request)
                .filter_map(|put| put.item().get(PARTITION_KEY_ATTRIBUTE))
                .filter_map(|value| value.as_s().ok())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

fn invalid_request(operation: &str, error: impl ToString) -> StoreError {
    StoreError::InvalidRequest {
        operation: operation.to_string(),
        details: error.to_string(),
    }
}

fn table_status_of(status: Option<&DynamoTableStatus>) -> TableStatus {
    match status {
        Some(DynamoTableStatus::Active) => TableStatus::Active,
        Some(DynamoTableStatus::Creating) => TableStatus::Creating,
        Some(DynamoTableStatus::Updating) => TableStatus::Updating,
        Some(other) => TableStatus::Other(other.as_str().to_string()),
        None => TableStatus::Other("unknown".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{table_status_of, text_attribute, unprocessed_keys};
    use crate::store::TableStatus;
    use aws_sdk_dynamodb::types::TableStatus as DynamoTableStatus;
    use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
    use std::collections::HashMap;

    fn put_request(key: &str) -> WriteRequest {
        let put = PutRequest::builder()
            .item("chunk_id", AttributeValue::S(key.to_string()))
            .item("text", AttributeValue::S("payload".to_string()))
            .build()
            .expect("item is set");
        WriteRequest::builder().put_request(put).build()
    }

    #[test]
    fn updating_tables_still_accept_writes() {
        let status = table_status_of(Some(&DynamoTableStatus::Updating));
        assert_eq!(status, TableStatus::Updating);
        assert!(status.accepts_writes());
    }

    #[test]
    fn deleting_tables_do_not_accept_writes() {
        let status = table_status_of(Some(&DynamoTableStatus::Deleting));
        assert_eq!(status, TableStatus::Other("DELETING".to_string()));
        assert!(!status.accepts_writes());
    }

    #[test]
    fn utf8_payloads_become_string_attributes() {
        assert_eq!(
            text_attribute("Überdruck".as_bytes()),
            AttributeValue::S("Überdruck".to_string())
        );
    }

    #[test]
    fn split_characters_fall_back_to_binary() {
        let payload = &"é".as_bytes()[..1];
        assert!(text_attribute(payload).is_b());
    }

    #[test]
    fn unprocessed_items_map_back_to_chunk_keys() {
        let mut unprocessed = HashMap::new();
        unprocessed.insert(
            "data".to_string(),
            vec![put_request("doc_3"), put_request("doc_9")],
        );
        unprocessed.insert("other".to_string(), vec![put_request("ignored_0")]);

        assert_eq!(
            unprocessed_keys("data", &unprocessed),
            vec!["doc_3".to_string(), "doc_9".to_string()]
        );
        assert!(unprocessed_keys("missing", &unprocessed).is_empty());
    }
}
