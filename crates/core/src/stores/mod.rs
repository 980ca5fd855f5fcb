pub mod dynamodb;
pub mod memory;

pub use dynamodb::DynamoDbChunkStore;
pub use memory::InMemoryChunkStore;
