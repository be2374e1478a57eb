//! DynamoDB storage integration tests.
//!
//! Run with: cargo test --test storage_dynamo --features dynamo -- --ignored --nocapture
//!
//! Requires: DynamoDB Local (DYNAMO_ENDPOINT, default http://localhost:8000)
//! and a table named by DYNAMO_TABLE (default "video-density-test") with
//! `pk` (S) as hash key and `sk` (N) as range key.
//!
//! Note: Tests use unique partitions to avoid data conflicts between runs.

mod storage;

use video_density::storage::DynamoItemStore;

fn dynamo_endpoint() -> String {
    std::env::var("DYNAMO_ENDPOINT").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

fn dynamo_table() -> String {
    std::env::var("DYNAMO_TABLE").unwrap_or_else(|_| "video-density-test".to_string())
}

#[tokio::test]
#[ignore = "requires running DynamoDB Local"]
async fn test_dynamo_item_store() {
    println!("=== DynamoDB ItemStore Tests ===");
    println!("Connecting to: {} ({})", dynamo_endpoint(), dynamo_table());

    let store = DynamoItemStore::new(dynamo_table(), Some(&dynamo_endpoint()))
        .await
        .expect("Failed to connect to DynamoDB");

    run_item_store_tests!(&store);

    println!("=== All DynamoDB ItemStore tests PASSED ===");
}
