//! In-memory storage contract tests.
//!
//! Run with: cargo test --test storage_mock
//!
//! No external dependencies required.

mod storage;

use video_density::storage::MockItemStore;

#[tokio::test]
async fn test_mock_item_store() {
    println!("=== Mock ItemStore Tests ===");

    let store = MockItemStore::new();
    run_item_store_tests!(&store);

    println!("=== All Mock ItemStore tests PASSED ===");
}
