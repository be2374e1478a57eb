//! ItemStore interface tests.
//!
//! These tests verify the contract of the ItemStore trait.
//! Each storage implementation should run these tests.

use video_density::storage::{
    AttributeValue, Item, ItemKey, ItemStore, PutCondition, RangeQuery, StorageError,
};

/// Partition name unique to this run, so backends can be reused.
pub fn test_partition(name: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("test_{}_{}", name, nanos)
}

/// Create a test item carrying a location attribute.
pub fn make_item(partition: &str, sort: i64, location: &str) -> Item {
    Item::new(ItemKey::new(partition, sort))
        .with_number("durationMillis", sort * 10)
        .with_string("location", location)
}

fn not_cloud() -> PutCondition {
    PutCondition::AbsentOrNotEqual {
        attribute: "location".to_string(),
        value: AttributeValue::String("CLOUD".to_string()),
    }
}

// =============================================================================
// ItemStore::get / put tests
// =============================================================================

pub async fn test_get_nonexistent<S: ItemStore>(store: &S) {
    let partition = test_partition("get_nonexistent");

    let item = store
        .get(&ItemKey::new(partition, 1))
        .await
        .expect("get should succeed");
    assert!(item.is_none(), "nonexistent item should be None");
}

pub async fn test_put_then_get<S: ItemStore>(store: &S) {
    let partition = test_partition("put_get");
    let item = make_item(&partition, 5, "DEVICE").with_number("negative", -3);

    store.put(item.clone()).await.expect("put should succeed");

    let stored = store
        .get(&item.key)
        .await
        .expect("get should succeed")
        .expect("item should exist");
    assert_eq!(stored, item);
}

pub async fn test_put_overwrites<S: ItemStore>(store: &S) {
    let partition = test_partition("put_overwrite");

    store
        .put(make_item(&partition, 1, "DEVICE"))
        .await
        .expect("put should succeed");
    store
        .put(make_item(&partition, 1, "CLOUD"))
        .await
        .expect("put should succeed");

    let stored = store
        .get(&ItemKey::new(partition, 1))
        .await
        .expect("get should succeed")
        .expect("item should exist");
    assert_eq!(stored.string("location").unwrap(), "CLOUD");
}

// =============================================================================
// ItemStore::conditional_put tests
// =============================================================================

pub async fn test_conditional_put_when_absent<S: ItemStore>(store: &S) {
    let partition = test_partition("cond_absent");

    store
        .conditional_put(make_item(&partition, 1, "DEVICE"), not_cloud())
        .await
        .expect("conditional put on empty key should succeed");

    let stored = store.get(&ItemKey::new(partition, 1)).await.unwrap();
    assert!(stored.is_some());
}

pub async fn test_conditional_put_when_attribute_differs<S: ItemStore>(store: &S) {
    let partition = test_partition("cond_differs");

    store.put(make_item(&partition, 1, "DEVICE")).await.unwrap();
    let replacement = make_item(&partition, 1, "DEVICE").with_number("durationMillis", 999);
    store
        .conditional_put(replacement, not_cloud())
        .await
        .expect("conditional put over DEVICE should succeed");

    let stored = store.get(&ItemKey::new(partition, 1)).await.unwrap().unwrap();
    assert_eq!(stored.number("durationMillis").unwrap(), 999);
}

pub async fn test_conditional_put_rejected<S: ItemStore>(store: &S) {
    let partition = test_partition("cond_rejected");
    let original = make_item(&partition, 1, "CLOUD");
    store.put(original.clone()).await.unwrap();

    let result = store
        .conditional_put(make_item(&partition, 1, "DEVICE"), not_cloud())
        .await;
    match result {
        Err(StorageError::ConditionFailed(key)) => assert_eq!(key, original.key),
        other => panic!("expected ConditionFailed, got {:?}", other),
    }

    let stored = store.get(&original.key).await.unwrap().unwrap();
    assert_eq!(stored, original, "rejected put must not modify the item");
}

// =============================================================================
// ItemStore::query_range tests
// =============================================================================

pub async fn test_query_range_sorted_and_bounded<S: ItemStore>(store: &S) {
    let partition = test_partition("query_bounded");
    for sort in [50, 10, 40, 20, 30, 60] {
        store.put(make_item(&partition, sort, "DEVICE")).await.unwrap();
    }

    let page = store
        .query_range(RangeQuery::new(partition.clone(), 20, 50))
        .await
        .expect("query should succeed");

    let sorts: Vec<i64> = page.items.iter().map(|item| item.key.sort).collect();
    assert_eq!(sorts, vec![20, 30, 40, 50], "bounds are inclusive and ordered");
    assert!(page.last_evaluated.is_none());
}

pub async fn test_query_range_pages_resume<S: ItemStore>(store: &S) {
    let partition = test_partition("query_pages");
    for sort in 1..=5 {
        store.put(make_item(&partition, sort, "DEVICE")).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut start_after = None;
    loop {
        let page = store
            .query_range(
                RangeQuery::new(partition.clone(), 1, 5)
                    .start_after(start_after)
                    .limit(Some(2)),
            )
            .await
            .expect("query should succeed");
        assert!(page.items.len() <= 2, "limit must be honoured");
        seen.extend(page.items.iter().map(|item| item.key.sort));
        match page.last_evaluated {
            Some(key) => start_after = Some(key),
            None => break,
        }
    }

    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

pub async fn test_query_range_partition_isolation<S: ItemStore>(store: &S) {
    let a = test_partition("iso_a");
    let b = test_partition("iso_b");
    store.put(make_item(&a, 1, "DEVICE")).await.unwrap();
    store.put(make_item(&b, 1, "DEVICE")).await.unwrap();
    store.put(make_item(&b, 2, "DEVICE")).await.unwrap();

    let page = store
        .query_range(RangeQuery::new(a.clone(), i64::MIN, i64::MAX))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].key.partition, a);
}

pub async fn test_query_range_empty<S: ItemStore>(store: &S) {
    let partition = test_partition("query_empty");

    let page = store
        .query_range(RangeQuery::new(partition, 0, 100))
        .await
        .expect("query should succeed");
    assert!(page.items.is_empty());
    assert!(page.last_evaluated.is_none());
}

#[macro_export]
macro_rules! run_item_store_tests {
    ($store:expr) => {
        use $crate::storage::item_store_tests::*;

        // get/put tests
        test_get_nonexistent($store).await;
        println!("  test_get_nonexistent: PASSED");

        test_put_then_get($store).await;
        println!("  test_put_then_get: PASSED");

        test_put_overwrites($store).await;
        println!("  test_put_overwrites: PASSED");

        // conditional_put tests
        test_conditional_put_when_absent($store).await;
        println!("  test_conditional_put_when_absent: PASSED");

        test_conditional_put_when_attribute_differs($store).await;
        println!("  test_conditional_put_when_attribute_differs: PASSED");

        test_conditional_put_rejected($store).await;
        println!("  test_conditional_put_rejected: PASSED");

        // query_range tests
        test_query_range_sorted_and_bounded($store).await;
        println!("  test_query_range_sorted_and_bounded: PASSED");

        test_query_range_pages_resume($store).await;
        println!("  test_query_range_pages_resume: PASSED");

        test_query_range_partition_isolation($store).await;
        println!("  test_query_range_partition_isolation: PASSED");

        test_query_range_empty($store).await;
        println!("  test_query_range_empty: PASSED");
    };
}
