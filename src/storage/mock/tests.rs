use crate::storage::{Item, ItemKey, ItemStore, RangeQuery, StorageError};

use super::*;

async fn seed(store: &MockItemStore, partition: &str, sorts: &[i64]) {
    for sort in sorts {
        store
            .put(Item::new(ItemKey::new(partition, *sort)).with_number("v", *sort))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_page_size_sets_last_evaluated_on_full_page() {
    let store = MockItemStore::with_page_size(2);
    seed(&store, "p", &[1, 2, 3, 4]).await;

    let first = store.query_range(RangeQuery::new("p", 0, 10)).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.last_evaluated, Some(ItemKey::new("p", 2)));

    let second = store
        .query_range(RangeQuery::new("p", 0, 10).start_after(first.last_evaluated))
        .await
        .unwrap();
    assert_eq!(second.items.len(), 2);
    // Full page: the key is reported even though nothing follows.
    assert_eq!(second.last_evaluated, Some(ItemKey::new("p", 4)));

    let third = store
        .query_range(RangeQuery::new("p", 0, 10).start_after(second.last_evaluated))
        .await
        .unwrap();
    assert!(third.items.is_empty());
    assert!(third.last_evaluated.is_none());
}

#[tokio::test]
async fn test_query_limit_and_page_size_take_the_smaller() {
    let store = MockItemStore::with_page_size(3);
    seed(&store, "p", &[1, 2, 3, 4, 5]).await;

    let page = store
        .query_range(RangeQuery::new("p", 0, 10).limit(Some(1)))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);

    let page = store
        .query_range(RangeQuery::new("p", 0, 10).limit(Some(10)))
        .await
        .unwrap();
    assert_eq!(page.items.len(), 3);
}

#[tokio::test]
async fn test_query_stays_within_partition() {
    let store = MockItemStore::new();
    seed(&store, "a", &[1, 2]).await;
    seed(&store, "b", &[1, 2, 3]).await;

    let page = store.query_range(RangeQuery::new("a", i64::MIN, i64::MAX)).await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.items.iter().all(|item| item.key.partition == "a"));
}

#[tokio::test]
async fn test_fail_queries_after() {
    let store = MockItemStore::new();
    seed(&store, "p", &[1]).await;
    store.fail_queries_after(1).await;

    assert!(store.query_range(RangeQuery::new("p", 0, 10)).await.is_ok());
    assert!(matches!(
        store.query_range(RangeQuery::new("p", 0, 10)).await,
        Err(StorageError::Unavailable(_))
    ));
    assert_eq!(store.query_count(), 2);
}

#[tokio::test]
async fn test_fail_on_get_and_put() {
    let store = MockItemStore::new();
    store.set_fail_on_put(true).await;
    assert!(store.put(Item::new(ItemKey::new("p", 1))).await.is_err());

    store.set_fail_on_put(false).await;
    store.put(Item::new(ItemKey::new("p", 1))).await.unwrap();

    store.set_fail_on_get(true).await;
    assert!(store.get(&ItemKey::new("p", 1)).await.is_err());
    assert_eq!(store.stored_count().await, 1);
}
