//! Integration tests for the stock ledger pipeline.
//!
//! Tests: StockLedger → ItemStore::within_item → item counters + transaction log
//!
//! Verifies:
//! - Worked examples for each operation and its rejections
//! - Exactly one transaction row per success, none per failure
//! - Replaying the log reproduces the counters
//! - No lost updates under concurrent callers on one item
//! - Work on one item does not wait for another item

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;

    use stockroom_core::{ItemId, UserId};
    use stockroom_inventory::{replay, NewItem, StockLevels, StockOperation, TransactionType};

    use crate::ledger::{LedgerError, StockLedger};
    use crate::store::{InMemoryItemStore, ItemStore, ItemWork};

    type Ledger = StockLedger<Arc<InMemoryItemStore>>;

    fn setup() -> (Ledger, Arc<InMemoryItemStore>) {
        let store = Arc::new(InMemoryItemStore::new());
        (StockLedger::new(store.clone()), store)
    }

    async fn seed(store: &InMemoryItemStore, stock: i64) -> ItemId {
        let new = NewItem::new(format!("SKU-{}", ItemId::new()), "Widget")
            .with_stock(stock)
            .validate()
            .unwrap();
        store.create_item(new, UserId::new()).await.unwrap().id
    }

    async fn row_count(store: &InMemoryItemStore, id: ItemId) -> usize {
        store.transactions(id, usize::MAX).await.unwrap().len()
    }

    async fn levels(store: &InMemoryItemStore, id: ItemId) -> StockLevels {
        store.levels(id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn issue_then_overdraw_is_rejected_without_side_effects() {
        let (ledger, store) = setup();
        let id = seed(&store, 10).await;
        let actor = UserId::new();

        let item = ledger.issue(id, 5, None, actor).await.unwrap();
        assert_eq!((item.stock(), item.issued()), (5, 5));

        let err = ledger.issue(id, 10, None, actor).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                requested: 10,
                available: 5
            }
        );
        assert_eq!(levels(&store, id).await, StockLevels::new(5, 5));
        // seed row + one issue
        assert_eq!(row_count(&store, id).await, 2);
    }

    #[tokio::test]
    async fn return_beyond_issued_is_rejected() {
        let (ledger, store) = setup();
        let id = seed(&store, 10).await;
        let actor = UserId::new();
        ledger.issue(id, 5, None, actor).await.unwrap();

        let err = ledger.return_stock(id, 6, None, actor).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::ReturnExceedsIssued {
                requested: 6,
                issued: 5
            }
        );
        assert_eq!(levels(&store, id).await, StockLevels::new(5, 5));

        let item = ledger.return_stock(id, 5, None, actor).await.unwrap();
        assert_eq!((item.stock(), item.issued()), (10, 0));
    }

    #[tokio::test]
    async fn adjust_cannot_drive_stock_negative() {
        let (ledger, store) = setup();
        let id = seed(&store, 3).await;
        let actor = UserId::new();

        let err = ledger.adjust(id, -5, None, actor).await.unwrap_err();
        assert_eq!(err, LedgerError::NegativeResultingStock { stock: 3, delta: -5 });
        assert_eq!(levels(&store, id).await, StockLevels::new(3, 0));

        let item = ledger.adjust(id, -3, Some("recount".to_string()), actor).await.unwrap();
        assert_eq!(item.stock(), 0);

        let rows = store.transactions(id, 1).await.unwrap();
        assert_eq!(rows[0].kind, TransactionType::Adjust);
        assert_eq!(rows[0].qty, -3);
        assert_eq!(rows[0].note.as_deref(), Some("recount"));
    }

    #[tokio::test]
    async fn invalid_quantities_are_rejected_before_storage() {
        let (ledger, store) = setup();
        let id = seed(&store, 3).await;
        let actor = UserId::new();

        for result in [
            ledger.receive(id, 0, None, actor).await,
            ledger.issue(id, -1, None, actor).await,
            ledger.dispose(id, 0, None, actor).await,
            ledger.adjust(id, 0, None, actor).await,
        ] {
            assert!(matches!(result, Err(LedgerError::InvalidQuantity(_))));
        }
        assert_eq!(row_count(&store, id).await, 1);

        // Quantity validation wins over existence.
        let missing = ItemId::new();
        let err = ledger.receive(missing, 0, None, actor).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity(_)));
        let err = ledger.receive(missing, 1, None, actor).await.unwrap_err();
        assert_eq!(err, LedgerError::NotFound(missing));
    }

    #[tokio::test]
    async fn dispose_leaves_issued_alone() {
        let (ledger, store) = setup();
        let id = seed(&store, 8).await;
        let actor = UserId::new();
        ledger.issue(id, 2, None, actor).await.unwrap();

        let item = ledger.dispose(id, 6, None, actor).await.unwrap();
        assert_eq!((item.stock(), item.issued()), (0, 2));

        let err = ledger.dispose(id, 1, None, actor).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { .. }));
    }

    #[tokio::test]
    async fn operations_on_archived_items_are_allowed() {
        let (ledger, store) = setup();
        let id = seed(&store, 1).await;
        store
            .set_status(&[id], stockroom_inventory::ItemStatus::Archived)
            .await
            .unwrap();
        let item = ledger.receive(id, 4, None, UserId::new()).await.unwrap();
        assert!(item.is_archived());
        assert_eq!(item.stock(), 5);
    }

    #[tokio::test]
    async fn each_row_records_the_state_it_produced() {
        let (ledger, store) = setup();
        let id = seed(&store, 0).await;
        let actor = UserId::new();

        ledger.receive(id, 10, None, actor).await.unwrap();
        ledger.issue(id, 4, None, actor).await.unwrap();
        ledger.return_stock(id, 1, None, actor).await.unwrap();
        ledger.adjust(id, 2, None, actor).await.unwrap();
        ledger.dispose(id, 3, None, actor).await.unwrap();

        let mut rows = store.transactions(id, usize::MAX).await.unwrap();
        rows.reverse();
        let kinds: Vec<_> = rows.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            [
                TransactionType::Receive,
                TransactionType::Issue,
                TransactionType::Return,
                TransactionType::Adjust,
                TransactionType::Dispose,
            ]
        );
        for row in &rows {
            assert_eq!(row.actor, actor);
            assert_eq!(row.item_id, id);
        }

        let current = levels(&store, id).await;
        assert_eq!(current, StockLevels::new(6, 3));
        assert_eq!(replay(rows.iter()).unwrap(), current);
        assert_eq!(rows.last().unwrap().levels_after(), current);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_receives_are_not_lost() {
        const N: usize = 200;
        let (ledger, store) = setup();
        let ledger = Arc::new(ledger);
        let id = seed(&store, 0).await;

        let mut handles = Vec::with_capacity(N);
        for _ in 0..N {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.receive(id, 1, None, UserId::new()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(levels(&store, id).await, StockLevels::new(N as i64, 0));
        let rows = store.transactions(id, usize::MAX).await.unwrap();
        assert_eq!(rows.len(), N);
        assert!(rows.iter().all(|r| r.kind == TransactionType::Receive && r.qty == 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_issues_never_oversell() {
        let (ledger, store) = setup();
        let ledger = Arc::new(ledger);
        let id = seed(&store, 50).await;

        let mut handles = Vec::new();
        for _ in 0..80 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.issue(id, 1, None, UserId::new()).await
            }));
        }
        let mut ok = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(LedgerError::InsufficientStock { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!((ok, rejected), (50, 30));
        assert_eq!(levels(&store, id).await, StockLevels::new(0, 50));
        // seed row + successful issues only
        assert_eq!(row_count(&store, id).await, 51);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn work_on_one_item_does_not_block_another() {
        let (ledger, store) = setup();
        let a = seed(&store, 1).await;
        let b = seed(&store, 1).await;

        let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let holder = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .within_item(
                        a,
                        Box::new(move |_: &mut ItemWork| {
                            let _ = started_tx.send(());
                            let _ = release_rx.recv();
                            Ok(())
                        }),
                    )
                    .await
            })
        };

        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();

        let other = tokio::time::timeout(
            Duration::from_secs(2),
            ledger.receive(b, 1, None, UserId::new()),
        )
        .await
        .expect("item b blocked behind item a")
        .unwrap();
        assert_eq!(other.stock(), 2);

        release_tx.send(()).unwrap();
        holder.await.unwrap().unwrap();
    }

    fn op_strategy() -> impl Strategy<Value = StockOperation> {
        prop_oneof![
            (-3i64..8).prop_map(|qty| StockOperation::Issue { qty }),
            (-3i64..8).prop_map(|qty| StockOperation::Receive { qty }),
            (-8i64..8).prop_map(|delta| StockOperation::Adjust { delta }),
            (-3i64..8).prop_map(|qty| StockOperation::Return { qty }),
            (-3i64..8).prop_map(|qty| StockOperation::Dispose { qty }),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn log_and_counters_stay_consistent(seed_stock in 0i64..10, ops in proptest::collection::vec(op_strategy(), 0..40)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (ledger, store) = setup();
                let id = seed(&store, seed_stock).await;
                let mut expected_rows = row_count(&store, id).await;

                for op in ops {
                    let before = levels(&store, id).await;
                    match ledger.apply(id, op, None, UserId::new()).await {
                        Ok(item) => {
                            expected_rows += 1;
                            let rows = store.transactions(id, 1).await.unwrap();
                            prop_assert_eq!(rows[0].levels_after(), item.levels());
                            prop_assert_eq!(
                                item.stock() - before.stock,
                                rows[0].stock_delta()
                            );
                        }
                        Err(_) => prop_assert_eq!(levels(&store, id).await, before),
                    }
                    let now = levels(&store, id).await;
                    prop_assert!(now.stock >= 0 && now.issued >= 0);
                    prop_assert_eq!(row_count(&store, id).await, expected_rows);
                }

                let rows = store.transactions(id, usize::MAX).await.unwrap();
                prop_assert_eq!(replay(rows.iter().rev()).unwrap(), levels(&store, id).await);
                Ok(())
            })?;
        }
    }
}
