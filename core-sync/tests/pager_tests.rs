//! Pager behaviour against a mocked source.

use async_trait::async_trait;
use bridge_traits::{
    FetchError, ItemEnvelope, ItemId, Page, PageParams, PayloadMode, RawPayload, SourceAdapter,
    SourceCapabilities, SourceId,
};
use core_sync::{Checkpoint, CursorStrategy, Pacer, PageFilters, PageOutcome, Pager, PagerOptions};
use mockall::{mock, Sequence};
use serde_json::Value;

const T: i64 = 1_600_000_000;

mock! {
    Source {}

    #[async_trait]
    impl SourceAdapter for Source {
        fn source_id(&self) -> &SourceId;
        fn capabilities(&self) -> SourceCapabilities;
        async fn list_page(&self, params: &PageParams) -> Result<Page, FetchError>;
        async fn fetch_payload(&self, id: ItemId) -> Result<RawPayload, FetchError>;
    }
}

fn source(max_page_size: u32) -> MockSource {
    let mut source = MockSource::new();
    source.expect_source_id().return_const(SourceId::new("mock"));
    source.expect_capabilities().return_const(SourceCapabilities {
        max_page_size,
        payload: PayloadMode::Separate,
        remote: true,
    });
    source
}

fn page(items: &[(u64, i64)], total: Option<u64>) -> Page {
    Page {
        items: items
            .iter()
            .map(|&(id, time)| ItemEnvelope::new(id, time, Value::Null))
            .collect(),
        total,
        offset: 0,
        skipped: 0,
    }
}

fn item_ids(outcome: &PageOutcome) -> Vec<u64> {
    match outcome {
        PageOutcome::More(items) => items.iter().map(|item| item.id.get()).collect(),
        other => panic!("expected a page of items, got {:?}", other),
    }
}

#[tokio::test]
async fn test_listing_params_carry_since_and_filters() {
    let mut source = source(50);
    source
        .expect_list_page()
        .withf(|params| {
            params.offset == 20
                && params.limit == 50
                && params.since == Some(T)
                && params.players == vec![76_561_197_960_265_729]
        })
        .times(1)
        .returning(|_| Ok(page(&[], Some(20))));

    let checkpoint = Checkpoint {
        since: T,
        last_seen_id: None,
        offset: 20,
    };
    let options = PagerOptions {
        page_size: 1000,
        max_count: None,
        filters: PageFilters {
            players: vec![76_561_197_960_265_729],
            ..Default::default()
        },
    };
    let mut pager = Pager::new(&source, CursorStrategy::Incremental, checkpoint, options);
    assert_eq!(pager.limit(), 50);

    let outcome = pager.next_page(&mut Pacer::disabled()).await;
    assert_eq!(outcome, PageOutcome::Done);
}

#[tokio::test]
async fn test_listing_error_aborts_and_stays_finished() {
    let mut source = source(1000);
    source
        .expect_list_page()
        .times(1)
        .returning(|_| Err(FetchError::from_status(403, "forbidden")));

    let mut pager = Pager::new(
        &source,
        CursorStrategy::Incremental,
        Checkpoint::default(),
        PagerOptions::default(),
    );
    let mut pacer = Pacer::disabled();

    assert!(matches!(
        pager.next_page(&mut pacer).await,
        PageOutcome::Aborted(FetchError::Fatal {
            status: Some(403),
            ..
        })
    ));
    assert_eq!(pager.next_page(&mut pacer).await, PageOutcome::Done);
}

#[tokio::test]
async fn test_unknown_total_stops_on_page_without_fresh_items() {
    let mut source = source(50);
    let mut seq = Sequence::new();
    source
        .expect_list_page()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(page(&[(12, T + 12), (11, T + 11), (10, T + 10)], None)));
    source
        .expect_list_page()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(page(&[(9, T + 9), (8, T + 8)], None)));

    let checkpoint = Checkpoint {
        since: 0,
        last_seen_id: Some(ItemId(9)),
        offset: 0,
    };
    let mut pager = Pager::new(
        &source,
        CursorStrategy::Incremental,
        checkpoint,
        PagerOptions::default(),
    );
    let mut pacer = Pacer::disabled();

    assert_eq!(item_ids(&pager.next_page(&mut pacer).await), vec![12, 11, 10]);
    assert_eq!(pager.next_page(&mut pacer).await, PageOutcome::Done);

    let next = pager.checkpoint();
    assert_eq!(next.last_seen_id, Some(ItemId(12)));
    assert_eq!(next.since, T + 12);
}

#[tokio::test]
async fn test_out_of_order_ids_above_low_water_are_skipped() {
    let mut source = source(1000);
    source
        .expect_list_page()
        .times(1)
        .returning(|_| Ok(page(&[(20, T + 20), (15, T + 15), (18, T + 18)], Some(3))));

    let mut pager = Pager::new(
        &source,
        CursorStrategy::Incremental,
        Checkpoint::default(),
        PagerOptions::default(),
    );
    let mut pacer = Pacer::disabled();

    assert_eq!(item_ids(&pager.next_page(&mut pacer).await), vec![20, 15]);
    assert_eq!(pager.next_page(&mut pacer).await, PageOutcome::Done);
    assert_eq!(pager.emitted(), 2);
}

#[tokio::test]
async fn test_reverse_with_empty_source_keeps_checkpoint() {
    let mut source = source(1000);
    source
        .expect_list_page()
        .withf(|params| params.offset == 0 && params.limit == 1)
        .times(1)
        .returning(|_| Ok(page(&[], Some(0))));

    let start = Checkpoint {
        since: T,
        last_seen_id: Some(ItemId(40)),
        offset: 0,
    };
    let mut pager = Pager::new(&source, CursorStrategy::Reverse, start, PagerOptions::default());

    assert_eq!(pager.next_page(&mut Pacer::disabled()).await, PageOutcome::Done);
    assert!(!pager.is_truncated());
    assert_eq!(pager.checkpoint(), start);
}

#[tokio::test]
async fn test_reverse_records_top_as_last_seen() {
    let mut source = source(1000);
    source
        .expect_list_page()
        .times(1)
        .returning(|_| Ok(page(&[(3, T)], Some(3))));

    let options = PagerOptions {
        page_size: 2,
        ..Default::default()
    };
    let mut pager = Pager::new(&source, CursorStrategy::Reverse, Checkpoint::default(), options);
    let mut pacer = Pacer::disabled();

    assert_eq!(item_ids(&pager.next_page(&mut pacer).await), vec![3, 2]);
    assert!(pager.is_truncated());
    assert_eq!(pager.checkpoint().offset, 1);

    assert_eq!(item_ids(&pager.next_page(&mut pacer).await), vec![1]);
    assert_eq!(pager.next_page(&mut pacer).await, PageOutcome::Done);
    assert_eq!(
        pager.checkpoint(),
        Checkpoint {
            since: 0,
            last_seen_id: Some(ItemId(3)),
            offset: 0,
        }
    );
}

#[tokio::test]
async fn test_zero_budget_lists_nothing() {
    let mut source = source(1000);
    source.expect_list_page().times(0);

    let options = PagerOptions {
        max_count: Some(0),
        ..Default::default()
    };
    let mut pager = Pager::new(&source, CursorStrategy::Enumerate, Checkpoint::default(), options);

    assert_eq!(pager.next_page(&mut Pacer::disabled()).await, PageOutcome::Done);
}

#[tokio::test]
async fn test_entries_without_id_still_advance_to_next_page() {
    let mut source = source(100);
    let mut seq = Sequence::new();
    source
        .expect_list_page()
        .withf(|params| params.offset == 0)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            let ids: Vec<(u64, i64)> = (2..=100).map(|id| (id, T + id as i64)).collect();
            let mut first = page(&ids, None);
            first.skipped = 1;
            Ok(first)
        });
    source
        .expect_list_page()
        .withf(|params| params.offset == 100)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(page(&[(101, T + 101), (102, T + 102)], Some(102))));

    let mut pager = Pager::new(
        &source,
        CursorStrategy::Enumerate,
        Checkpoint::default(),
        PagerOptions::default(),
    );
    let mut pacer = Pacer::disabled();

    assert_eq!(item_ids(&pager.next_page(&mut pacer).await).len(), 99);
    assert_eq!(item_ids(&pager.next_page(&mut pacer).await), vec![101, 102]);
    assert_eq!(pager.next_page(&mut pacer).await, PageOutcome::Done);
    assert_eq!(pager.emitted(), 101);
}

#[tokio::test]
async fn test_page_of_only_unidentified_entries_is_not_the_end() {
    let mut source = source(50);
    let mut seq = Sequence::new();
    source
        .expect_list_page()
        .withf(|params| params.offset == 0)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            let mut first = page(&[], None);
            first.skipped = 50;
            Ok(first)
        });
    source
        .expect_list_page()
        .withf(|params| params.offset == 50)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(page(&[(7, T + 7)], Some(51))));

    let mut pager = Pager::new(
        &source,
        CursorStrategy::Incremental,
        Checkpoint::default(),
        PagerOptions::default(),
    );
    let mut pacer = Pacer::disabled();

    assert_eq!(item_ids(&pager.next_page(&mut pacer).await), vec![7]);
    assert_eq!(pager.next_page(&mut pacer).await, PageOutcome::Done);
    assert_eq!(pager.checkpoint().last_seen_id, Some(ItemId(7)));
}

#[tokio::test]
async fn test_held_item_keeps_truncated_resume_at_run_start() {
    let mut source = source(1000);
    source
        .expect_list_page()
        .times(1)
        .returning(|_| Ok(page(&[(30, T + 30), (29, T + 29), (28, T + 28)], Some(3))));

    let start = Checkpoint {
        since: T,
        last_seen_id: Some(ItemId(10)),
        offset: 0,
    };
    let options = PagerOptions {
        max_count: Some(2),
        ..Default::default()
    };
    let mut pager = Pager::new(&source, CursorStrategy::Incremental, start, options);
    let mut pacer = Pacer::disabled();

    let PageOutcome::More(items) = pager.next_page(&mut pacer).await else {
        panic!("expected a page of items");
    };
    assert_eq!(pager.next_page(&mut pacer).await, PageOutcome::Done);
    assert!(pager.is_truncated());
    assert_eq!(pager.checkpoint().offset, 2);

    pager.hold(&items[1]);
    assert_eq!(pager.checkpoint(), start);
}
