use cx_exporter::ExportError;
use rstest::rstest;
use std::time::Duration;

mod utils;
use utils::{bounded_config, delivered, exporter, pack_sizes, MemorySink, MockClient};


#[tokio::test]
async fn small_range_is_delivered_in_packs() {
    let sink = MemorySink::new("memory");
    let recorded = sink.recorded();

    let summary = exporter(bounded_config(100, 105, 3, 2), MockClient::new(), vec![sink.boxed()])
        .run()
        .await
        .unwrap();

    assert_eq!(*recorded.lock().unwrap(), vec![vec![100, 101], vec![102, 103], vec![104]]);
    assert_eq!(summary.first_height, 100);
    assert_eq!(summary.blocks, 5);
    assert_eq!(summary.packs, 3);
    assert_eq!(summary.last_block.map(|b| b.height), Some(104));
    assert_eq!(summary.sinks.len(), 1);
    assert_eq!(summary.sinks[0].blocks, 5);
}


#[rstest]
#[case(1)]
#[case(3)]
#[case(8)]
#[case(32)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn order_does_not_depend_on_thread_count(#[case] threads: usize) {
    let sink = MemorySink::new("memory");
    let recorded = sink.recorded();
    let client = MockClient::new().with_random_latency(5);

    exporter(bounded_config(1000, 1300, threads, 7), client, vec![sink.boxed()])
        .run()
        .await
        .unwrap();

    assert_eq!(delivered(&recorded), (1000..1300).collect::<Vec<_>>());
}


#[rstest]
#[case(10, 3, 4)]
#[case(10, 5, 2)]
#[case(1, 100, 1)]
#[case(7, 1, 7)]
#[tokio::test]
async fn pack_count_is_rounded_up(#[case] blocks: i64, #[case] pack_size: usize, #[case] packs: usize) {
    let sink = MemorySink::new("memory");
    let recorded = sink.recorded();

    exporter(bounded_config(0, blocks, 2, pack_size), MockClient::new(), vec![sink.boxed()])
        .run()
        .await
        .unwrap();

    let sizes = pack_sizes(&recorded);
    assert_eq!(sizes.len(), packs);
    assert!(sizes[..sizes.len() - 1].iter().all(|s| *s == pack_size));
    assert!(*sizes.last().unwrap() <= pack_size);
}


#[tokio::test]
async fn failed_block_is_skipped_when_allowed() {
    let sink = MemorySink::new("memory");
    let recorded = sink.recorded();
    let client = MockClient::new().with_failing([5]);

    let mut config = bounded_config(0, 10, 3, 4);
    config.ignore_fetch_errors = true;

    let summary = exporter(config, client, vec![sink.boxed()]).run().await.unwrap();

    assert_eq!(delivered(&recorded), vec![0, 1, 2, 3, 4, 6, 7, 8, 9]);
    assert_eq!(summary.blocks, 9);
}


#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn skipping_keeps_order_of_survivors() {
    let sink = MemorySink::new("memory");
    let recorded = sink.recorded();
    let failing = [0, 13, 14, 50, 98, 99];
    let client = MockClient::new()
        .with_failing(failing)
        .with_random_latency(3);

    let mut config = bounded_config(0, 100, 6, 10);
    config.ignore_fetch_errors = true;

    exporter(config, client, vec![sink.boxed()]).run().await.unwrap();

    let expected: Vec<_> = (0..100).filter(|h| !failing.contains(h)).collect();
    assert_eq!(delivered(&recorded), expected);
}


#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_block_aborts_the_run() {
    let sink = MemorySink::new("memory");
    let recorded = sink.recorded();
    let client = MockClient::new()
        .with_failing([37])
        .with_random_latency(2);

    let run = exporter(bounded_config(0, 1000, 4, 5), client, vec![sink.boxed()]).run();
    let err = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("failed run must terminate")
        .unwrap_err();

    match err.downcast_ref::<ExportError>() {
        Some(ExportError::FetchFailed { height, .. }) => assert_eq!(*height, 37),
        _ => panic!("unexpected error: {:?}", err)
    }

    let heights = delivered(&recorded);
    assert!(heights.len() <= 37);
    assert_eq!(heights, (0..heights.len() as i64).collect::<Vec<_>>());
}


#[tokio::test]
async fn every_sink_gets_every_pack() {
    let a = MemorySink::new("a");
    let b = MemorySink::new("b");
    let recorded_a = a.recorded();
    let recorded_b = b.recorded();

    exporter(bounded_config(0, 23, 4, 5), MockClient::new(), vec![a.boxed(), b.boxed()])
        .run()
        .await
        .unwrap();

    assert_eq!(delivered(&recorded_a), (0..23).collect::<Vec<_>>());
    assert_eq!(*recorded_a.lock().unwrap(), *recorded_b.lock().unwrap());
}


#[tokio::test]
async fn sink_failure_fails_the_run() {
    let good = MemorySink::new("good");
    let bad = MemorySink::new("bad").failing_on(10);
    let recorded_good = good.recorded();
    let recorded_bad = bad.recorded();

    let run = exporter(bounded_config(0, 1000, 2, 5), MockClient::new(), vec![good.boxed(), bad.boxed()]).run();
    let err = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("failed run must terminate")
        .unwrap_err();

    match err.downcast_ref::<ExportError>() {
        Some(ExportError::WriteFailed(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].sink, "bad");
            assert_eq!(failures[0].first_height, 10);
            assert_eq!(failures[0].last_height, 14);
        },
        _ => panic!("unexpected error: {:?}", err)
    }

    assert_eq!(delivered(&recorded_bad), (0..10).collect::<Vec<_>>());
    let good_heights = delivered(&recorded_good);
    assert!(good_heights.len() < 1000);
    assert_eq!(good_heights, (0..good_heights.len() as i64).collect::<Vec<_>>());
}


#[tokio::test]
async fn failures_of_all_sinks_are_reported_together() {
    let a = MemorySink::new("a").failing_on(0);
    let b = MemorySink::new("b").failing_on(0);

    let err = exporter(bounded_config(0, 100, 2, 10), MockClient::new(), vec![a.boxed(), b.boxed()])
        .run()
        .await
        .unwrap_err();

    match err.downcast_ref::<ExportError>() {
        Some(ExportError::WriteFailed(failures)) => {
            let mut sinks: Vec<_> = failures.iter().map(|f| f.sink.as_str()).collect();
            sinks.sort();
            assert_eq!(sinks, vec!["a", "b"]);
        },
        _ => panic!("unexpected error: {:?}", err)
    }

    let message = err.to_string();
    assert!(message.contains("2 sink write(s) failed"));
    assert!(message.contains("disk is full"));
}


#[tokio::test]
async fn empty_range_does_nothing() {
    let sink = MemorySink::new("memory");
    let recorded = sink.recorded();
    let client = MockClient::new();

    let summary = exporter(bounded_config(50, 50, 2, 5), client, vec![sink.boxed()])
        .run()
        .await
        .unwrap();

    assert_eq!(summary.blocks, 0);
    assert!(summary.last_block.is_none());
    assert!(recorded.lock().unwrap().is_empty());
}


#[tokio::test]
async fn invalid_config_is_rejected() {
    let mut config = bounded_config(0, 10, 2, 5);
    config.threads = 0;
    let res = exporter(config, MockClient::new(), vec![MemorySink::new("m").boxed()]).run().await;
    assert!(res.is_err());

    let res = exporter(bounded_config(0, 10, 2, 5), MockClient::new(), vec![]).run().await;
    assert!(res.is_err());
}
