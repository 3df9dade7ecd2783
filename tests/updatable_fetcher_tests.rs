//! Tests for the update-tracking fetcher decorator

mod common;

use std::sync::Arc;

use common::*;
use rowcursor::{
    shared, CachedFetcher, CompletionReason, Error, FetchConfig, FetchType, Fetcher,
    ResultSetType, RowValue, ServerWindowFetcher, SharedSession, UpdatableFetcher,
};

fn marker() -> RowValue {
    RowValue::deleted_row_marker(1)
}

fn cached(rows: usize) -> UpdatableFetcher<CachedFetcher> {
    UpdatableFetcher::new(CachedFetcher::from_rows(numbered_rows(rows), false), marker())
}

fn server(
    rows: usize,
    fetch_size: u32,
) -> (
    SharedSession<MockSession>,
    UpdatableFetcher<ServerWindowFetcher<MockSession>>,
) {
    let session = shared(MockSession::new(numbered_rows(rows)));
    let config = FetchConfig::new()
        .with_result_set_type(ResultSetType::ScrollInsensitive)
        .with_fetch_size(fetch_size);
    let inner = ServerWindowFetcher::new(Arc::clone(&session), CURSOR, config);
    (session, UpdatableFetcher::new(inner, marker()))
}

fn current<F: Fetcher>(fetcher: &UpdatableFetcher<F>) -> Option<String> {
    first_field(fetcher.current_row())
}

mod overlay_tests {
    use super::*;

    #[tokio::test]
    async fn test_updated_row_survives_navigation() {
        let mut fetcher = cached(5);
        fetcher.absolute(3).await.unwrap();
        fetcher.update_row(row(&["v"])).await.unwrap();
        assert!(fetcher.row_updated());
        assert_eq!(current(&fetcher), Some("v".to_string()));

        fetcher.first().await.unwrap();
        assert!(!fetcher.row_updated());
        fetcher.relative(2).await.unwrap();
        assert_eq!(current(&fetcher), Some("v".to_string()));

        fetcher.last().await.unwrap();
        fetcher.previous().await.unwrap();
        fetcher.previous().await.unwrap();
        assert_eq!(current(&fetcher), Some("v".to_string()));

        fetcher.absolute(-3).await.unwrap();
        assert_eq!(current(&fetcher), Some("v".to_string()));
        assert!(fetcher.row_updated());
    }

    #[tokio::test]
    async fn test_deleted_row_reports_marker() {
        let mut fetcher = cached(3);
        let listener = RecordingListener::default();
        fetcher.set_listener(Box::new(listener.clone()));

        fetcher.absolute(2).await.unwrap();
        fetcher.delete_row().await.unwrap();
        assert!(fetcher.row_deleted());
        assert!(fetcher.current_row().unwrap().is_deleted_marker());
        // renotified with the marker, which has no value
        assert_eq!(listener.notified(), vec![Some("2".to_string()), None]);

        fetcher.next().await.unwrap();
        assert!(!fetcher.row_deleted());
        fetcher.previous().await.unwrap();
        assert!(fetcher.row_deleted());
        assert!(fetcher.current_row().unwrap().is_deleted_marker());

        // the wrapped fetcher is untouched
        assert_eq!(fetcher.size().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_mutation_off_row() {
        let mut fetcher = cached(2);
        assert!(matches!(
            fetcher.update_row(row(&["x"])).await,
            Err(Error::NotOnRow)
        ));
        assert!(matches!(fetcher.delete_row().await, Err(Error::NotOnRow)));

        fetcher.after_last().await.unwrap();
        assert!(matches!(fetcher.delete_row().await, Err(Error::NotOnRow)));
    }

    #[tokio::test]
    async fn test_delegates_without_inserts() {
        let (session, mut fetcher) = server(5, 2);
        fetcher.next().await.unwrap();
        fetcher.next().await.unwrap();
        assert_eq!(current(&fetcher), Some("2".to_string()));
        assert_eq!(fetcher.current_position(), 2);
        // no size resolution needed while nothing is inserted
        assert_eq!(
            take_calls(&session).await,
            vec![Call::FetchScroll {
                fetch_type: FetchType::Next,
                fetch_size: 2,
                position: 0
            }]
        );
    }
}

mod insert_tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_grows_size() {
        let mut fetcher = cached(3);
        fetcher.first().await.unwrap();
        fetcher.insert_row(row(&["d"])).await.unwrap();
        assert_eq!(fetcher.inserted_count(), 1);
        assert_eq!(fetcher.size().await.unwrap(), 4);
        // still on the row it was on
        assert_eq!(current(&fetcher), Some("1".to_string()));

        let size = fetcher.size().await.unwrap();
        assert!(fetcher.absolute(size).await.unwrap());
        assert_eq!(current(&fetcher), Some("d".to_string()));
        assert!(fetcher.row_inserted().await.unwrap());
        assert_eq!(fetcher.inner().current_position(), 4);
    }

    #[tokio::test]
    async fn test_navigation_across_insert_boundary() {
        let mut fetcher = cached(3);
        fetcher.insert_row(row(&["4"])).await.unwrap();
        fetcher.insert_row(row(&["5"])).await.unwrap();

        let mut seen = Vec::new();
        while fetcher.next().await.unwrap() {
            seen.push(current(&fetcher).unwrap());
        }
        assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);
        assert_eq!(fetcher.current_position(), 6);
        assert!(!fetcher.next().await.unwrap());
        assert_eq!(fetcher.current_position(), 6);

        let mut seen = Vec::new();
        while fetcher.previous().await.unwrap() {
            seen.push(current(&fetcher).unwrap());
        }
        assert_eq!(seen, vec!["5", "4", "3", "2", "1"]);
        assert_eq!(fetcher.current_position(), 0);
    }

    #[tokio::test]
    async fn test_insert_after_last_stays_after_last() {
        let mut fetcher = cached(2);
        fetcher.after_last().await.unwrap();
        fetcher.insert_row(row(&["3"])).await.unwrap();
        assert_eq!(fetcher.current_position(), 4);
        assert!(fetcher.current_row().is_none());

        assert!(fetcher.previous().await.unwrap());
        assert_eq!(current(&fetcher), Some("3".to_string()));
    }

    #[tokio::test]
    async fn test_update_inserted_row() {
        let mut fetcher = cached(2);
        fetcher.insert_row(row(&["3"])).await.unwrap();
        fetcher.last().await.unwrap();
        fetcher.update_row(row(&["3b"])).await.unwrap();
        assert!(!fetcher.row_updated());

        fetcher.first().await.unwrap();
        fetcher.last().await.unwrap();
        assert_eq!(current(&fetcher), Some("3b".to_string()));
        assert!(fetcher.row_inserted().await.unwrap());
    }

    #[tokio::test]
    async fn test_relative_and_absolute_over_inserts() {
        let mut fetcher = cached(3);
        fetcher.insert_row(row(&["4"])).await.unwrap();

        assert!(fetcher.absolute(-1).await.unwrap());
        assert_eq!(current(&fetcher), Some("4".to_string()));
        assert!(fetcher.relative(-2).await.unwrap());
        assert_eq!(current(&fetcher), Some("2".to_string()));
        assert!(!fetcher.relative(10).await.unwrap());
        assert_eq!(fetcher.current_position(), 5);
        assert!(!fetcher.absolute(-10).await.unwrap());
        assert_eq!(fetcher.current_position(), 0);
    }

    #[tokio::test]
    async fn test_forward_only_stays_forward_only_after_insert() {
        let mut fetcher =
            UpdatableFetcher::new(CachedFetcher::from_rows(numbered_rows(3), true), marker());
        assert!(fetcher.is_forward_only());
        assert!(fetcher.next().await.unwrap());
        fetcher.insert_row(row(&["4"])).await.unwrap();

        assert!(matches!(fetcher.last().await, Err(Error::ForwardOnly)));
        assert!(matches!(fetcher.absolute(-1).await, Err(Error::ForwardOnly)));
        assert!(matches!(fetcher.absolute(4).await, Err(Error::ForwardOnly)));
        assert!(matches!(fetcher.relative(3).await, Err(Error::ForwardOnly)));
        assert!(matches!(fetcher.previous().await, Err(Error::ForwardOnly)));
        assert!(matches!(fetcher.first().await, Err(Error::ForwardOnly)));
        assert!(matches!(fetcher.before_first().await, Err(Error::ForwardOnly)));
        assert_eq!(fetcher.current_position(), 1);
        assert_eq!(current(&fetcher), Some("1".to_string()));

        // moving forward still reaches the inserted row
        let mut seen = Vec::new();
        while fetcher.next().await.unwrap() {
            seen.push(current(&fetcher).unwrap());
        }
        assert_eq!(seen, vec!["2", "3", "4"]);
        assert_eq!(fetcher.current_position(), 5);
        assert!(matches!(fetcher.previous().await, Err(Error::ForwardOnly)));
    }

    #[tokio::test]
    async fn test_server_fetcher_parked_after_last() {
        let (session, mut fetcher) = server(3, 10);
        fetcher.insert_row(row(&["4"])).await.unwrap();
        take_calls(&session).await;

        assert!(fetcher.last().await.unwrap());
        assert_eq!(current(&fetcher), Some("4".to_string()));
        assert_eq!(fetcher.inner().current_position(), 4);
        assert_eq!(fetcher.inner().server_position(), 4);

        // serving the inserted row does not touch the server again
        assert!(fetcher.relative(0).await.unwrap());
        take_calls(&session).await;
        assert!(fetcher.absolute(4).await.unwrap());
        assert!(take_calls(&session).await.is_empty());

        assert!(fetcher.previous().await.unwrap());
        assert_eq!(current(&fetcher), Some("3".to_string()));
        assert_eq!(fetcher.inner().current_position(), 3);
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_close_clears_overlay() {
        let mut fetcher = cached(3);
        let listener = RecordingListener::default();
        fetcher.set_listener(Box::new(listener.clone()));
        fetcher.first().await.unwrap();
        fetcher.delete_row().await.unwrap();
        fetcher.insert_row(row(&["4"])).await.unwrap();

        fetcher.close(CompletionReason::Other).await.unwrap();
        fetcher.close(CompletionReason::Other).await.unwrap();
        assert!(fetcher.is_closed());
        assert!(fetcher.current_row().is_none());
        assert_eq!(fetcher.inserted_count(), 0);
        assert!(*listener.closed.lock().unwrap());

        assert!(matches!(fetcher.next().await, Err(Error::FetcherClosed)));
        assert!(matches!(
            fetcher.insert_row(row(&["5"])).await,
            Err(Error::FetcherClosed)
        ));
        assert!(matches!(
            fetcher.row_inserted().await,
            Err(Error::FetcherClosed)
        ));
    }

    #[tokio::test]
    async fn test_hints_pass_through() {
        let mut fetcher = cached(1);
        fetcher.set_fetch_size(25);
        assert_eq!(fetcher.fetch_size(), 25);
        assert_eq!(fetcher.inner().fetch_size(), 25);
    }
}
