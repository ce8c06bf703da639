//! Fetch coordinator: response cache, request coalescing, timeout policy.
//!
//! One instance is created at page init and owns the only mutable shared
//! state of the runtime: the response cache, the in-flight registry and the
//! global date range. Everything runs on the single-threaded event loop, so
//! `RefCell` is enough; borrows never cross an await point.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::oneshot;

use crate::filters::{build_url, merge_filters, stable_token, FilterMap, GlobalFilters};
use crate::registry;
use crate::{Payload, ReportError};

/// Per-request guard. Not configurable per report type.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Network layer the coordinator delegates to. The frontend implements it
/// over `fetch` with an abort controller; tests script it.
#[async_trait(?Send)]
pub trait ReportTransport {
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Payload, ReportError>;
}

/// Options for one report fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Explicit filter overrides, highest precedence. Empty values are kept
    /// here (they mask defaults) and only dropped from the query string.
    pub filters: FilterMap,
    /// Merge the shared date range when the descriptor supports it. Card
    /// fetches set this; modal runs always use their collected filters.
    pub use_global_filters: bool,
}

impl FetchOptions {
    /// Summary-card fetch: no explicit filters, global range applies.
    pub fn card() -> Self {
        FetchOptions {
            filters: FilterMap::new(),
            use_global_filters: true,
        }
    }

    /// Modal run with the filters collected from the modal's own inputs.
    pub fn modal(filters: FilterMap) -> Self {
        FetchOptions {
            filters,
            use_global_filters: false,
        }
    }
}

type Settled = Result<Payload, ReportError>;

/// Owns the fetch lifecycle for every report on the page.
pub struct ReportFetcher<T> {
    transport: T,
    cache: RefCell<HashMap<String, Payload>>,
    in_flight: RefCell<HashMap<String, Vec<oneshot::Sender<Settled>>>>,
    globals: RefCell<GlobalFilters>,
}

impl<T: ReportTransport> ReportFetcher<T> {
    pub fn new(transport: T) -> Self {
        ReportFetcher {
            transport,
            cache: RefCell::new(HashMap::new()),
            in_flight: RefCell::new(HashMap::new()),
            globals: RefCell::new(GlobalFilters::default()),
        }
    }

    /// Snapshot of the shared date range.
    pub fn global_range(&self) -> GlobalFilters {
        self.globals.borrow().clone()
    }

    /// Replace the shared date range. Every cached payload may depend on it,
    /// so the cache is invalidated wholesale.
    pub fn set_global_range(&self, start: &str, end: &str) {
        *self.globals.borrow_mut() = GlobalFilters {
            start: start.trim().to_string(),
            end: end.trim().to_string(),
        };
        self.clear_cache();
    }

    /// Empty the cache and the in-flight registry. The only invalidation
    /// path; there is no expiry. Callers parked on a cleared in-flight entry
    /// observe [`ReportError::Cancelled`].
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
        self.in_flight.borrow_mut().clear();
    }

    /// Fetch a report payload, replaying the cache or joining an identical
    /// in-flight request when possible.
    pub async fn fetch(&self, kind: &str, options: FetchOptions) -> Settled {
        let desc = registry::descriptor(kind)
            .ok_or_else(|| ReportError::UnknownReport(kind.to_string()))?;

        let apply_globals = options.use_global_filters && desc.supports_range;
        let globals = if apply_globals {
            Some(self.globals.borrow().clone())
        } else {
            None
        };

        let source = if options.use_global_filters { "global" } else { "explicit" };
        let global_token = globals.as_ref().map_or(String::new(), |g| {
            format!("start={};end={}", g.start, g.end)
        });
        let key = format!(
            "{kind}|{source}|{}|{global_token}",
            stable_token(&options.filters)
        );

        if let Some(hit) = self.cache.borrow().get(&key) {
            log::debug!("report cache hit: {key}");
            return Ok(hit.clone());
        }

        // Join an identical request that is already on the wire.
        let waiter = {
            let mut in_flight = self.in_flight.borrow_mut();
            match in_flight.get_mut(&key) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    in_flight.insert(key.clone(), Vec::new());
                    None
                }
            }
        };
        if let Some(rx) = waiter {
            log::debug!("joining in-flight report request: {key}");
            return rx.await.unwrap_or(Err(ReportError::Cancelled));
        }

        let merged = merge_filters(desc, globals.as_ref(), &options.filters);
        let url = build_url(desc, &merged);
        let result = self.transport.get_json(&url, REQUEST_TIMEOUT).await;

        if let Ok(payload) = &result {
            self.cache.borrow_mut().insert(key.clone(), payload.clone());
        }
        // The entry goes away on every outcome so a later identical call
        // issues a fresh request instead of hanging on a settled promise.
        let waiters = self.in_flight.borrow_mut().remove(&key).unwrap_or_default();
        for tx in waiters {
            let _ = tx.send(result.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::join;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Pends exactly once, so a concurrent caller gets polled while the
    /// scripted request is "on the wire".
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    struct MockTransport {
        calls: RefCell<Vec<String>>,
        responses: RefCell<VecDeque<Settled>>,
    }

    impl MockTransport {
        fn new(responses: Vec<Settled>) -> Self {
            MockTransport {
                calls: RefCell::new(Vec::new()),
                responses: RefCell::new(responses.into()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    #[async_trait(?Send)]
    impl ReportTransport for MockTransport {
        async fn get_json(&self, url: &str, _timeout: Duration) -> Settled {
            self.calls.borrow_mut().push(url.to_string());
            YieldOnce(false).await;
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(ReportError::Network("unexpected request".to_string())))
        }
    }

    fn fetcher(responses: Vec<Settled>) -> ReportFetcher<MockTransport> {
        ReportFetcher::new(MockTransport::new(responses))
    }

    #[test]
    fn test_unknown_report_type_rejects_before_network() {
        let fetcher = fetcher(vec![]);
        let err = block_on(fetcher.fetch("no-such-report", FetchOptions::card())).unwrap_err();
        assert_eq!(err, ReportError::UnknownReport("no-such-report".to_string()));
        assert_eq!(fetcher.transport.call_count(), 0);
    }

    #[test]
    fn test_concurrent_identical_fetches_coalesce() {
        let payload = json!({"total_sales_display": "RD$ 1,000.00", "rows": []});
        let fetcher = fetcher(vec![Ok(payload.clone())]);

        let (a, b) = block_on(async {
            join!(
                fetcher.fetch("total-sales", FetchOptions::card()),
                fetcher.fetch("total-sales", FetchOptions::card()),
            )
        });

        assert_eq!(fetcher.transport.call_count(), 1);
        assert_eq!(a.unwrap(), payload);
        assert_eq!(b.unwrap(), payload);
    }

    #[test]
    fn test_coalesced_waiters_share_the_rejection() {
        let fetcher = fetcher(vec![Err(ReportError::Http(500))]);

        let (a, b) = block_on(async {
            join!(
                fetcher.fetch("profit", FetchOptions::card()),
                fetcher.fetch("profit", FetchOptions::card()),
            )
        });

        assert_eq!(fetcher.transport.call_count(), 1);
        assert_eq!(a.unwrap_err(), ReportError::Http(500));
        assert_eq!(b.unwrap_err(), ReportError::Http(500));
    }

    #[test]
    fn test_clearing_cache_cancels_parked_waiters() {
        let payload = json!({"total_sales_display": "RD$ 1.00"});
        let fetcher = fetcher(vec![Ok(payload.clone())]);

        // The leader is on the wire and the waiter is parked on its oneshot
        // when the clear runs; dropping the in-flight registry drops the
        // waiter's sender.
        let (leader, waiter, _) = block_on(async {
            join!(
                fetcher.fetch("total-sales", FetchOptions::card()),
                fetcher.fetch("total-sales", FetchOptions::card()),
                async { fetcher.clear_cache() },
            )
        });

        assert_eq!(fetcher.transport.call_count(), 1);
        assert_eq!(leader.unwrap(), payload);
        assert_eq!(waiter.unwrap_err(), ReportError::Cancelled);
    }

    #[test]
    fn test_cache_replays_until_cleared() {
        let payload = json!({"total_cost_display": "RD$ 250.00"});
        let fetcher = fetcher(vec![Ok(payload.clone()), Ok(payload.clone())]);

        let first = block_on(fetcher.fetch("inventory-cost", FetchOptions::card())).unwrap();
        let second = block_on(fetcher.fetch("inventory-cost", FetchOptions::card())).unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.transport.call_count(), 1);

        fetcher.clear_cache();
        block_on(fetcher.fetch("inventory-cost", FetchOptions::card())).unwrap();
        assert_eq!(fetcher.transport.call_count(), 2);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let fetcher = fetcher(vec![Err(ReportError::Http(502)), Ok(json!({}))]);

        block_on(fetcher.fetch("total-sales", FetchOptions::card())).unwrap_err();
        // the in-flight entry is gone, so the retry hits the network again
        block_on(fetcher.fetch("total-sales", FetchOptions::card())).unwrap();
        assert_eq!(fetcher.transport.call_count(), 2);
    }

    #[test]
    fn test_global_range_ignored_without_range_support() {
        let fetcher = fetcher(vec![Ok(json!({}))]);
        fetcher.set_global_range("2025-01-01", "2025-01-31");

        block_on(fetcher.fetch("inventory-cost", FetchOptions::card())).unwrap();
        let url = fetcher.transport.calls.borrow()[0].clone();
        assert_eq!(url, "/dashboard/reportes/costo-inventario/");
    }

    #[test]
    fn test_simultaneous_triggers_without_range_support() {
        // two cards becoming visible at once, with a global range that the
        // report does not honour
        let fetcher = fetcher(vec![Ok(json!({"total_cost_display": "RD$ 99.00"}))]);
        fetcher.set_global_range("2025-01-01", "2025-01-31");

        let (a, b) = block_on(async {
            join!(
                fetcher.fetch("inventory-cost", FetchOptions::card()),
                fetcher.fetch("inventory-cost", FetchOptions::card()),
            )
        });

        assert_eq!(fetcher.transport.call_count(), 1);
        assert_eq!(a.unwrap(), b.unwrap());
        let url = fetcher.transport.calls.borrow()[0].clone();
        assert_eq!(url, "/dashboard/reportes/costo-inventario/");
    }

    #[test]
    fn test_global_range_applied_when_supported() {
        let fetcher = fetcher(vec![Ok(json!({}))]);
        fetcher.set_global_range("2025-01-01", "2025-01-31");

        block_on(fetcher.fetch("total-sales", FetchOptions::card())).unwrap();
        let url = fetcher.transport.calls.borrow()[0].clone();
        assert!(url.contains("fecha_inicio=2025-01-01"));
        assert!(url.contains("fecha_fin=2025-01-31"));
    }

    #[test]
    fn test_modal_run_bypasses_global_range() {
        let fetcher = fetcher(vec![Ok(json!({}))]);
        fetcher.set_global_range("2025-01-01", "2025-01-31");

        let mut explicit = FilterMap::new();
        explicit.insert("start".to_string(), String::new());
        explicit.insert("end".to_string(), String::new());
        block_on(fetcher.fetch("total-sales", FetchOptions::modal(explicit))).unwrap();

        let url = fetcher.transport.calls.borrow()[0].clone();
        assert_eq!(url, "/dashboard/reportes/ventas-totales/");
    }

    #[test]
    fn test_card_and_modal_fetches_use_distinct_cache_slots() {
        // Same resulting URL, but the derived keys differ by filter source.
        let fetcher = fetcher(vec![Ok(json!({"v": 1})), Ok(json!({"v": 2}))]);

        block_on(fetcher.fetch("total-sales", FetchOptions::card())).unwrap();
        block_on(fetcher.fetch("total-sales", FetchOptions::modal(FilterMap::new()))).unwrap();
        assert_eq!(fetcher.transport.call_count(), 2);
    }

    #[test]
    fn test_set_global_range_invalidates_cache() {
        let fetcher = fetcher(vec![Ok(json!({})), Ok(json!({}))]);

        block_on(fetcher.fetch("profit", FetchOptions::card())).unwrap();
        fetcher.set_global_range("2025-03-01", "");
        block_on(fetcher.fetch("profit", FetchOptions::card())).unwrap();
        assert_eq!(fetcher.transport.call_count(), 2);
    }

    #[test]
    fn test_timeout_is_distinguishable_from_http_failure() {
        let fetcher = fetcher(vec![Err(ReportError::Timeout), Err(ReportError::Http(500))]);

        let timeout = block_on(fetcher.fetch("total-sales", FetchOptions::card())).unwrap_err();
        let http = block_on(fetcher.fetch("total-sales", FetchOptions::card())).unwrap_err();

        assert!(timeout.is_timeout());
        assert!(!http.is_timeout());
        assert_ne!(timeout, http);
        assert_eq!(timeout.to_string(), "request took too long");
    }

    #[test]
    fn test_default_filters_reach_the_query() {
        let fetcher = fetcher(vec![Ok(json!({}))]);
        block_on(fetcher.fetch("sales-period", FetchOptions::modal(FilterMap::new()))).unwrap();
        let url = fetcher.transport.calls.borrow()[0].clone();
        assert_eq!(url, "/dashboard/reportes/ventas-periodo/?period=day");
    }
}
