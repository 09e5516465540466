//! Cursor pagination over an [`EventPageSource`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::FetchError;
use crate::provider::{EventPageSource, ProviderEvent};
use crate::retry::RetryPolicy;

/// Everything one (league, season) fetch produced.
///
/// `failure` is set when a page could not be fetched after retries or the
/// run was cancelled. Events from earlier pages are still here.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub events: Vec<ProviderEvent>,
    pub pages: usize,
    pub requests: usize,
    pub failure: Option<FetchError>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct Paginator<'a, S: ?Sized> {
    source: &'a S,
    retry: RetryPolicy,
    request_delay: Duration,
}

impl<'a, S> Paginator<'a, S>
where
    S: EventPageSource + ?Sized,
{
    pub fn new(source: &'a S, retry: RetryPolicy, request_delay: Duration) -> Self {
        Self {
            source,
            retry,
            request_delay,
        }
    }

    /// Follows `nextCursor` until it comes back empty. Every request, failed
    /// or not, is followed by the fixed inter-request delay.
    pub async fn fetch_all(&self, league: &str, season: &str, cancel: &CancelToken) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        let requests = AtomicUsize::new(0);
        let mut cursor: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                outcome.failure = Some(FetchError::Cancelled);
                break;
            }

            let page_no = outcome.pages + 1;
            let what = format!("{} {} page {}", league.to_uppercase(), season, page_no);
            let cursor_ref = cursor.as_deref();
            let requests_ref = &requests;
            let source = self.source;
            let delay = self.request_delay;

            let result = self
                .retry
                .run(
                    &what,
                    move |_| async move {
                        requests_ref.fetch_add(1, Ordering::SeqCst);
                        let page = source.fetch_page(league, season, cursor_ref).await;
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        page
                    },
                    FetchError::is_transient,
                )
                .await;

            match result {
                Ok(page) => {
                    outcome.pages += 1;
                    debug!("{}: {} events", what, page.events.len());
                    outcome.events.extend(page.events);

                    let next = page.next_cursor.filter(|c| !c.trim().is_empty());
                    match next {
                        Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                            warn!("{}: provider repeated cursor {}, stopping", what, next);
                            break;
                        }
                        Some(next) => cursor = Some(next),
                        None => break,
                    }
                }
                Err(e) => {
                    warn!("{} failed: {}", what, e);
                    outcome.failure = Some(e);
                    break;
                }
            }
        }

        outcome.requests = requests.load(Ordering::SeqCst);
        info!(
            "Fetched {} events for {} {} ({} pages, {} requests)",
            outcome.events.len(),
            league.to_uppercase(),
            season,
            outcome.pages,
            outcome.requests
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::EventPage;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves queued responses in order and records the cursors it saw.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<EventPage, FetchError>>>,
        cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<EventPage, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                cursors: Mutex::new(Vec::new()),
            }
        }

        fn cursors(&self) -> Vec<Option<String>> {
            self.cursors.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventPageSource for ScriptedSource {
        async fn fetch_page(
            &self,
            _league: &str,
            _season: &str,
            cursor: Option<&str>,
        ) -> Result<EventPage, FetchError> {
            self.cursors.lock().unwrap().push(cursor.map(str::to_string));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(EventPage::default()))
        }
    }

    fn page(dates: &[&str], next: Option<&str>) -> Result<EventPage, FetchError> {
        Ok(EventPage {
            events: dates
                .iter()
                .map(|d| ProviderEvent {
                    date: d.to_string(),
                    ..Default::default()
                })
                .collect(),
            next_cursor: next.map(str::to_string),
        })
    }

    fn unavailable() -> Result<EventPage, FetchError> {
        Err(FetchError::Status {
            status: 503,
            body: "busy".into(),
        })
    }

    fn paginator(source: &ScriptedSource) -> Paginator<'_, ScriptedSource> {
        Paginator::new(source, RetryPolicy::immediate(3), Duration::ZERO)
    }

    #[tokio::test]
    async fn stops_when_cursor_is_null() {
        let source = ScriptedSource::new(vec![
            page(&["2024-09-08", "2024-09-09"], Some("c2")),
            page(&["2024-09-15"], None),
        ]);
        let outcome = paginator(&source)
            .fetch_all("nfl", "2024", &CancelToken::new())
            .await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.requests, 2);
        assert_eq!(outcome.pages, 2);
        let dates: Vec<_> = outcome.events.iter().map(|e| e.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-09-08", "2024-09-09", "2024-09-15"]);
        assert_eq!(source.cursors(), vec![None, Some("c2".to_string())]);
    }

    #[tokio::test]
    async fn empty_cursor_ends_pagination() {
        let source = ScriptedSource::new(vec![page(&["2024-09-08"], Some(""))]);
        let outcome = paginator(&source)
            .fetch_all("nfl", "2024", &CancelToken::new())
            .await;
        assert_eq!(outcome.requests, 1);
        assert_eq!(outcome.events.len(), 1);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let source = ScriptedSource::new(vec![
            page(&["a"], Some("c2")),
            unavailable(),
            page(&["b"], None),
        ]);
        let outcome = paginator(&source)
            .fetch_all("nba", "2024", &CancelToken::new())
            .await;
        assert!(outcome.is_complete());
        assert_eq!(outcome.requests, 3);
        assert_eq!(outcome.events.len(), 2);
        assert_eq!(source.cursors()[1], source.cursors()[2]);
    }

    #[tokio::test]
    async fn exhausted_retries_keep_earlier_pages() {
        let source = ScriptedSource::new(vec![
            page(&["a", "b"], Some("c2")),
            unavailable(),
            unavailable(),
            unavailable(),
        ]);
        let outcome = paginator(&source)
            .fetch_all("mlb", "2023", &CancelToken::new())
            .await;
        assert!(!outcome.is_complete());
        assert!(matches!(outcome.failure, Some(FetchError::Status { status: 503, .. })));
        assert_eq!(outcome.requests, 4);
        assert_eq!(outcome.events.len(), 2);
    }

    #[tokio::test]
    async fn decode_errors_are_not_retried() {
        let bad = serde_json::from_str::<EventPage>("{").unwrap_err();
        let source = ScriptedSource::new(vec![Err(FetchError::Decode(bad))]);
        let outcome = paginator(&source)
            .fetch_all("nhl", "2024", &CancelToken::new())
            .await;
        assert_eq!(outcome.requests, 1);
        assert!(matches!(outcome.failure, Some(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn cancelled_token_skips_requests() {
        let source = ScriptedSource::new(vec![page(&["a"], None)]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = paginator(&source).fetch_all("nfl", "2024", &cancel).await;
        assert_eq!(outcome.requests, 0);
        assert!(matches!(outcome.failure, Some(FetchError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_follows_every_request() {
        let source = ScriptedSource::new(vec![page(&["a"], Some("c2")), page(&["b"], None)]);
        let start = tokio::time::Instant::now();
        Paginator::new(&source, RetryPolicy::immediate(3), Duration::from_millis(100))
            .fetch_all("nfl", "2024", &CancelToken::new())
            .await;
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
