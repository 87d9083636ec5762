use crate::feed::{self, FeedConfig, FeedQuery};
use crate::monitor::{CycleReport, ProximityFlow};
use crate::ports::feed::EventFeed;
use crate::ports::push::PushSender;
use crate::ports::state::StateStore;
use crate::ports::telegram::TelegramSender;
use crate::ports::time::TimeProvider;
use crate::types::event::SeismicEvent;

use serde::Serialize;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Last known state of the background monitor, shared with the API.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_poll_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    pub latest_event: Option<SeismicEvent>,
    pub last_report: Option<CycleReport>,
}

pub type SharedStatus = Arc<Mutex<MonitorStatus>>;

#[derive(Debug, Clone)]
pub struct EventPoller<F, T> {
    feed: F,
    time: T,
    config: FeedConfig,
}

impl<F, T> EventPoller<F, T>
where
    F: EventFeed,
    T: TimeProvider,
{
    pub fn new(feed: F, time: T, config: FeedConfig) -> Self {
        Self { feed, time, config }
    }

    /// Fetches this year's events and returns the most recent one.
    pub async fn poll_latest(&self) -> Result<Option<SeismicEvent>, F::Error> {
        let query = FeedQuery::for_current_year(self.time.now(), &self.config);
        let events = self.feed.fetch(&query).await?;
        Ok(feed::latest_event(events))
    }

    /// One poll and, when there is an event, one pass of the flow.
    pub async fn run_once<S, P, G>(
        &self,
        flow: &ProximityFlow<S, P, G, T>,
        status: &SharedStatus,
    ) where
        S: StateStore,
        P: PushSender,
        G: TelegramSender,
    {
        let polled_at = self.time.now();
        let latest = match self.poll_latest().await {
            Ok(latest) => latest,
            Err(err) => {
                tracing::warn!(error = %err, "seismic feed poll failed");
                let mut status = status.lock().expect("monitor status lock");
                status.last_poll_at = Some(polled_at);
                status.last_error = Some(err.to_string());
                return;
            }
        };

        let report = match &latest {
            Some(event) => match flow.process(event).await {
                Ok(report) => Some(report),
                Err(err) => {
                    tracing::error!(event_id = %event.event_id, error = %err, "proximity flow failed");
                    let mut status = status.lock().expect("monitor status lock");
                    status.last_poll_at = Some(polled_at);
                    status.last_error = Some(err.to_string());
                    status.latest_event = latest.clone();
                    return;
                }
            },
            None => {
                tracing::debug!("seismic feed returned no events");
                None
            }
        };

        let mut status = status.lock().expect("monitor status lock");
        status.last_poll_at = Some(polled_at);
        status.last_error = None;
        status.latest_event = latest;
        if report.is_some() {
            status.last_report = report;
        }
    }

    /// Polls forever, one cycle at a time.
    pub fn spawn<S, P, G>(
        self,
        flow: ProximityFlow<S, P, G, T>,
        status: SharedStatus,
    ) -> JoinHandle<()>
    where
        S: StateStore,
        P: PushSender,
        G: TelegramSender,
        ProximityFlow<S, P, G, T>: Send + Sync + 'static,
    {
        let interval = self.config.poll_interval;
        tracing::info!(?interval, url = %self.config.url, "seismic monitor started");
        tokio::spawn(async move {
            loop {
                self.run_once(&flow, &status).await;
                self.time.sleep(interval).await;
            }
        })
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStateStore;
    use crate::advice::AdviceCatalog;
    use crate::dedup::DeduplicationGate;
    use crate::dispatch::tests::{TestPush, TestTelegram, TestTime, test_event, user_with};
    use crate::dispatch::{NotificationDispatcher, RetryPolicy};
    use crate::monitor::DEFAULT_ALERT_RADIUS_KM;
    use crate::recorder::{DEFAULT_RECORD_RADIUS_KM, SeismicEventRecorder};
    use crate::store::Store;
    use crate::types::push::Subscription;
    use crate::types::user::NotificationPreferences;

    #[derive(Clone, Default)]
    struct TestFeed {
        events: Arc<Mutex<Vec<SeismicEvent>>>,
        queries: Arc<Mutex<Vec<FeedQuery>>>,
        fail: bool,
    }

    impl EventFeed for TestFeed {
        type Error = String;
        type Fut<'a>
            = std::future::Ready<Result<Vec<SeismicEvent>, Self::Error>>
        where
            Self: 'a;

        fn fetch<'a>(&'a self, query: &'a FeedQuery) -> Self::Fut<'a> {
            self.queries.lock().expect("queries lock").push(query.clone());
            if self.fail {
                return std::future::ready(Err("feed unavailable".to_string()));
            }
            std::future::ready(Ok(self.events.lock().expect("events lock").clone()))
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_772_800_000).expect("time")
    }

    struct Scenario {
        store: Store,
        push: TestPush,
        telegram: TestTelegram,
        flow: ProximityFlow<MemoryStateStore, TestPush, TestTelegram, TestTime>,
    }

    fn scenario() -> Scenario {
        let store = Store::in_memory();
        let push = TestPush::default();
        let telegram = TestTelegram::default();
        let time = TestTime::new(now());
        let flow = ProximityFlow::new(
            DeduplicationGate::new(MemoryStateStore::default()),
            store.clone(),
            Arc::new(AdviceCatalog::builtin().expect("catalog")),
            NotificationDispatcher::new(
                Some(push.clone()),
                Some(telegram.clone()),
                store.clone(),
                time.clone(),
                RetryPolicy::default(),
            ),
            SeismicEventRecorder::new(store.clone(), DEFAULT_RECORD_RADIUS_KM),
            time,
            DEFAULT_ALERT_RADIUS_KM,
        );
        Scenario {
            store,
            push,
            telegram,
            flow,
        }
    }

    #[tokio::test]
    async fn poll_latest__should_pick_most_recent_event() {
        // Given
        let older = test_event();
        let mut newer = test_event();
        newer.event_id = "38000002".to_string();
        newer.time += time::Duration::minutes(5);
        let feed = TestFeed::default();
        feed.events
            .lock()
            .expect("events lock")
            .extend([newer.clone(), older]);
        let poller = EventPoller::new(feed.clone(), TestTime::new(now()), FeedConfig::default());

        // When
        let latest = poller.poll_latest().await.expect("poll");

        // Then
        assert_eq!(latest, Some(newer));
        let queries = feed.queries.lock().expect("queries lock");
        assert_eq!(queries[0].start.year(), now().year());
        assert_eq!(queries[0].end, now());
    }

    #[tokio::test]
    async fn run_once__should_alert_nearby_user_once_per_event() {
        // Given
        let scenario = scenario();
        let user = user_with(
            &scenario.store,
            "caserta@example.com",
            NotificationPreferences {
                push_enabled: true,
                telegram_enabled: true,
                telegram_id: Some(555),
                telegram_username: None,
            },
            vec![Subscription {
                endpoint: "https://push.example/caserta".to_string(),
                p256dh: "p256".to_string(),
                auth: "auth".to_string(),
            }],
        );
        let feed = TestFeed::default();
        feed.events.lock().expect("events lock").push(test_event());
        let poller = EventPoller::new(feed, TestTime::new(now()), FeedConfig::default());
        let status = SharedStatus::default();

        // When
        poller.run_once(&scenario.flow, &status).await;
        poller.run_once(&scenario.flow, &status).await;

        // Then
        let telegram = scenario.telegram.sent.lock().expect("sent lock").clone();
        assert_eq!(telegram.len(), 2);
        assert!(telegram[0].1.contains("6.96 km"));
        assert!(telegram[1].1.contains("[4.4, 5.4)"));
        assert_eq!(scenario.push.sent.lock().expect("sent lock").len(), 1);

        let records = scenario.store.records_for_user(user.id, Default::default());
        assert_eq!(records.total, 1);
        assert_eq!(records.items[0].proximity, 6.96);

        let status = status.lock().expect("status lock");
        assert_eq!(status.last_error, None);
        assert_eq!(status.last_poll_at, Some(now()));
        assert_eq!(
            status.latest_event.as_ref().map(|event| event.event_id.as_str()),
            Some("38000001")
        );
        let report = status.last_report.as_ref().expect("report");
        assert!(!report.admitted);
    }

    #[tokio::test]
    async fn run_once__should_record_feed_failure() {
        // Given
        let scenario = scenario();
        let feed = TestFeed {
            fail: true,
            ..Default::default()
        };
        let poller = EventPoller::new(feed, TestTime::new(now()), FeedConfig::default());
        let status = SharedStatus::default();

        // When
        poller.run_once(&scenario.flow, &status).await;

        // Then
        let status = status.lock().expect("status lock");
        assert_eq!(status.last_error.as_deref(), Some("feed unavailable"));
        assert!(status.latest_event.is_none());
    }
}
