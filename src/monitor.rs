//! The proximity pipeline run for every polled event:
//! gate, distance per user, advice, dispatch, record.

use crate::advice::AdviceCatalog;
use crate::dedup::DeduplicationGate;
use crate::dispatch::{Alert, NotificationDispatcher};
use crate::geo;
use crate::ports::push::PushSender;
use crate::ports::state::StateStore;
use crate::ports::telegram::TelegramSender;
use crate::ports::time::TimeProvider;
use crate::recorder::{RecordOutcome, SeismicEventRecorder};
use crate::store::Store;
use crate::types::event::SeismicEvent;

use serde::Serialize;
use std::sync::Arc;

pub const DEFAULT_ALERT_RADIUS_KM: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("deduplication state unavailable: {0}")]
    State(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub event_id: String,
    pub admitted: bool,
    pub users_checked: usize,
    pub users_without_place: usize,
    pub users_notified: usize,
    pub records_created: usize,
}

pub struct ProximityFlow<S, P, G, T> {
    gate: DeduplicationGate<S>,
    store: Store,
    catalog: Arc<AdviceCatalog>,
    dispatcher: NotificationDispatcher<P, G, T>,
    recorder: SeismicEventRecorder,
    time: T,
    alert_radius_km: f64,
}

impl<S, P, G, T> ProximityFlow<S, P, G, T>
where
    S: StateStore,
    P: PushSender,
    G: TelegramSender,
    T: TimeProvider,
{
    pub fn new(
        gate: DeduplicationGate<S>,
        store: Store,
        catalog: Arc<AdviceCatalog>,
        dispatcher: NotificationDispatcher<P, G, T>,
        recorder: SeismicEventRecorder,
        time: T,
        alert_radius_km: f64,
    ) -> Self {
        Self {
            gate,
            store,
            catalog,
            dispatcher,
            recorder,
            time,
            alert_radius_km,
        }
    }

    pub async fn process(&self, event: &SeismicEvent) -> Result<CycleReport, FlowError> {
        let mut report = CycleReport {
            event_id: event.event_id.clone(),
            ..Default::default()
        };
        let admitted = self
            .gate
            .admit(event)
            .map_err(|err| FlowError::State(err.to_string()))?;
        if !admitted {
            tracing::debug!(event_id = %event.event_id, "event already notified");
            return Ok(report);
        }
        report.admitted = true;
        tracing::info!(
            event_id = %event.event_id,
            magnitude = event.magnitude,
            place = %event.place,
            "new seismic event"
        );

        let epicenter = event.geometry.coordinate();
        let advice = self.catalog.select(event.magnitude);
        if advice.is_none() {
            tracing::info!(magnitude = event.magnitude, "no advice band for magnitude");
        }

        for user in self.store.users() {
            report.users_checked += 1;
            let Some(distance) = geo::distance_km(user.home(), epicenter) else {
                tracing::info!(user = user.id, "user has no coordinates, skipping");
                report.users_without_place += 1;
                continue;
            };
            if distance > self.alert_radius_km {
                continue;
            }

            let dispatched = self
                .dispatcher
                .dispatch(
                    &user,
                    Alert {
                        event,
                        distance_km: Some(distance),
                        advice,
                    },
                )
                .await;
            tracing::debug!(user = user.id, distance, report = ?dispatched, "alert dispatched");
            report.users_notified += 1;

            match self.recorder.record(user.id, event, distance, self.time.now()) {
                Ok(RecordOutcome::Recorded(_)) => report.records_created += 1,
                Ok(RecordOutcome::AlreadyRecorded | RecordOutcome::OutOfRange) => {}
                Err(err) => {
                    tracing::error!(user = user.id, event_id = %event.event_id, error = %err, "failed to record event");
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStateStore;
    use crate::dispatch::RetryPolicy;
    use crate::dispatch::tests::{TestPush, TestTelegram, TestTime, test_event, user_with};
    use crate::recorder::DEFAULT_RECORD_RADIUS_KM;
    use crate::store::tests::new_user;
    use crate::types::user::NotificationPreferences;
    use time::OffsetDateTime;

    fn flow(
        store: &Store,
        telegram: &TestTelegram,
    ) -> ProximityFlow<MemoryStateStore, TestPush, TestTelegram, TestTime> {
        let time = TestTime::new(OffsetDateTime::UNIX_EPOCH);
        ProximityFlow::new(
            DeduplicationGate::new(MemoryStateStore::default()),
            store.clone(),
            Arc::new(AdviceCatalog::builtin().expect("catalog")),
            NotificationDispatcher::new(
                Some(TestPush::default()),
                Some(telegram.clone()),
                store.clone(),
                time.clone(),
                RetryPolicy::none(),
            ),
            SeismicEventRecorder::new(store.clone(), DEFAULT_RECORD_RADIUS_KM),
            time,
            DEFAULT_ALERT_RADIUS_KM,
        )
    }

    #[tokio::test]
    async fn process__should_notify_and_record_nearby_users() {
        // Given
        let store = Store::in_memory();
        let telegram = TestTelegram::default();
        let near = user_with(
            &store,
            "near@example.com",
            NotificationPreferences {
                telegram_enabled: true,
                telegram_id: Some(7),
                ..Default::default()
            },
            Vec::new(),
        );
        let homeless = store.create_user(new_user("nowhere@example.com")).expect("user");
        let flow = flow(&store, &telegram);

        // When
        let report = flow.process(&test_event()).await.expect("process");

        // Then
        assert!(report.admitted);
        assert_eq!(report.users_checked, 2);
        assert_eq!(report.users_without_place, 1);
        assert_eq!(report.users_notified, 1);
        assert_eq!(report.records_created, 1);
        let records = store.records_for_user(near.id, Default::default());
        assert_eq!(records.items[0].proximity, 6.96);
        assert!(store.inbox(homeless.id).is_empty());
        assert_eq!(telegram.sent.lock().expect("sent lock").len(), 2);
    }

    #[tokio::test]
    async fn process__should_ignore_repeated_event() {
        // Given
        let store = Store::in_memory();
        let telegram = TestTelegram::default();
        user_with(
            &store,
            "repeat@example.com",
            NotificationPreferences {
                telegram_enabled: true,
                telegram_id: Some(7),
                ..Default::default()
            },
            Vec::new(),
        );
        let flow = flow(&store, &telegram);
        let event = test_event();
        flow.process(&event).await.expect("first");

        // When
        let report = flow.process(&event).await.expect("second");

        // Then
        assert!(!report.admitted);
        assert_eq!(report.users_notified, 0);
        assert_eq!(telegram.sent.lock().expect("sent lock").len(), 2);
    }

    #[tokio::test]
    async fn process__should_skip_users_outside_radius() {
        // Given
        let store = Store::in_memory();
        let telegram = TestTelegram::default();
        let user = user_with(
            &store,
            "far@example.com",
            NotificationPreferences::default(),
            Vec::new(),
        );
        let mut event = test_event();
        event.geometry.latitude = 45.46;
        event.geometry.longitude = 9.19;

        // When
        let report = flow(&store, &telegram).process(&event).await.expect("process");

        // Then
        assert!(report.admitted);
        assert_eq!(report.users_notified, 0);
        assert!(store.inbox(user.id).is_empty());
        assert_eq!(store.records_for_user(user.id, Default::default()).total, 0);
    }
}
