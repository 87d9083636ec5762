use crate::store::{Store, StoreError};
use crate::types::event::{NewSeismicEventRecord, SeismicEvent, SeismicEventRecord};

use time::OffsetDateTime;

pub const DEFAULT_RECORD_RADIUS_KM: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Recorded(SeismicEventRecord),
    AlreadyRecorded,
    OutOfRange,
}

/// Persists nearby events so each user keeps a history of what hit close to home.
#[derive(Clone)]
pub struct SeismicEventRecorder {
    store: Store,
    radius_km: f64,
}

impl SeismicEventRecorder {
    pub fn new(store: Store, radius_km: f64) -> Self {
        Self { store, radius_km }
    }

    pub fn record(
        &self,
        user: u64,
        event: &SeismicEvent,
        distance_km: f64,
        now: OffsetDateTime,
    ) -> Result<RecordOutcome, StoreError> {
        if distance_km.is_nan() || distance_km > self.radius_km {
            return Ok(RecordOutcome::OutOfRange);
        }
        let record = NewSeismicEventRecord::from_event(user, event, distance_km);
        match self.store.insert_record(record, now) {
            Ok(record) => Ok(RecordOutcome::Recorded(record)),
            Err(StoreError::Duplicate { .. }) => Ok(RecordOutcome::AlreadyRecorded),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::dispatch::tests::test_event;
    use crate::store::tests::new_user;

    #[test]
    fn record__should_store_nearby_event_once() {
        // Given
        let store = Store::in_memory();
        let user = store.create_user(new_user("near@example.com")).expect("user");
        let recorder = SeismicEventRecorder::new(store.clone(), DEFAULT_RECORD_RADIUS_KM);
        let event = test_event();

        // When
        let first = recorder
            .record(user.id, &event, 6.96, OffsetDateTime::UNIX_EPOCH)
            .expect("record");
        let second = recorder
            .record(user.id, &event, 6.96, OffsetDateTime::UNIX_EPOCH)
            .expect("record");

        // Then
        let RecordOutcome::Recorded(record) = first else {
            panic!("expected a new record, got {first:?}");
        };
        assert_eq!(record.event_id, "38000001");
        assert_eq!(record.proximity, 6.96);
        assert_eq!(second, RecordOutcome::AlreadyRecorded);
        assert_eq!(store.records_for_user(user.id, Default::default()).total, 1);
    }

    #[test]
    fn record__should_include_radius_boundary() {
        let store = Store::in_memory();
        let user = store.create_user(new_user("edge@example.com")).expect("user");
        let recorder = SeismicEventRecorder::new(store, DEFAULT_RECORD_RADIUS_KM);

        let outcome = recorder
            .record(user.id, &test_event(), 100.0, OffsetDateTime::UNIX_EPOCH)
            .expect("record");

        assert!(matches!(outcome, RecordOutcome::Recorded(_)));
    }

    #[test]
    fn record__should_skip_far_events() {
        let store = Store::in_memory();
        let user = store.create_user(new_user("far@example.com")).expect("user");
        let recorder = SeismicEventRecorder::new(store.clone(), DEFAULT_RECORD_RADIUS_KM);

        let outcome = recorder
            .record(user.id, &test_event(), 100.01, OffsetDateTime::UNIX_EPOCH)
            .expect("record");

        assert_eq!(outcome, RecordOutcome::OutOfRange);
        assert_eq!(store.records_for_user(user.id, Default::default()).total, 0);
    }
}
