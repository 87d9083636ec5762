use crate::i18n::Language;
use crate::types::event::{NewSeismicEventRecord, SeismicEventRecord};
use crate::types::inbox::{InAppKind, InAppNotification};
use crate::types::push::Subscription;
use crate::types::user::{NotificationPreferences, Place, User};

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("email is already registered")]
    EmailTaken,
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("event {event_id} is already recorded for user {user}")]
    Duplicate { user: u64, event_id: String },
}

/// Entries kept per user; older ones are dropped as new ones arrive.
pub const INBOX_LIMIT_PER_USER: usize = 50;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreData {
    next_id: u64,
    users: Vec<User>,
    records: Vec<SeismicEventRecord>,
    inbox: Vec<InAppNotification>,
}

impl StoreData {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn user_mut(&mut self, id: u64) -> Result<&mut User, StoreError> {
        self.users
            .iter_mut()
            .find(|user| user.id == id)
            .ok_or(StoreError::NotFound { entity: "user", id })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub language: Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Time,
    Magnitude,
    Proximity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub sort: SortKey,
    pub direction: SortDirection,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            sort: SortKey::default(),
            direction: SortDirection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

/// Users, nearby-event records and in-app notifications.
///
/// Everything lives in memory; when opened with a path every mutation is
/// flushed to a JSON file before the lock is released. A mutation that cannot
/// be flushed leaves the in-memory state untouched.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Mutex<StoreData>>,
    path: Option<PathBuf>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreData::default())),
            path: None,
        }
    }

    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let data = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == ErrorKind::NotFound => StoreData::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(data)),
            path: Some(path),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&StoreData) -> R) -> R {
        let guard = self.inner.lock().expect("store lock");
        f(&guard)
    }

    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut StoreData) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self.inner.lock().expect("store lock");
        let mut next = guard.clone();
        let result = f(&mut next)?;
        if let Some(path) = &self.path {
            let contents = serde_json::to_string(&next)?;
            atomic_write(path, &contents)?;
        }
        *guard = next;
        Ok(result)
    }

    pub fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        self.mutate(|data| {
            let email = new_user.email.trim().to_lowercase();
            if data.users.iter().any(|user| user.email == email) {
                return Err(StoreError::EmailTaken);
            }
            let user = User {
                id: data.allocate_id(),
                name: new_user.name,
                email,
                password_hash: new_user.password_hash,
                language: new_user.language,
                places: Vec::new(),
                notifications: Vec::new(),
                subscriptions: Vec::new(),
            };
            data.users.push(user.clone());
            Ok(user)
        })
    }

    pub fn user(&self, id: u64) -> Option<User> {
        self.read(|data| data.users.iter().find(|user| user.id == id).cloned())
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        let email = email.trim().to_lowercase();
        self.read(|data| data.users.iter().find(|user| user.email == email).cloned())
    }

    pub fn users(&self) -> Vec<User> {
        self.read(|data| data.users.clone())
    }

    pub fn set_place(&self, id: u64, place: Place) -> Result<User, StoreError> {
        self.mutate(|data| {
            let user = data.user_mut(id)?;
            match user.places.first_mut() {
                Some(current) => *current = place,
                None => user.places.push(place),
            }
            Ok(user.clone())
        })
    }

    pub fn update_preferences(
        &self,
        id: u64,
        update: impl FnOnce(&mut NotificationPreferences, &mut Language),
    ) -> Result<User, StoreError> {
        self.mutate(|data| {
            let user = data.user_mut(id)?;
            if user.notifications.is_empty() {
                user.notifications.push(NotificationPreferences::default());
            }
            update(&mut user.notifications[0], &mut user.language);
            Ok(user.clone())
        })
    }

    /// Registers a push subscription; re-registering an endpoint replaces its keys.
    pub fn add_subscription(&self, id: u64, subscription: Subscription) -> Result<User, StoreError> {
        self.mutate(|data| {
            let user = data.user_mut(id)?;
            user.subscriptions
                .retain(|existing| existing.endpoint != subscription.endpoint);
            user.subscriptions.push(subscription);
            Ok(user.clone())
        })
    }

    pub fn remove_subscription(&self, id: u64, endpoint: &str) -> Result<bool, StoreError> {
        self.mutate(|data| {
            let user = data.user_mut(id)?;
            let before = user.subscriptions.len();
            user.subscriptions
                .retain(|existing| existing.endpoint != endpoint);
            Ok(user.subscriptions.len() != before)
        })
    }

    /// Inserts a record; at most one record exists per (user, event id).
    pub fn insert_record(
        &self,
        record: NewSeismicEventRecord,
        created_at: OffsetDateTime,
    ) -> Result<SeismicEventRecord, StoreError> {
        self.mutate(|data| {
            if !data.users.iter().any(|user| user.id == record.user) {
                return Err(StoreError::NotFound {
                    entity: "user",
                    id: record.user,
                });
            }
            if data
                .records
                .iter()
                .any(|existing| existing.user == record.user && existing.event_id == record.event_id)
            {
                return Err(StoreError::Duplicate {
                    user: record.user,
                    event_id: record.event_id,
                });
            }
            let record = SeismicEventRecord {
                id: data.allocate_id(),
                user: record.user,
                event_id: record.event_id,
                time: record.time,
                mag_type: record.mag_type,
                magnitude: record.magnitude,
                geometry: record.geometry,
                place: record.place,
                proximity: record.proximity,
                created_at,
            };
            data.records.push(record.clone());
            Ok(record)
        })
    }

    pub fn records_for_user(&self, user: u64, pagination: Pagination) -> Page<SeismicEventRecord> {
        let mut records: Vec<SeismicEventRecord> = self.read(|data| {
            data.records
                .iter()
                .filter(|record| record.user == user)
                .cloned()
                .collect()
        });

        records.sort_by(|a, b| {
            let ordering = match pagination.sort {
                SortKey::Time => a.time.cmp(&b.time),
                SortKey::Magnitude => a.magnitude.total_cmp(&b.magnitude),
                SortKey::Proximity => a.proximity.total_cmp(&b.proximity),
            };
            match pagination.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let total = records.len();
        let skip = pagination.page.saturating_sub(1).saturating_mul(pagination.limit);
        let items = records
            .into_iter()
            .skip(skip)
            .take(pagination.limit)
            .collect();
        Page {
            items,
            page: pagination.page,
            limit: pagination.limit,
            total,
        }
    }

    pub fn delete_record(&self, user: u64, id: u64) -> Result<(), StoreError> {
        self.mutate(|data| {
            let position = data
                .records
                .iter()
                .position(|record| record.id == id && record.user == user)
                .ok_or(StoreError::NotFound {
                    entity: "seismic event",
                    id,
                })?;
            data.records.remove(position);
            Ok(())
        })
    }

    pub fn push_inbox(
        &self,
        user: u64,
        kind: InAppKind,
        event_id: &str,
        title: String,
        body: String,
        created_at: OffsetDateTime,
    ) -> Result<InAppNotification, StoreError> {
        self.mutate(|data| {
            let notification = InAppNotification {
                id: data.allocate_id(),
                user,
                kind,
                event_id: event_id.to_string(),
                title,
                body,
                created_at,
            };
            data.inbox.push(notification.clone());

            let owned = data.inbox.iter().filter(|entry| entry.user == user).count();
            let mut excess = owned.saturating_sub(INBOX_LIMIT_PER_USER);
            data.inbox.retain(|entry| {
                if excess > 0 && entry.user == user {
                    excess -= 1;
                    return false;
                }
                true
            });
            Ok(notification)
        })
    }

    pub fn delete_inbox(&self, user: u64, id: u64) -> Result<(), StoreError> {
        self.mutate(|data| {
            let position = data
                .inbox
                .iter()
                .position(|entry| entry.id == id && entry.user == user)
                .ok_or(StoreError::NotFound {
                    entity: "notification",
                    id,
                })?;
            data.inbox.remove(position);
            Ok(())
        })
    }

    /// In-app notifications for a user, newest first.
    pub fn inbox(&self, user: u64) -> Vec<InAppNotification> {
        let mut entries: Vec<InAppNotification> = self.read(|data| {
            data.inbox
                .iter()
                .filter(|entry| entry.user == user)
                .cloned()
                .collect()
        });
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        entries
    }
}

/// Writes through a temp file in the same directory, then renames over `path`.
pub(crate) fn atomic_write(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("missing parent directory"))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("store.json");
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    for attempt in 0..10u32 {
        let temp_path = parent.join(format!(".{file_name}.tmp-{pid}-{nanos}-{attempt}"));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(mut file) => {
                file.write_all(contents.as_bytes())?;
                file.sync_all()?;
                std::fs::rename(&temp_path, path)?;
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to create temp file",
    ))
}
