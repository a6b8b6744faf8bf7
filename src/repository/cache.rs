//! Read-through caching in front of a [`DataRepository`].
//!
//! The cache is optional: every cached read first asks
//! [`Cache::available`] and goes straight to the wrapped repository when the
//! cache is down. Values are stored as JSON so that any backend holding
//! strings can implement [`Cache`].
//!
//! Generation never reads cached child or therapist records: the
//! [`DataRepository`] fetches always hit the wrapped store. The cached lists
//! are served by [`CachedRepository::active_children`] and
//! [`CachedRepository::active_therapists`], and are dropped by every record
//! change made through the decorator.
//!
//! | Key | Example | TTL |
//! |-----|---------|-----|
//! | Week timetable | `timetable:week:2024-01-01` | 24 h |
//! | Active children | `children:active:1,2,3` | 30 min |
//! | Active therapists | `therapists:active:4,5` | 30 min |

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{DataRepository, InMemoryRepository, RepositoryResult};
use crate::models::{Assignment, Child, ChildId, Therapist, TherapistId, WeekStart};
use crate::scheduler::WeekOverview;

const WEEK_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const LIST_TTL: Duration = Duration::from_secs(30 * 60);

/// Prefix shared by all child list keys.
pub const CHILDREN_PREFIX: &str = "children:";
/// Prefix shared by all therapist list keys.
pub const THERAPISTS_PREFIX: &str = "therapists:";

/// A cached resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    WeekTimetable(WeekStart),
    ActiveChildren(Vec<ChildId>),
    ActiveTherapists(Vec<TherapistId>),
}

impl CacheKey {
    /// Storage key.
    pub fn key(&self) -> String {
        match self {
            Self::WeekTimetable(week) => format!("timetable:week:{week}"),
            Self::ActiveChildren(ids) => format!("{CHILDREN_PREFIX}active:{}", join_ids(ids)),
            Self::ActiveTherapists(ids) => format!("{THERAPISTS_PREFIX}active:{}", join_ids(ids)),
        }
    }

    pub fn ttl(&self) -> Duration {
        match self {
            Self::WeekTimetable(_) => WEEK_TTL,
            Self::ActiveChildren(_) | Self::ActiveTherapists(_) => LIST_TTL,
        }
    }
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// A key-value cache with per-entry expiry.
pub trait Cache: Send + Sync {
    /// Whether the backend can currently be used.
    fn available(&self) -> bool;

    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` for `ttl`. Returns `false` if the value was not stored.
    fn set(&self, key: &str, value: Value, ttl: Duration) -> bool;

    /// Removes one entry. Returns whether it existed.
    fn invalidate(&self, key: &str) -> bool;

    /// Removes every entry whose key starts with `prefix`.
    fn invalidate_prefix(&self, prefix: &str) -> usize;
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|e| e.values().filter(|(_, expires)| *expires > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for InMemoryCache {
    fn available(&self) -> bool {
        self.entries.lock().is_ok()
    }

    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> bool {
        let Ok(mut entries) = self.entries.lock() else {
            return false;
        };
        entries.insert(key.to_string(), (value, Instant::now() + ttl));
        true
    }

    fn invalidate(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|mut e| e.remove(key).is_some())
            .unwrap_or(false)
    }

    fn invalidate_prefix(&self, prefix: &str) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        before - entries.len()
    }
}

/// A cache that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

impl Cache for DisabledCache {
    fn available(&self) -> bool {
        false
    }

    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value, _ttl: Duration) -> bool {
        false
    }

    fn invalidate(&self, _key: &str) -> bool {
        false
    }

    fn invalidate_prefix(&self, _prefix: &str) -> usize {
        0
    }
}

/// Repository decorator adding read-through caching.
#[derive(Debug)]
pub struct CachedRepository<R, C> {
    inner: R,
    cache: C,
}

impl<R: DataRepository, C: Cache> CachedRepository<R, C> {
    pub fn new(inner: R, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Drops cached child lists after a child record changed.
    pub fn invalidate_children(&self) -> usize {
        self.cache.invalidate_prefix(CHILDREN_PREFIX)
    }

    /// Drops cached therapist lists after a therapist record changed.
    pub fn invalidate_therapists(&self) -> usize {
        self.cache.invalidate_prefix(THERAPISTS_PREFIX)
    }

    /// Active children among `ids`, served from the cache when possible.
    pub fn active_children(&self, ids: &[ChildId]) -> RepositoryResult<Vec<Child>> {
        self.read_through(CacheKey::ActiveChildren(ids.to_vec()), || {
            self.inner.fetch_active_children_with_needs(ids)
        })
    }

    /// Active therapists among `ids`, served from the cache when possible.
    pub fn active_therapists(&self, ids: &[TherapistId]) -> RepositoryResult<Vec<Therapist>> {
        self.read_through(CacheKey::ActiveTherapists(ids.to_vec()), || {
            self.inner.fetch_available_therapists_with_schedule(ids)
        })
    }

    fn read_through<T, F>(&self, key: CacheKey, load: F) -> RepositoryResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> RepositoryResult<T>,
    {
        if !self.cache.available() {
            warn!(key = %key.key(), "cache unavailable, reading from repository");
            return load();
        }

        let storage_key = key.key();
        if let Some(hit) = self.cache.get(&storage_key) {
            match serde_json::from_value(hit) {
                Ok(value) => {
                    debug!(key = %storage_key, "cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(key = %storage_key, error = %err, "discarding unreadable cache entry");
                    self.cache.invalidate(&storage_key);
                }
            }
        }

        let value = load()?;
        match serde_json::to_value(&value) {
            Ok(json) => {
                self.cache.set(&storage_key, json, key.ttl());
            }
            Err(err) => warn!(key = %storage_key, error = %err, "value not cacheable"),
        }
        Ok(value)
    }

    fn invalidate_week(&self, week: WeekStart) {
        if self.cache.available() {
            self.cache.invalidate(&CacheKey::WeekTimetable(week).key());
        }
    }
}

/// Record changes that keep the cached lists in step.
impl<C: Cache> CachedRepository<InMemoryRepository, C> {
    pub fn set_child_active(&self, id: ChildId, active: bool) -> RepositoryResult<()> {
        self.inner.set_child_active(id, active)?;
        self.invalidate_children();
        Ok(())
    }

    pub fn set_therapist_active(&self, id: TherapistId, active: bool) -> RepositoryResult<()> {
        self.inner.set_therapist_active(id, active)?;
        self.invalidate_therapists();
        Ok(())
    }

    pub fn set_window_available(
        &self,
        therapist_id: TherapistId,
        index: usize,
        available: bool,
    ) -> RepositoryResult<()> {
        self.inner.set_window_available(therapist_id, index, available)?;
        self.invalidate_therapists();
        Ok(())
    }
}

impl<R: DataRepository, C: Cache> DataRepository for CachedRepository<R, C> {
    fn fetch_active_children_with_needs(&self, ids: &[ChildId]) -> RepositoryResult<Vec<Child>> {
        self.inner.fetch_active_children_with_needs(ids)
    }

    fn fetch_available_therapists_with_schedule(
        &self,
        ids: &[TherapistId],
    ) -> RepositoryResult<Vec<Therapist>> {
        self.inner.fetch_available_therapists_with_schedule(ids)
    }

    fn previous_week_loads(&self, week: WeekStart) -> RepositoryResult<HashMap<TherapistId, u32>> {
        self.inner.previous_week_loads(week)
    }

    fn current_week_loads(&self, week: WeekStart) -> RepositoryResult<HashMap<TherapistId, u32>> {
        self.inner.current_week_loads(week)
    }

    fn sessions_exist(&self, week: WeekStart) -> RepositoryResult<bool> {
        self.inner.sessions_exist(week)
    }

    fn clear_week(&self, week: WeekStart) -> RepositoryResult<usize> {
        let removed = self.inner.clear_week(week)?;
        self.invalidate_week(week);
        Ok(removed)
    }

    fn bulk_create_sessions(&self, assignments: &[Assignment]) -> RepositoryResult<usize> {
        let created = self.inner.bulk_create_sessions(assignments)?;
        let weeks: BTreeSet<WeekStart> = assignments.iter().map(|a| a.week_starting).collect();
        for week in weeks {
            self.invalidate_week(week);
        }
        Ok(created)
    }

    fn week_overview(&self, week: WeekStart) -> RepositoryResult<WeekOverview> {
        self.read_through(CacheKey::WeekTimetable(week), || {
            self.inner.week_overview(week)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AvailabilityWindow, DayOfWeek, DepartmentNeed};
    use crate::repository::InMemoryRepository;
    use chrono::{NaiveDate, NaiveTime};

    fn hm(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn week() -> WeekStart {
        WeekStart::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap()
    }

    fn store() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.add_child(
            Child::new(1, "Ada")
                .with_need(DepartmentNeed::new(10, "Speech", 1))
                .with_availability(AvailabilityWindow::new(DayOfWeek::Monday, hm(9), hm(11))),
        );
        repo.add_therapist(
            Therapist::new(5, "Dr. Lee", 10, "Speech")
                .with_availability(AvailabilityWindow::new(DayOfWeek::Monday, hm(9), hm(11))),
        );
        repo
    }

    fn assignment() -> Assignment {
        Assignment {
            child_id: 1,
            therapist_id: 5,
            department_id: 10,
            date: week().date(),
            start_time: hm(9),
            end_time: hm(10),
            week_starting: week(),
            priority_score: 134,
        }
    }

    #[test]
    fn test_keys_and_ttls() {
        assert_eq!(CacheKey::WeekTimetable(week()).key(), "timetable:week:2024-01-01");
        assert_eq!(CacheKey::ActiveChildren(vec![1, 2]).key(), "children:active:1,2");
        assert_eq!(CacheKey::WeekTimetable(week()).ttl(), Duration::from_secs(86_400));
        assert_eq!(CacheKey::ActiveTherapists(vec![3]).ttl(), Duration::from_secs(1_800));
    }

    #[test]
    fn test_in_memory_cache_expiry() {
        let cache = InMemoryCache::new();
        assert!(cache.set("a", Value::from(1), Duration::from_secs(60)));
        assert!(cache.set("b", Value::from(2), Duration::ZERO));
        assert_eq!(cache.get("a"), Some(Value::from(1)));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_prefix_invalidation() {
        let cache = InMemoryCache::new();
        cache.set("children:active:1", Value::Null, LIST_TTL);
        cache.set("children:active:1,2", Value::Null, LIST_TTL);
        cache.set("therapists:active:5", Value::Null, LIST_TTL);
        assert_eq!(cache.invalidate_prefix(CHILDREN_PREFIX), 2);
        assert!(cache.invalidate("therapists:active:5"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_read_through_serves_stale_until_invalidated() {
        let repo = store();
        let cached = CachedRepository::new(repo.clone(), InMemoryCache::new());

        assert_eq!(cached.active_children(&[1]).unwrap().len(), 1);
        repo.set_child_active(1, false).unwrap();
        // cached list still has the child
        assert_eq!(cached.active_children(&[1]).unwrap().len(), 1);

        assert_eq!(cached.invalidate_children(), 1);
        assert!(cached.active_children(&[1]).unwrap().is_empty());
    }

    #[test]
    fn test_generation_fetches_bypass_cache() {
        let repo = store();
        let cached = CachedRepository::new(repo.clone(), InMemoryCache::new());

        assert_eq!(cached.active_therapists(&[5]).unwrap().len(), 1);
        repo.set_window_available(5, 0, false).unwrap();

        let fetched = cached.fetch_available_therapists_with_schedule(&[5]).unwrap();
        assert!(fetched[0].availability.is_empty());
        assert_eq!(fetched[0].unavailable_windows, 1);
        assert_eq!(cached.fetch_active_children_with_needs(&[1]).unwrap().len(), 1);
    }

    #[test]
    fn test_record_changes_drop_cached_lists() {
        let cached = CachedRepository::new(store(), InMemoryCache::new());

        assert_eq!(cached.active_therapists(&[5]).unwrap()[0].availability.len(), 1);
        cached.set_window_available(5, 0, false).unwrap();
        assert!(cached.active_therapists(&[5]).unwrap()[0].availability.is_empty());

        assert_eq!(cached.active_children(&[1]).unwrap().len(), 1);
        cached.set_child_active(1, false).unwrap();
        assert!(cached.active_children(&[1]).unwrap().is_empty());

        cached.set_therapist_active(5, false).unwrap();
        assert!(cached.active_therapists(&[5]).unwrap().is_empty());
    }

    #[test]
    fn test_failed_record_change_keeps_cache() {
        let cached = CachedRepository::new(store(), InMemoryCache::new());
        cached.active_children(&[1]).unwrap();
        assert!(cached.set_child_active(42, false).is_err());
        assert_eq!(cached.cache().len(), 1);
    }

    #[test]
    fn test_writes_invalidate_week_timetable() {
        let repo = store();
        let cached = CachedRepository::new(repo, InMemoryCache::new());

        assert_eq!(cached.week_overview(week()).unwrap().total_sessions, 0);
        assert_eq!(cached.cache().len(), 1);

        assert_eq!(cached.bulk_create_sessions(&[assignment()]).unwrap(), 1);
        assert_eq!(cached.week_overview(week()).unwrap().total_sessions, 1);

        assert_eq!(cached.clear_week(week()).unwrap(), 1);
        assert_eq!(cached.week_overview(week()).unwrap().total_sessions, 0);
    }

    #[test]
    fn test_disabled_cache_reads_directly() {
        let repo = store();
        let cached = CachedRepository::new(repo.clone(), DisabledCache);

        assert_eq!(cached.active_therapists(&[5]).unwrap().len(), 1);
        repo.set_therapist_active(5, false).unwrap();
        assert!(cached.active_therapists(&[5]).unwrap().is_empty());
    }

    #[test]
    fn test_repository_errors_are_not_cached() {
        let repo = store();
        let cached = CachedRepository::new(repo.clone(), InMemoryCache::new());
        repo.set_healthy(false);
        assert!(cached.week_overview(week()).is_err());
        assert!(cached.cache().is_empty());
        repo.set_healthy(true);
        assert!(cached.week_overview(week()).is_ok());
    }
}
