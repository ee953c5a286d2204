//! Kids Activities Cache
//!
//! Namespaced wrappers used by the data-access layer: activity listings by
//! filter, per-child progress, achievements and profiles, per-activity
//! completions and a parent's child profiles. Payloads are captured as JSON
//! with [`JsonSnapshot`], so self-referential values are stored with their
//! loops cut, and decoded back into the caller's type on read.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{CacheKey, Clock, JsonSnapshot, KeyBuilder, SharedCache, SystemClock, Ttl};

// == Namespaces ==
pub mod namespaces {
    pub const ACTIVITIES: &str = "activities";
    pub const PROGRESS: &str = "progress";
    pub const ACHIEVEMENTS: &str = "achievements";
    pub const PROFILE: &str = "profile";
    pub const PROFILES: &str = "profiles";
    pub const COMPLETIONS: &str = "completions";
}

/// Identifier under which activity listings are keyed.
const LIST_IDENTIFIER: &str = "list";

/// Lifetimes for each namespace.
pub const DEFAULT_NAMESPACE_TTLS: [(&str, Duration); 6] = [
    (namespaces::ACTIVITIES, Duration::from_secs(5 * 60)),
    (namespaces::PROGRESS, Duration::from_secs(2 * 60)),
    (namespaces::ACHIEVEMENTS, Duration::from_secs(10 * 60)),
    (namespaces::PROFILE, Duration::from_secs(5 * 60)),
    (namespaces::PROFILES, Duration::from_secs(5 * 60)),
    (namespaces::COMPLETIONS, Duration::from_secs(60)),
];

// == Child Data ==
/// Everything cached about one child.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Value>,
}

// == Kids Cache ==
/// Domain facade over a shared cache.
#[derive(Clone)]
pub struct KidsCache<C = SystemClock> {
    cache: SharedCache<Value, C>,
}

impl<C: Clock> KidsCache<C> {
    pub fn new(cache: SharedCache<Value, C>) -> Self {
        Self { cache }
    }

    /// The underlying shared cache.
    pub fn shared(&self) -> &SharedCache<Value, C> {
        &self.cache
    }

    // == Keys ==
    /// Key for an activity listing under the given filter object.
    pub fn activities_key<F: Serialize + ?Sized>(filters: &F) -> CacheKey {
        KeyBuilder::build_json(
            namespaces::ACTIVITIES,
            LIST_IDENTIFIER,
            &JsonSnapshot::capture(filters),
        )
    }

    pub fn progress_key(child_id: &str) -> CacheKey {
        KeyBuilder::plain(namespaces::PROGRESS, child_id)
    }

    pub fn achievements_key(child_id: &str) -> CacheKey {
        KeyBuilder::plain(namespaces::ACHIEVEMENTS, child_id)
    }

    pub fn profile_key(child_id: &str) -> CacheKey {
        KeyBuilder::plain(namespaces::PROFILE, child_id)
    }

    pub fn profiles_key(parent_id: &str) -> CacheKey {
        KeyBuilder::plain(namespaces::PROFILES, parent_id)
    }

    pub fn completions_key(child_id: &str, activity_id: &str) -> CacheKey {
        KeyBuilder::plain(namespaces::COMPLETIONS, &format!("{child_id}:{activity_id}"))
    }

    // == Activities ==
    pub async fn cache_activities<F, T>(&self, filters: &F, activities: &T)
    where
        F: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        self.put(&Self::activities_key(filters), activities).await;
    }

    pub async fn cached_activities<F, T>(&self, filters: &F) -> Option<T>
    where
        F: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.fetch(&Self::activities_key(filters)).await
    }

    // == Child Progress ==
    pub async fn cache_child_progress<T: Serialize + ?Sized>(&self, child_id: &str, progress: &T) {
        self.put(&Self::progress_key(child_id), progress).await;
    }

    pub async fn cached_child_progress<T: DeserializeOwned>(&self, child_id: &str) -> Option<T> {
        self.fetch(&Self::progress_key(child_id)).await
    }

    // == Child Achievements ==
    pub async fn cache_child_achievements<T: Serialize + ?Sized>(
        &self,
        child_id: &str,
        achievements: &T,
    ) {
        self.put(&Self::achievements_key(child_id), achievements).await;
    }

    pub async fn cached_child_achievements<T: DeserializeOwned>(
        &self,
        child_id: &str,
    ) -> Option<T> {
        self.fetch(&Self::achievements_key(child_id)).await
    }

    // == Child Profile ==
    pub async fn cache_child_profile<T: Serialize + ?Sized>(&self, child_id: &str, profile: &T) {
        self.put(&Self::profile_key(child_id), profile).await;
    }

    pub async fn cached_child_profile<T: DeserializeOwned>(&self, child_id: &str) -> Option<T> {
        self.fetch(&Self::profile_key(child_id)).await
    }

    // == Parent's Child Profiles ==
    pub async fn cache_child_profiles<T: Serialize + ?Sized>(&self, parent_id: &str, profiles: &T) {
        self.put(&Self::profiles_key(parent_id), profiles).await;
    }

    pub async fn cached_child_profiles<T: DeserializeOwned>(&self, parent_id: &str) -> Option<T> {
        self.fetch(&Self::profiles_key(parent_id)).await
    }

    // == Activity Completions ==
    pub async fn cache_activity_completions<T: Serialize + ?Sized>(
        &self,
        child_id: &str,
        activity_id: &str,
        completions: &T,
    ) {
        self.put(&Self::completions_key(child_id, activity_id), completions)
            .await;
    }

    pub async fn cached_activity_completions<T: DeserializeOwned>(
        &self,
        child_id: &str,
        activity_id: &str,
    ) -> Option<T> {
        self.fetch(&Self::completions_key(child_id, activity_id))
            .await
    }

    // == Child Data ==
    /// Caches whichever parts of `data` are present.
    pub async fn update_child_data(&self, child_id: &str, data: &ChildData) {
        if let Some(progress) = &data.progress {
            self.cache_child_progress(child_id, progress).await;
        }
        if let Some(achievements) = &data.achievements {
            self.cache_child_achievements(child_id, achievements).await;
        }
        if let Some(profile) = &data.profile {
            self.cache_child_profile(child_id, profile).await;
        }
    }

    pub async fn cached_child_data(&self, child_id: &str) -> ChildData {
        ChildData {
            progress: self.cached_child_progress(child_id).await,
            achievements: self.cached_child_achievements(child_id).await,
            profile: self.cached_child_profile(child_id).await,
        }
    }

    // == Invalidation ==
    /// Drops every key mentioning the child, in every namespace.
    pub async fn invalidate_child(&self, child_id: &str) -> usize {
        self.cache.write().await.invalidate_matching(child_id)
    }

    /// Drops every cached activity listing.
    pub async fn invalidate_activities(&self) -> usize {
        self.cache
            .write()
            .await
            .invalidate_namespace(namespaces::ACTIVITIES)
    }

    /// Drops the child's progress and achievements only.
    pub async fn invalidate_child_progress(&self, child_id: &str) -> usize {
        let keys = [
            Self::progress_key(child_id),
            Self::achievements_key(child_id),
        ];
        let removed = self.cache.write().await.invalidate_keys(&keys);
        info!(child_id, keys_invalidated = removed, "Child progress cache invalidated");
        removed
    }

    /// Drops the parent's cached child-profile listings.
    pub async fn invalidate_parent(&self, parent_id: &str) -> usize {
        let fragment = Self::profiles_key(parent_id);
        self.cache
            .write()
            .await
            .invalidate_matching(fragment.as_str())
    }

    // == Encoding ==
    async fn put<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) {
        let value = JsonSnapshot::capture(value);
        self.cache
            .write()
            .await
            .set(key.as_str(), value, Ttl::Default);
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.cache.write().await.get(key.as_str())?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(key = %key, error = %err, "Cached value has an unexpected shape");
                None
            }
        }
    }
}
