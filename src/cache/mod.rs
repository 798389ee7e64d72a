// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! In-memory TTL caches for bulk enumeration queries.
//!
//! A cache holds one populated list. [`TtlCache::get_all`] populates it on a miss and serves it
//! on a hit; [`TtlCache::filter`] pages through the cached list without touching the host. One
//! mutex per cache guards the entry and counters. Population runs outside it, so stats and
//! invalidation never wait on the host; an invalidation that lands during population wins and the
//! populated list is returned but not stored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use schemars::JsonSchema;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::NodeTypeEntry;

pub mod node_types;

/// Value plus population time; `ttl` zero never expires.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub populated_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self { value, populated_at: Instant::now(), ttl }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        !self.ttl.is_zero() && now.saturating_duration_since(self.populated_at) > self.ttl
    }
}

/// Items a cache can filter by category and name.
pub trait Catalogued {
    fn category(&self) -> &str;
    fn name(&self) -> &str;
}

impl Catalogued for NodeTypeEntry {
    fn category(&self) -> &str {
        &self.category
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueQuery {
    /// Case-insensitive exact category match.
    pub category: Option<String>,
    /// Case-insensitive substring of the name.
    pub name_contains: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for CatalogueQuery {
    fn default() -> Self {
        Self { category: None, name_contains: None, limit: 100, offset: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_matched: usize,
    pub has_more: bool,
    pub offset: usize,
}

impl<T> Page<T> {
    fn empty(offset: usize) -> Self {
        Self { items: Vec::new(), total_matched: 0, has_more: false, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct CacheStats {
    pub name: String,
    pub valid: bool,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_populate_ms: Option<u64>,
    pub hit_rate: f64,
    /// Zero means the cache never expires on its own.
    pub ttl_secs: u64,
}

#[derive(Debug)]
struct CacheState<T> {
    entry: Option<CacheEntry<Arc<Vec<T>>>>,
    hits: u64,
    misses: u64,
    invalidations: u64,
    last_populate: Option<Duration>,
    /// Bumped by every invalidation.
    generation: u64,
}

impl<T> CacheState<T> {
    fn live(&self) -> Option<&Arc<Vec<T>>> {
        self.entry.as_ref().filter(|entry| !entry.is_expired()).map(|entry| &entry.value)
    }
}

/// A named cache of one list of `T`.
#[derive(Debug)]
pub struct TtlCache<T> {
    name: &'static str,
    ttl: Duration,
    state: Mutex<CacheState<T>>,
}

impl<T> TtlCache<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            state: Mutex::new(CacheState {
                entry: None,
                hits: 0,
                misses: 0,
                invalidations: 0,
                last_populate: None,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached list, populating it first on a miss.
    ///
    /// A failed population leaves the cache invalid, so the next call tries again. Concurrent
    /// misses may each populate; the last one stored wins.
    pub fn get_all<E>(
        &self,
        populate: impl FnOnce() -> Result<Vec<T>, E>,
    ) -> Result<Arc<Vec<T>>, E>
    where
        E: std::fmt::Display,
    {
        let generation = {
            let mut state = self.lock();
            if let Some(value) = state.live() {
                let value = value.clone();
                state.hits += 1;
                debug!(cache = self.name, "cache hit");
                return Ok(value);
            }
            state.misses += 1;
            state.generation
        };

        info!(cache = self.name, "populating cache");
        let started = Instant::now();
        let items = match populate() {
            Ok(items) => Arc::new(items),
            Err(err) => {
                warn!(cache = self.name, error = %err, "cache population failed");
                return Err(err);
            }
        };
        let elapsed = started.elapsed();

        let mut state = self.lock();
        state.last_populate = Some(elapsed);
        if state.generation == generation {
            state.entry = Some(CacheEntry::new(items.clone(), self.ttl));
        } else {
            debug!(cache = self.name, "invalidated during population; result not stored");
        }
        info!(
            cache = self.name,
            entries = items.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "cache populated"
        );
        Ok(items)
    }

    pub fn is_valid(&self) -> bool {
        self.lock().live().is_some()
    }

    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.entry = None;
        state.invalidations += 1;
        state.generation += 1;
        debug!(cache = self.name, "cache invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let lookups = state.hits + state.misses;
        CacheStats {
            name: self.name.to_owned(),
            valid: state.live().is_some(),
            hits: state.hits,
            misses: state.misses,
            invalidations: state.invalidations,
            entry_count: state.live().map_or(0, |items| items.len()),
            last_populate_ms: state.last_populate.map(|elapsed| elapsed.as_millis() as u64),
            hit_rate: if lookups == 0 { 0.0 } else { state.hits as f64 / lookups as f64 },
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

impl<T: Catalogued + Clone> TtlCache<T> {
    /// Pages through the cached list; an unpopulated or expired cache yields an empty page.
    pub fn filter(&self, query: &CatalogueQuery) -> Page<T> {
        let items = self.lock().live().cloned();
        match items {
            Some(items) => filter_page(&items, query),
            None => Page::empty(query.offset),
        }
    }
}

/// One page of `items` matching `query`, in list order.
pub fn filter_page<T: Catalogued + Clone>(items: &[T], query: &CatalogueQuery) -> Page<T> {
    let category = query.category.as_deref().map(str::to_lowercase);
    let needle = query.name_contains.as_deref().map(str::to_lowercase);
    let matched: Vec<&T> = items
        .iter()
        .filter(|item| {
            category.as_deref().map_or(true, |category| item.category().to_lowercase() == category)
        })
        .filter(|item| {
            needle.as_deref().map_or(true, |needle| item.name().to_lowercase().contains(needle))
        })
        .collect();

    let total_matched = matched.len();
    let end = query.offset.saturating_add(query.limit);
    Page {
        items: matched.into_iter().skip(query.offset).take(query.limit).cloned().collect(),
        total_matched,
        has_more: end < total_matched,
        offset: query.offset,
    }
}

/// Anything the registry can invalidate and report on.
pub trait ManagedCache: Send + Sync {
    fn invalidate(&self);
    fn stats(&self) -> CacheStats;
}

impl<T: Send + Sync> ManagedCache for TtlCache<T> {
    fn invalidate(&self) {
        TtlCache::invalidate(self);
    }

    fn stats(&self) -> CacheStats {
        TtlCache::stats(self)
    }
}

/// Every cache of the process, for scene-level invalidation and reporting.
#[derive(Default)]
pub struct CacheRegistry {
    caches: Vec<Arc<dyn ManagedCache>>,
}

impl CacheRegistry {
    pub fn register(&mut self, cache: Arc<dyn ManagedCache>) {
        self.caches.push(cache);
    }

    pub fn invalidate_all(&self) {
        for cache in &self.caches {
            cache.invalidate();
        }
        info!(caches = self.caches.len(), "all caches invalidated");
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        self.caches.iter().map(|cache| cache.stats()).collect()
    }
}
