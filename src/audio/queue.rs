use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use super::UserId;
use crate::sources::TrackSource;

/// Who asked for a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: UserId,
    pub display_name: String,
}

impl Requester {
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A track admitted to a guild's queue. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub track: TrackSource,
    pub requester: Requester,
    pub added_at: DateTime<Utc>,
}

impl QueuedRequest {
    pub fn new(track: TrackSource, requester: Requester) -> Self {
        Self {
            track,
            requester,
            added_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &str {
        self.track.title()
    }

    pub fn url(&self) -> &str {
        self.track.url()
    }
}

/// Ordered requests of one guild.
///
/// Position 0 is the current item. Order is insertion order unless changed by
/// [`GuildQueue::shuffle_with`] or [`GuildQueue::move_item`]. This type does no
/// locking; the engine serializes access to it.
#[derive(Debug, Clone)]
pub struct GuildQueue {
    items: VecDeque<Arc<QueuedRequest>>,
    max_size: usize,
}

impl GuildQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Agrega al final de la cola. Devuelve la posición, o `None` si está llena.
    pub fn try_push(&mut self, request: Arc<QueuedRequest>) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        self.items.push_back(request);
        Some(self.items.len() - 1)
    }

    pub fn current(&self) -> Option<&Arc<QueuedRequest>> {
        self.items.front()
    }

    /// Drops the current item and returns it. The next item, if any, becomes current.
    pub fn advance(&mut self) -> Option<Arc<QueuedRequest>> {
        self.items.pop_front()
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    /// Keeps only the current item. Returns how many were discarded.
    pub fn truncate_to_current(&mut self) -> usize {
        let removed = self.items.len().saturating_sub(1);
        self.items.truncate(1);
        removed
    }

    /// Unbiased Fisher-Yates over positions `1..len`; position 0 stays pinned.
    ///
    /// Returns `false` without touching the queue when there are fewer than two items.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.items.len() <= 1 {
            return false;
        }

        self.items.make_contiguous()[1..].shuffle(rng);
        true
    }

    /// Moves the item at `from` so it ends up at `to`, shifting the ones in between.
    ///
    /// Position 0 is not special here: moving it changes the current item.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        let len = self.items.len();
        if from >= len || to >= len || from == to {
            return false;
        }

        match self.items.remove(from) {
            Some(item) => {
                self.items.insert(to, item);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<Arc<QueuedRequest>> {
        self.items.remove(index)
    }

    /// Limpia duplicados por URL, conservando la primera aparición.
    pub fn remove_duplicates(&mut self) -> usize {
        let mut seen = HashSet::new();
        let original_len = self.items.len();

        self.items.retain(|item| seen.insert(item.url().to_string()));

        original_len - self.items.len()
    }

    /// Drops every request of `user` except the current item.
    pub fn remove_requested_by(&mut self, user: &UserId) -> usize {
        let original_len = self.items.len();
        let mut position = 0;

        self.items.retain(|item| {
            let keep = position == 0 || &item.requester.id != user;
            position += 1;
            keep
        });

        original_len - self.items.len()
    }

    pub fn snapshot(&self) -> Vec<Arc<QueuedRequest>> {
        self.items.iter().cloned().collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(|item| item.track.duration()).sum()
    }

    pub fn info(&self) -> QueueInfo {
        QueueInfo {
            current: self.items.front().cloned(),
            upcoming: self.items.iter().skip(1).cloned().collect(),
            total_items: self.items.len(),
            total_duration: self.total_duration(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueueInfo {
    pub current: Option<Arc<QueuedRequest>>,
    pub upcoming: Vec<Arc<QueuedRequest>>,
    pub total_items: usize,
    pub total_duration: Duration,
}

impl QueueInfo {
    /// Obtiene una página específica de los tracks pendientes (1-based)
    pub fn page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let safe_page = page.max(1);
        let total = self.upcoming.len();
        let total_pages = if total == 0 {
            1
        } else {
            total.div_ceil(items_per_page)
        };

        // Páginas fuera de rango devuelven una lista vacía
        let items = match (safe_page - 1).checked_mul(items_per_page) {
            Some(start) if start < total => {
                let end = start.saturating_add(items_per_page).min(total);
                self.upcoming[start..end].to_vec()
            }
            _ => Vec::new(),
        };

        QueuePage {
            items,
            current_page: safe_page,
            total_pages,
            total_items: total,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Arc<QueuedRequest>>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}
