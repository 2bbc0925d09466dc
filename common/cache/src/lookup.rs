use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_CAPACITY: usize = 1000;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

struct State<V> {
    entries: HashMap<String, Entry<V>>,
    // Insertion order; stale (key, seq) pairs left by re-inserts are skipped.
    order: VecDeque<(String, u64)>,
    next_seq: u64,
}

/// Key/value cache with a fixed TTL and a bounded entry count.
///
/// Expiry is checked on every read. When an insert pushes the cache over
/// capacity the oldest inserted entries are evicted first.
pub struct LookupCache<V> {
    state: Mutex<State<V>>,
    ttl: Duration,
    capacity: usize,
}

impl<V: Clone> LookupCache<V> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            state: Mutex::new(State { entries: HashMap::new(), order: VecDeque::new(), next_seq: 0 }),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut state = self.lock();
        let expired = match state.entries.get(key) {
            Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = Instant::now();
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(key.clone(), Entry { value, inserted_at: now, seq });
        state.order.push_back((key, seq));
        self.evict(&mut state, now);
    }

    fn evict(&self, state: &mut State<V>, now: Instant) {
        // Fixed TTL means insertion order is also expiry order.
        while let Some((key, seq)) = state.order.front().cloned() {
            let live = state.entries.get(&key).map(|e| e.seq == seq).unwrap_or(false);
            if !live {
                state.order.pop_front();
                continue;
            }
            let expired = state
                .entries
                .get(&key)
                .map(|e| now.duration_since(e.inserted_at) >= self.ttl)
                .unwrap_or(false);
            if expired || state.entries.len() > self.capacity {
                state.order.pop_front();
                state.entries.remove(&key);
                continue;
            }
            break;
        }
        if state.order.len() > self.capacity.saturating_mul(2) {
            let State { entries, order, .. } = state;
            order.retain(|(k, s)| entries.get(k).map(|e| e.seq == *s).unwrap_or(false));
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for LookupCache<V> {
    fn default() -> Self { Self::new(DEFAULT_TTL, DEFAULT_CAPACITY) }
}
