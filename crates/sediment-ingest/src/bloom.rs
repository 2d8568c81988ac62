//! Primary-key Bloom filters for delete routing.
//!
//! Each segment carries a [`BloomFilterSet`]: one filter for the rows
//! buffered since the last sync ("current") plus one historical filter per
//! synced batch. A probe answers "may contain" over all generations.
//! False positives cost delta space downstream; false negatives must not
//! occur, so filters only ever accumulate bits.
//!
//! Probe positions use enhanced double-hashing over the key's 64-bit
//! fxhash, with the second hash forced odd so it stays coprime with the
//! bit count.

use parking_lot::Mutex;

use crate::types::PrimaryKey;

/// Bits reserved per expected key.
const BITS_PER_KEY: usize = 10;

/// Number of probe positions per key.
const NUM_HASHES: usize = 7;

/// Default per-generation key capacity when none is configured.
pub const DEFAULT_BLOOM_CAPACITY: usize = 100_000;

fn probe_positions(key: u64, num_bits: usize) -> impl Iterator<Item = usize> {
    // splitmix64 finalizer as the second hash; forced odd.
    let mut h2 = key;
    h2 ^= h2 >> 30;
    h2 = h2.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h2 ^= h2 >> 27;
    h2 |= 1;
    (0..NUM_HASHES as u64).map(move |i| (key.wrapping_add(i.wrapping_mul(h2)) % (num_bits as u64)) as usize)
}

/// Bloom filter over primary-key hashes.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: usize,
    inserted: usize,
}

impl BloomFilter {
    /// Creates a filter sized for `num_keys` expected insertions.
    ///
    /// The bit count is rounded up to a multiple of 64 with a minimum of
    /// one word. Inserting past `num_keys` degrades the false-positive
    /// rate but stays correct.
    #[must_use]
    pub fn with_capacity(num_keys: usize) -> Self {
        let raw_bits = num_keys.saturating_mul(BITS_PER_KEY).max(64);
        let num_bits = (raw_bits + 63) & !63;
        Self {
            bits: vec![0u64; num_bits / 64],
            num_bits,
            inserted: 0,
        }
    }

    /// Inserts a key hash.
    pub fn insert(&mut self, key: u64) {
        for pos in probe_positions(key, self.num_bits) {
            self.bits[pos / 64] |= 1u64 << (pos % 64);
        }
        self.inserted += 1;
    }

    /// Returns `false` if the key is definitely absent, `true` if it may
    /// be present.
    #[must_use]
    pub fn maybe_contains(&self, key: u64) -> bool {
        probe_positions(key, self.num_bits).all(|pos| self.bits[pos / 64] & (1u64 << (pos % 64)) != 0)
    }

    /// Number of keys inserted so far.
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.inserted
    }
}

#[derive(Debug, Default)]
struct SetInner {
    current: Option<BloomFilter>,
    history: Vec<BloomFilter>,
}

/// Per-segment set of Bloom filters, shared between the write buffer and
/// the metadata cache.
///
/// The current filter covers rows buffered since the last sync; `roll`
/// retires it into history when a sync task is cut, mirroring the
/// segment's batch boundaries.
#[derive(Debug)]
pub struct BloomFilterSet {
    capacity: usize,
    inner: Mutex<SetInner>,
}

impl BloomFilterSet {
    /// Creates an empty set with the default per-generation capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BLOOM_CAPACITY)
    }

    /// Creates an empty set sizing each generation for `capacity` keys.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(SetInner::default()),
        }
    }

    /// Folds a batch of primary keys into the current generation.
    pub fn update_pk_range(&self, pks: &[PrimaryKey]) {
        if pks.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        let filter = inner
            .current
            .get_or_insert_with(|| BloomFilter::with_capacity(self.capacity));
        for pk in pks {
            filter.insert(pk.probe_hash());
        }
    }

    /// Probes every generation; `true` means the segment may contain `pk`.
    #[must_use]
    pub fn pk_exists(&self, pk: &PrimaryKey) -> bool {
        let hash = pk.probe_hash();
        let inner = self.inner.lock();
        inner
            .current
            .iter()
            .chain(inner.history.iter())
            .any(|f| f.maybe_contains(hash))
    }

    /// Retires the current generation into history.
    ///
    /// Called when the segment's buffered rows are handed to a sync task.
    pub fn roll(&self) {
        let mut inner = self.inner.lock();
        if let Some(current) = inner.current.take() {
            inner.history.push(current);
        }
    }

    /// Number of retired generations.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }
}

impl Default for BloomFilterSet {
    fn default() -> Self {
        Self::new()
    }
}
