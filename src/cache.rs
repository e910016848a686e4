//! Arena-backed cache mapping canonical graph keys to polynomials.
//!
//! All entries live in one contiguous byte arena, referenced by byte
//! offsets; buckets are vectors of offsets with the most recently used
//! entry at the front. Offsets (rather than pointers) make compaction
//! and resizing a matter of shifting integers.
//!
//! Entry layout, all fields little-endian `u32`:
//!
//! ```text
//! [size][key_len][graph_id][hit_count][live] key-bytes poly-bytes
//! ```
//!
//! `size` is the whole entry including the header, so a linear walk of
//! `[0, next_p)` visits every entry ever appended; `live` marks entries
//! that eviction has removed but compaction has not yet reclaimed.
//!
//! When an insertion would overflow the arena, the cache evicts (either
//! the usage-aware hit-count policy or random replacement) and compacts
//! until the entry fits. Entries for graphs with at least
//! `min_replace_size` vertices are pinned and never evicted.

use std::hash::Hasher;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::{FxHashMap, FxHasher};

use crate::canon::GraphKey;
use crate::error::Error;
use crate::poly::FactorPoly;

const HEADER: usize = 20;
const OFF_SIZE: usize = 0;
const OFF_KEY_LEN: usize = 4;
const OFF_GRAPH_ID: usize = 8;
const OFF_HIT_COUNT: usize = 12;
const OFF_LIVE: usize = 16;

pub struct GraphCache {
    arena: Vec<u8>,
    /// Frontier: entries occupy `[0, next_p)`.
    next_p: usize,
    buckets: Vec<Vec<usize>>,
    hits: u64,
    misses: u64,
    collisions: u64,
    num_entries: u64,
    replacement: f64,
    min_replace_size: u32,
    random_replacement: bool,
    rng: ChaCha8Rng,
}

impl GraphCache {
    /// A cache with `capacity` arena bytes and `nbuckets` buckets.
    pub fn new(capacity: usize, nbuckets: usize) -> Self {
        assert!(nbuckets > 0, "cache needs at least one bucket");
        GraphCache {
            arena: vec![0; capacity],
            next_p: 0,
            buckets: vec![Vec::new(); nbuckets],
            hits: 0,
            misses: 0,
            collisions: 0,
            num_entries: 0,
            replacement: 0.3,
            min_replace_size: u32::MAX,
            random_replacement: false,
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    pub fn num_hits(&self) -> u64 {
        self.hits
    }
    pub fn num_misses(&self) -> u64 {
        self.misses
    }
    pub fn num_collisions(&self) -> u64 {
        self.collisions
    }
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Bytes in use.
    pub fn size(&self) -> usize {
        self.next_p
    }
    pub fn capacity(&self) -> usize {
        self.arena.len()
    }

    /// Entries per used byte.
    pub fn density(&self) -> f64 {
        if self.next_p == 0 {
            0.0
        } else {
            self.num_entries as f64 / self.next_p as f64
        }
    }

    pub fn set_replacement(&mut self, ratio: f64) {
        self.replacement = ratio;
    }

    pub fn set_random_replacement(&mut self) {
        self.random_replacement = true;
    }

    /// Pin graphs with at least `minsize` vertices: they are never
    /// evicted.
    pub fn set_replace_size(&mut self, minsize: u32) {
        self.min_replace_size = minsize;
    }

    /// Seed the eviction RNG (random replacement policy).
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    pub fn clear(&mut self) {
        self.next_p = 0;
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.num_entries = 0;
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.collisions = 0;
    }

    fn read_u32(&self, pos: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.arena[pos..pos + 4]);
        u32::from_le_bytes(word)
    }

    fn write_u32(&mut self, pos: usize, v: u32) {
        self.arena[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn entry_size(&self, off: usize) -> usize {
        self.read_u32(off + OFF_SIZE) as usize
    }

    fn entry_live(&self, off: usize) -> bool {
        self.read_u32(off + OFF_LIVE) != 0
    }

    fn entry_key(&self, off: usize) -> &[u8] {
        let key_len = self.read_u32(off + OFF_KEY_LEN) as usize;
        &self.arena[off + HEADER..off + HEADER + key_len]
    }

    fn entry_poly(&self, off: usize) -> &[u8] {
        let size = self.entry_size(off);
        let key_len = self.read_u32(off + OFF_KEY_LEN) as usize;
        &self.arena[off + HEADER + key_len..off + size]
    }

    fn bucket_of(&self, key: &[u8]) -> usize {
        hash_key(key) as usize % self.buckets.len()
    }

    /// Probe for a canonical key. A hit bumps the entry's hit count,
    /// moves it to the front of its bucket, and deserializes the stored
    /// polynomial.
    pub fn lookup(&mut self, key: &[u8]) -> Result<Option<(FactorPoly, u32)>, Error> {
        let b = self.bucket_of(key);
        let mut found = None;
        for pos in 0..self.buckets[b].len() {
            let off = self.buckets[b][pos];
            if self.entry_key(off) == key {
                found = Some((pos, off));
                break;
            }
            self.collisions += 1;
        }
        let Some((pos, off)) = found else {
            self.misses += 1;
            return Ok(None);
        };
        let hit_count = self.read_u32(off + OFF_HIT_COUNT);
        self.write_u32(off + OFF_HIT_COUNT, hit_count + 1);
        // Move-to-front.
        self.buckets[b].remove(pos);
        self.buckets[b].insert(0, off);
        let poly = FactorPoly::deserialize(self.entry_poly(off))?;
        let id = self.read_u32(off + OFF_GRAPH_ID);
        self.hits += 1;
        Ok(Some((poly, id)))
    }

    /// Store a polynomial under a canonical key.
    ///
    /// Fails with [`Error::CacheExhausted`] when the entry cannot fit in
    /// the arena at all, or when an eviction round frees nothing (every
    /// remaining entry pinned) and the entry still does not fit.
    pub fn store(&mut self, key: &[u8], poly: &FactorPoly, id: u32) -> Result<(), Error> {
        let mut pbuf = Vec::new();
        poly.serialize(&mut pbuf);
        let size = HEADER + key.len() + pbuf.len();
        if size > self.arena.len() {
            return Err(Error::CacheExhausted {
                requested: size,
                capacity: self.arena.len(),
            });
        }

        let mut barren_rounds = 0;
        while self.next_p + size > self.arena.len() {
            let freed = if self.random_replacement {
                self.randomly_remove_entries()
            } else {
                self.remove_unused_entries()
            };
            self.compact();
            // The usage-aware policy frees nothing only when every
            // entry is pinned; the random policy can come up empty by
            // chance, so give it a bounded number of retries.
            barren_rounds = if freed == 0 { barren_rounds + 1 } else { 0 };
            let limit = if self.random_replacement { 64 } else { 1 };
            if barren_rounds >= limit && self.next_p + size > self.arena.len() {
                return Err(Error::CacheExhausted {
                    requested: size,
                    capacity: self.arena.len(),
                });
            }
        }

        let off = self.next_p;
        self.next_p += size;
        self.write_u32(off + OFF_SIZE, size as u32);
        self.write_u32(off + OFF_KEY_LEN, key.len() as u32);
        self.write_u32(off + OFF_GRAPH_ID, id);
        self.write_u32(off + OFF_HIT_COUNT, 0);
        self.write_u32(off + OFF_LIVE, 1);
        self.arena[off + HEADER..off + HEADER + key.len()].copy_from_slice(key);
        self.arena[off + HEADER + key.len()..off + size].copy_from_slice(&pbuf);

        let b = self.bucket_of(key);
        self.buckets[b].insert(0, off);
        self.num_entries += 1;
        Ok(())
    }

    /// Usage-aware eviction: drop entries with `hit_count < h` for
    /// `h = 1, 2, ...` until the freed bytes reach the replacement ratio
    /// of current usage. Pinned entries survive. Returns bytes freed.
    fn remove_unused_entries(&mut self) -> usize {
        let target = self.replacement * self.next_p as f64;
        let mut freed = 0usize;
        let mut hc = 0u32;
        while (freed as f64) < target {
            hc += 1;
            let mut unpinned_left = false;
            for b in 0..self.buckets.len() {
                let offs = std::mem::take(&mut self.buckets[b]);
                let mut kept = Vec::with_capacity(offs.len());
                for off in offs {
                    let n = GraphKey::num_real_vertices(self.entry_key(off));
                    if n >= self.min_replace_size {
                        kept.push(off);
                        continue;
                    }
                    if self.read_u32(off + OFF_HIT_COUNT) < hc {
                        self.write_u32(off + OFF_LIVE, 0);
                        freed += self.entry_size(off);
                        self.num_entries -= 1;
                    } else {
                        unpinned_left = true;
                        kept.push(off);
                    }
                }
                self.buckets[b] = kept;
            }
            if !unpinned_left {
                break;
            }
        }
        freed
    }

    /// Random eviction: each unpinned entry dies with probability
    /// `replacement`. Returns bytes freed.
    fn randomly_remove_entries(&mut self) -> usize {
        let mut freed = 0usize;
        for b in 0..self.buckets.len() {
            let offs = std::mem::take(&mut self.buckets[b]);
            let mut kept = Vec::with_capacity(offs.len());
            for off in offs {
                let n = GraphKey::num_real_vertices(self.entry_key(off));
                if n < self.min_replace_size && self.rng.gen::<f64>() < self.replacement {
                    self.write_u32(off + OFF_LIVE, 0);
                    freed += self.entry_size(off);
                    self.num_entries -= 1;
                } else {
                    kept.push(off);
                }
            }
            self.buckets[b] = kept;
        }
        freed
    }

    /// Slide live entries left over the holes eviction left behind and
    /// pull `next_p` back, remapping every bucket offset.
    fn compact(&mut self) {
        let mut remap: FxHashMap<usize, usize> = FxHashMap::default();
        let mut read = 0usize;
        let mut write = 0usize;
        while read < self.next_p {
            let size = self.entry_size(read);
            debug_assert!(size >= HEADER && read + size <= self.next_p);
            if self.entry_live(read) {
                if write != read {
                    self.arena.copy_within(read..read + size, write);
                }
                remap.insert(read, write);
                write += size;
            }
            read += size;
        }
        self.next_p = write;
        for bucket in &mut self.buckets {
            for off in bucket.iter_mut() {
                *off = remap[off];
            }
        }
    }

    /// Change the arena capacity. Offsets are arena-relative, so live
    /// entries survive untouched; shrinking below current usage fails.
    pub fn resize(&mut self, capacity: usize) -> Result<(), Error> {
        if self.next_p > capacity {
            return Err(Error::OutOfMemory(format!(
                "cache holds {} bytes, cannot resize to {}",
                self.next_p, capacity
            )));
        }
        self.arena.resize(capacity, 0);
        self.arena.shrink_to_fit();
        Ok(())
    }

    /// Change the bucket count, rehashing every live entry.
    pub fn rebucket(&mut self, nbuckets: usize) {
        assert!(nbuckets > 0, "cache needs at least one bucket");
        let old = std::mem::replace(&mut self.buckets, vec![Vec::new(); nbuckets]);
        for bucket in old {
            for off in bucket {
                let b = hash_key(self.entry_key(off)) as usize % nbuckets;
                self.buckets[b].insert(0, off);
            }
        }
    }

    pub fn bucket_length(&self, b: usize) -> usize {
        self.buckets[b].len()
    }

    pub fn min_bucket_size(&self) -> usize {
        self.buckets.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn max_bucket_size(&self) -> usize {
        self.buckets.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Iterate live entries as `(key bytes, hit count)`.
    pub fn entries(&self) -> Entries<'_> {
        Entries { cache: self, off: 0 }
    }
}

fn hash_key(key: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(key);
    hasher.finish()
}

pub struct Entries<'a> {
    cache: &'a GraphCache,
    off: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a [u8], u32);

    fn next(&mut self) -> Option<Self::Item> {
        while self.off < self.cache.next_p {
            let off = self.off;
            let size = self.cache.entry_size(off);
            self.off += size;
            if self.cache.entry_live(off) {
                let key = self.cache.entry_key(off);
                let hits = self.cache.read_u32(off + OFF_HIT_COUNT);
                return Some((key, hits));
            }
        }
        None
    }
}
