//! Canonical graph keys for the isomorphism-keyed cache.
//!
//! A [`GraphKey`] is a byte image that is identical for isomorphic
//! multigraphs and distinct otherwise. Multi-edges are first expanded
//! into a *simple* graph: an edge class of multiplicity `k` keeps one
//! direct edge and gains `k - 1` parallel two-paths through fresh
//! auxiliary vertices; a loop class sets the diagonal bit and gains
//! `k - 1` pendant auxiliary vertices. The expanded graph is then
//! canonically labelled by equitable partition refinement with
//! individualization branching, auxiliary vertices kept in their own
//! partition cell so a canonical order never interleaves them with real
//! vertices.
//!
//! Key layout: `[n_real, n_total, n_edges]` as little-endian `u32`s,
//! followed by the bit-packed adjacency matrix of the expanded graph
//! under the canonical order (byte-aligned rows). The canonical
//! permutation of the real vertices is carried on the value for the
//! engine's edge-selection order but is not part of the compared bytes.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::graph::MultiGraph;

/// Header: three u32 fields.
const HEADER_LEN: usize = 12;

/// A dense symmetric adjacency matrix over `u64` words.
#[derive(Debug, Clone)]
struct AdjMatrix {
    row_words: usize,
    words: Vec<u64>,
}

impl AdjMatrix {
    fn new(n: usize) -> Self {
        let row_words = n.div_ceil(64);
        AdjMatrix {
            row_words,
            words: vec![0; n * row_words],
        }
    }

    fn set(&mut self, i: usize, j: usize) {
        self.words[i * self.row_words + j / 64] |= 1u64 << (j % 64);
        self.words[j * self.row_words + i / 64] |= 1u64 << (i % 64);
    }

    fn get(&self, i: usize, j: usize) -> bool {
        self.words[i * self.row_words + j / 64] & (1u64 << (j % 64)) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphKey {
    bytes: Vec<u8>,
    perm: Vec<u32>,
}

impl GraphKey {
    /// Compute the canonical key of a multigraph.
    pub fn of(g: &MultiGraph) -> GraphKey {
        let verts: Vec<u32> = g.vertices().collect();
        let n_real = verts.len();
        let vtxmap: BTreeMap<u32, usize> =
            verts.iter().enumerate().map(|(i, &v)| (v, i)).collect();

        // Count auxiliary vertices up front.
        let mut n_aux = 0usize;
        for (_, _, k) in g.edges() {
            n_aux += (k as usize).saturating_sub(1);
        }
        let n_total = n_real + n_aux;

        let mut adj = AdjMatrix::new(n_total);
        let mut next_aux = n_real;
        for (u, v, k) in g.edges() {
            let ui = vtxmap[&u];
            let vi = vtxmap[&v];
            adj.set(ui, vi);
            for _ in 1..k {
                if ui == vi {
                    // Extra loop copy: pendant auxiliary vertex.
                    adj.set(ui, next_aux);
                } else {
                    // Extra parallel copy: a two-path through an
                    // auxiliary vertex.
                    adj.set(ui, next_aux);
                    adj.set(next_aux, vi);
                }
                next_aux += 1;
            }
        }
        debug_assert_eq!(next_aux, n_total);

        let mut n_edges = 0u32;
        for i in 0..n_total {
            for j in i..n_total {
                if adj.get(i, j) {
                    n_edges += 1;
                }
            }
        }

        // Initial partition: real vertices, then auxiliary vertices.
        let mut partition: Vec<Vec<usize>> = Vec::new();
        if n_real > 0 {
            partition.push((0..n_real).collect());
        }
        if n_aux > 0 {
            partition.push((n_real..n_total).collect());
        }

        let mut search = Canonizer {
            adj: &adj,
            best: None,
        };
        search.refine(&mut partition);
        search.run(partition);

        let (matrix, order) = search.best.unwrap_or_default();

        let mut bytes = Vec::with_capacity(HEADER_LEN + matrix.len());
        bytes.extend_from_slice(&(n_real as u32).to_le_bytes());
        bytes.extend_from_slice(&(n_total as u32).to_le_bytes());
        bytes.extend_from_slice(&n_edges.to_le_bytes());
        bytes.extend_from_slice(&matrix);

        // Canonical position of each real vertex, in original labels.
        let perm = order.iter().take(n_real).map(|&p| verts[p]).collect();

        GraphKey { bytes, perm }
    }

    /// The comparable, storable byte image.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Real vertices in canonical order (original labels).
    pub fn perm(&self) -> &[u32] {
        &self.perm
    }

    /// Read `n_real` out of a stored key image.
    pub fn num_real_vertices(bytes: &[u8]) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[..4]);
        u32::from_le_bytes(word)
    }

    /// Rebuild a multigraph (up to isomorphism) from a stored key image.
    /// Used by the cache statistics dump.
    pub fn reconstruct(bytes: &[u8]) -> Result<MultiGraph, Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::Internal("graph key shorter than its header"));
        }
        let field = |i: usize| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            u32::from_le_bytes(word) as usize
        };
        let n_real = field(0);
        let n_total = field(1);
        let row_bytes = n_total.div_ceil(8);
        if bytes.len() != HEADER_LEN + n_total * row_bytes {
            return Err(Error::Internal("graph key with truncated matrix"));
        }
        let bit = |i: usize, j: usize| {
            bytes[HEADER_LEN + i * row_bytes + j / 8] & (1 << (j % 8)) != 0
        };

        let mut g = MultiGraph::new(n_real as u32);
        for i in 0..n_real {
            for j in i..n_real {
                if bit(i, j) {
                    g.add_edge(i as u32, j as u32);
                }
            }
        }
        for a in n_real..n_total {
            let ends: Vec<u32> =
                (0..n_real).filter(|&j| bit(a, j)).map(|j| j as u32).collect();
            match ends.as_slice() {
                [x] => g.add_edge(*x, *x),
                [x, y] => g.add_edge(*x, *y),
                _ => return Err(Error::Internal("auxiliary vertex with bad degree in key")),
            }
        }
        Ok(g)
    }
}

/// Backtracking search for the canonical labelling: refine to an
/// equitable partition, individualize a vertex from the first smallest
/// non-singleton cell, recurse; the lexicographically smallest matrix
/// image over all discrete partitions wins.
struct Canonizer<'a> {
    adj: &'a AdjMatrix,
    best: Option<(Vec<u8>, Vec<usize>)>,
}

impl Canonizer<'_> {
    fn count_in(&self, v: usize, cell: &[usize]) -> usize {
        cell.iter().filter(|&&w| self.adj.get(v, w)).count()
    }

    /// Refine until equitable: every cell has a uniform neighbour count
    /// into every splitter cell.
    fn refine(&self, partition: &mut Vec<Vec<usize>>) {
        'restart: loop {
            for si in 0..partition.len() {
                let splitter = partition[si].clone();
                for ci in 0..partition.len() {
                    if partition[ci].len() <= 1 {
                        continue;
                    }
                    let counts: Vec<usize> = partition[ci]
                        .iter()
                        .map(|&v| self.count_in(v, &splitter))
                        .collect();
                    if counts.windows(2).all(|w| w[0] == w[1]) {
                        continue;
                    }
                    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
                    for (&v, &c) in partition[ci].iter().zip(&counts) {
                        groups.entry(c).or_default().push(v);
                    }
                    let pieces: Vec<Vec<usize>> = groups.into_values().collect();
                    partition.splice(ci..ci + 1, pieces);
                    continue 'restart;
                }
            }
            return;
        }
    }

    fn run(&mut self, partition: Vec<Vec<usize>>) {
        let target = partition
            .iter()
            .filter(|c| c.len() > 1)
            .map(|c| c.len())
            .min();

        let Some(smallest) = target else {
            // Discrete partition: a complete labelling.
            let order: Vec<usize> = partition.iter().map(|c| c[0]).collect();
            let image = self.matrix_bytes(&order);
            let better = match &self.best {
                None => true,
                Some((best, _)) => image < *best,
            };
            if better {
                self.best = Some((image, order));
            }
            return;
        };

        let ci = partition
            .iter()
            .position(|c| c.len() == smallest)
            .expect("cell of minimal size");
        for &v in &partition[ci] {
            let mut next: Vec<Vec<usize>> = Vec::with_capacity(partition.len() + 1);
            next.extend(partition[..ci].iter().cloned());
            next.push(vec![v]);
            next.push(partition[ci].iter().copied().filter(|&w| w != v).collect());
            next.extend(partition[ci + 1..].iter().cloned());
            self.refine(&mut next);
            self.run(next);
        }
    }

    /// The adjacency matrix relabelled by `order`, bit-packed with
    /// byte-aligned rows.
    fn matrix_bytes(&self, order: &[usize]) -> Vec<u8> {
        let n = order.len();
        let row_bytes = n.div_ceil(8);
        let mut out = vec![0u8; n * row_bytes];
        for i in 0..n {
            for j in 0..n {
                if self.adj.get(order[i], order[j]) {
                    out[i * row_bytes + j / 8] |= 1 << (j % 8);
                }
            }
        }
        out
    }
}
