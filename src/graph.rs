//! Mutable undirected multigraphs with per-edge multiplicities.
//!
//! Adjacency is kept in `BTreeMap`s so every iteration order is
//! deterministic, which the engine relies on for reproducible edge
//! selection and cache behaviour. The vertex domain may be sparse: the
//! recursion hands around subgraphs that keep their original labels.
//!
//! A loop (self-edge) is stored once under its vertex. `num_edges` counts
//! multiplicities; `num_underlying_edges(v)` counts distinct neighbours.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use crate::error::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiGraph {
    adj: BTreeMap<u32, BTreeMap<u32, u32>>,
    nedges: usize,
}

impl MultiGraph {
    /// A graph with vertices `0..n` and no edges.
    pub fn new(n: u32) -> Self {
        let mut adj = BTreeMap::new();
        for v in 0..n {
            adj.insert(v, BTreeMap::new());
        }
        MultiGraph { adj, nedges: 0 }
    }

    pub fn from_edges(edges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut g = MultiGraph::default();
        for (u, v) in edges {
            g.add_edge(u, v);
        }
        g
    }

    /// Parse the driver input format: `u--v,u--v,...`.
    ///
    /// An empty (or all-whitespace) line yields the empty graph. Vertices
    /// mentioned in edges are created on demand; duplicate edges
    /// accumulate multiplicity.
    pub fn parse(line: &str) -> Result<Self, Error> {
        let line = line.trim();
        let mut g = MultiGraph::default();
        if line.is_empty() {
            return Ok(g);
        }
        for part in line.split(',') {
            let (u, v) = part
                .split_once("--")
                .ok_or_else(|| Error::BadInput(format!("expected 'u--v', got '{}'", part)))?;
            let u: u32 = u
                .trim()
                .parse()
                .map_err(|_| Error::BadInput(format!("bad vertex '{}'", u)))?;
            let v: u32 = v
                .trim()
                .parse()
                .map_err(|_| Error::BadInput(format!("bad vertex '{}'", v)))?;
            g.add_edge(u, v);
        }
        Ok(g)
    }

    pub fn num_vertices(&self) -> usize {
        self.adj.len()
    }

    /// Total edge count, multiplicities included.
    pub fn num_edges(&self) -> usize {
        self.nedges
    }

    pub fn vertices(&self) -> impl Iterator<Item = u32> + '_ {
        self.adj.keys().copied()
    }

    pub fn has_vertex(&self, v: u32) -> bool {
        self.adj.contains_key(&v)
    }

    /// Neighbours of `v` with multiplicities (a loop appears as `v`).
    pub fn neighbours(&self, v: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.adj
            .get(&v)
            .into_iter()
            .flat_map(|m| m.iter().map(|(&w, &k)| (w, k)))
    }

    /// Edge classes `(u, v, multiplicity)` with `u <= v`, ascending.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        self.adj.iter().flat_map(|(&u, m)| {
            m.iter()
                .filter(move |(&w, _)| u <= w)
                .map(move |(&w, &k)| (u, w, k))
        })
    }

    pub fn multiplicity(&self, u: u32, v: u32) -> u32 {
        self.adj.get(&u).and_then(|m| m.get(&v)).copied().unwrap_or(0)
    }

    /// Degree of `v` counting multiplicities.
    pub fn num_edges_at(&self, v: u32) -> u32 {
        self.adj.get(&v).map(|m| m.values().sum()).unwrap_or(0)
    }

    /// Degree of `v` ignoring multiplicities (distinct neighbours).
    pub fn num_underlying_edges(&self, v: u32) -> u32 {
        self.adj.get(&v).map(|m| m.len() as u32).unwrap_or(0)
    }

    /// Ensure `v` exists in the vertex domain.
    pub fn add_vertex(&mut self, v: u32) {
        self.adj.entry(v).or_default();
    }

    pub fn add_edge(&mut self, u: u32, v: u32) {
        self.add_edge_multi(u, v, 1);
    }

    pub fn add_edge_multi(&mut self, u: u32, v: u32, k: u32) {
        if k == 0 {
            return;
        }
        *self.adj.entry(u).or_default().entry(v).or_insert(0) += k;
        if u != v {
            *self.adj.entry(v).or_default().entry(u).or_insert(0) += k;
        }
        self.nedges += k as usize;
    }

    /// Remove `k` copies of the `(u, v)` class; the class disappears when
    /// its multiplicity reaches zero. Vertices are never removed here.
    pub fn remove_edge(&mut self, u: u32, v: u32, k: u32) {
        let cur = self.multiplicity(u, v);
        let k = k.min(cur);
        if k == 0 {
            return;
        }
        if cur == k {
            if let Some(m) = self.adj.get_mut(&u) {
                m.remove(&v);
            }
            if u != v {
                if let Some(m) = self.adj.get_mut(&v) {
                    m.remove(&u);
                }
            }
        } else {
            *self.adj.get_mut(&u).unwrap().get_mut(&v).unwrap() = cur - k;
            if u != v {
                *self.adj.get_mut(&v).unwrap().get_mut(&u).unwrap() = cur - k;
            }
        }
        self.nedges -= k as usize;
    }

    /// Contract `k` copies of the `(u, v)` class and merge `v` into `u`.
    ///
    /// Copies of the class beyond the `k` contracted ones become loops on
    /// `u`, as do loops already sitting on `v`; these are preserved for
    /// the loop-reduction step. Parallel edges to common neighbours sum
    /// their multiplicities.
    pub fn contract_edge(&mut self, u: u32, v: u32, k: u32) {
        assert_ne!(u, v, "cannot contract a loop");
        self.remove_edge(u, v, k);
        let vmap = self.adj.remove(&v).unwrap_or_default();
        for (w, c) in vmap {
            // Remove the back-reference before re-adding under u.
            if w != v {
                if let Some(m) = self.adj.get_mut(&w) {
                    m.remove(&v);
                }
            }
            self.nedges -= c as usize;
            if w == v || w == u {
                // Loops on v, or leftover parallels of the contracted
                // class: both become loops on u.
                self.add_edge_multi(u, u, c);
            } else {
                self.add_edge_multi(u, w, c);
            }
        }
    }

    /// Chromatic-mode contraction: merge `v` into `u`, collapsing
    /// parallel edges to a single copy and suppressing loops.
    pub fn simple_contract_edge(&mut self, u: u32, v: u32) {
        assert_ne!(u, v, "cannot contract a loop");
        let k = self.multiplicity(u, v);
        self.remove_edge(u, v, k);
        let vmap = self.adj.remove(&v).unwrap_or_default();
        for (w, c) in vmap {
            if w != v {
                if let Some(m) = self.adj.get_mut(&w) {
                    m.remove(&v);
                }
            }
            self.nedges -= c as usize;
            if w != v && w != u && self.multiplicity(u, w) == 0 {
                self.add_edge_multi(u, w, 1);
            }
        }
    }

    /// Remove every loop, returning the total multiplicity removed
    /// (which becomes the exponent on `y`).
    pub fn reduce_loops(&mut self) -> u32 {
        let mut removed = 0;
        let verts: Vec<u32> = self.vertices().collect();
        for v in verts {
            let k = self.multiplicity(v, v);
            if k > 0 {
                self.remove_edge(v, v, k);
                removed += k;
            }
        }
        removed
    }

    /// Any parallel class or loop of multiplicity above one?
    pub fn is_multi_graph(&self) -> bool {
        self.edges().any(|(_, _, k)| k > 1)
    }

    pub fn num_components(&self) -> usize {
        let mut seen: BTreeMap<u32, bool> = self.vertices().map(|v| (v, false)).collect();
        let mut count = 0;
        let verts: Vec<u32> = self.vertices().collect();
        for v in verts {
            if seen[&v] {
                continue;
            }
            count += 1;
            let mut stack = vec![v];
            seen.insert(v, true);
            while let Some(w) = stack.pop() {
                for (n, _) in self.neighbours(w) {
                    if !seen[&n] {
                        seen.insert(n, true);
                        stack.push(n);
                    }
                }
            }
        }
        count
    }

    /// A tree proper: connected, no loops, every multiplicity one, and
    /// exactly `V - 1` edges.
    pub fn is_tree(&self) -> bool {
        self.is_multitree()
            && self.num_components() <= 1
            && self.edges().all(|(u, v, k)| u != v && k == 1)
    }

    /// A forest when multiplicities are ignored (loops count as cycles).
    pub fn is_multitree(&self) -> bool {
        let mut underlying = 0usize;
        for (u, v, _) in self.edges() {
            if u == v {
                return false;
            }
            underlying += 1;
        }
        underlying + self.num_components() == self.num_vertices()
    }

    /// A single cycle when multiplicities are ignored: connected, no
    /// loops, every vertex with exactly two distinct neighbours.
    pub fn is_multicycle(&self) -> bool {
        if self.num_vertices() < 3 || self.num_components() != 1 {
            return false;
        }
        self.vertices().all(|v| {
            self.multiplicity(v, v) == 0 && self.num_underlying_edges(v) == 2
        })
    }

    /// Biconnected in the sense the reducer needs: one cyclic biconnected
    /// component covering every vertex. A lone bridge (or any forest) is
    /// not biconnected here, matching the connectivity classifier of the
    /// original delete-contract engine.
    pub fn is_biconnected(&self) -> bool {
        let comps = self.cyclic_bicomps();
        if comps.len() != 1 {
            return false;
        }
        let mut verts: Vec<u32> = Vec::new();
        for &(u, v) in &comps[0] {
            verts.push(u);
            verts.push(v);
        }
        verts.sort_unstable();
        verts.dedup();
        verts.len() == self.num_vertices()
    }

    /// Extract every cyclic biconnected component as its own subgraph
    /// (with multiplicities), removing its edges from `self`. What
    /// remains is the bridge skeleton: a multitree when the graph was
    /// connected.
    pub fn extract_biconnected_components(&mut self) -> Vec<MultiGraph> {
        let comps = self.cyclic_bicomps();
        let mut out = Vec::with_capacity(comps.len());
        for comp in comps {
            let mut sub = MultiGraph::default();
            for (u, v) in comp {
                let k = self.multiplicity(u, v);
                debug_assert!(k > 0, "component edge missing from graph");
                sub.add_edge_multi(u, v, k);
                self.remove_edge(u, v, k);
            }
            out.push(sub);
        }
        out
    }

    /// Biconnected components of the underlying simple graph (loops
    /// ignored) that contain a cycle, i.e. have more than one edge.
    /// Lowlink DFS with an edge stack.
    fn cyclic_bicomps(&self) -> Vec<Vec<(u32, u32)>> {
        let mut state = BicompState {
            graph: self,
            dfsnum: BTreeMap::new(),
            lowlink: BTreeMap::new(),
            counter: 0,
            estack: Vec::new(),
            comps: Vec::new(),
        };
        let verts: Vec<u32> = self.vertices().collect();
        for v in verts {
            if !state.dfsnum.contains_key(&v) {
                state.visit(v, None);
            }
        }
        state.comps
    }

    /// Renumber vertices contiguously from zero, dropping any vertex
    /// without an incident edge. Run once on ingestion.
    pub fn compact(&self) -> MultiGraph {
        let mut labels: BTreeMap<u32, u32> = BTreeMap::new();
        let mut counter = 0;
        for v in self.vertices() {
            if self.num_edges_at(v) > 0 {
                labels.insert(v, counter);
                counter += 1;
            }
        }
        let mut r = MultiGraph::new(counter);
        for (u, v, k) in self.edges() {
            r.add_edge_multi(labels[&u], labels[&v], k);
        }
        r
    }
}

struct BicompState<'a> {
    graph: &'a MultiGraph,
    dfsnum: BTreeMap<u32, u32>,
    lowlink: BTreeMap<u32, u32>,
    counter: u32,
    estack: Vec<(u32, u32)>,
    comps: Vec<Vec<(u32, u32)>>,
}

impl BicompState<'_> {
    fn visit(&mut self, v: u32, parent: Option<u32>) {
        self.dfsnum.insert(v, self.counter);
        self.lowlink.insert(v, self.counter);
        self.counter += 1;

        let mut skipped_parent = false;
        let nbrs: Vec<u32> = self.graph.neighbours(v).map(|(w, _)| w).collect();
        for w in nbrs {
            if w == v {
                continue;
            }
            // One parent edge is the tree edge; further parallel classes
            // do not exist in the underlying graph.
            if Some(w) == parent && !skipped_parent {
                skipped_parent = true;
                continue;
            }
            match self.dfsnum.get(&w).copied() {
                None => {
                    self.estack.push((v.min(w), v.max(w)));
                    self.visit(w, Some(v));
                    let low_w = self.lowlink[&w];
                    if low_w < self.lowlink[&v] {
                        self.lowlink.insert(v, low_w);
                    }
                    if low_w >= self.dfsnum[&v] {
                        // v separates the component above it; pop it.
                        let mut comp = Vec::new();
                        while let Some(&e) = self.estack.last() {
                            self.estack.pop();
                            comp.push(e);
                            if e == (v.min(w), v.max(w)) {
                                break;
                            }
                        }
                        if comp.len() > 1 {
                            comp.sort_unstable();
                            self.comps.push(comp);
                        }
                    }
                }
                Some(num_w) => {
                    if num_w < self.dfsnum[&v] {
                        // Back edge.
                        self.estack.push((v.min(w), v.max(w)));
                        if num_w < self.lowlink[&v] {
                            self.lowlink.insert(v, num_w);
                        }
                    }
                }
            }
        }
    }
}

impl Display for MultiGraph {
    /// The input format, with multiplicities written as repeated edges.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (u, v, k) in self.edges() {
            for _ in 0..k {
                if !first {
                    write!(f, ",")?;
                }
                first = false;
                write!(f, "{}--{}", u, v)?;
            }
        }
        Ok(())
    }
}
