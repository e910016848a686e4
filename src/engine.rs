//! The delete-contract reducer.
//!
//! [`Engine`] owns everything the recursion touches: the canonical-key
//! cache, the configuration, the statistics counters, the seeded RNG,
//! the cooperative deadline and the optional computation-tree writer.
//! One engine processes a batch of graphs; per-graph state is reset by
//! [`Engine::run`].
//!
//! The recursion reduces a [`MultiGraph`] by, in order: loop removal,
//! a cache probe keyed by canonical form, the multicycle closed form,
//! biconnected decomposition (the polynomial factors over biconnected
//! components), and finally delete-contract on a heuristically selected
//! edge, with parallel classes expanded as `y^0 + ... + y^{k-1}` in one
//! step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::cache::GraphCache;
use crate::canon::GraphKey;
use crate::error::Error;
use crate::graph::MultiGraph;
use crate::poly::FactorPoly;
use crate::tree::TreeWriter;

/// Which polynomial the recursion computes.
///
/// Flow and chromatic runs produce the Tutte polynomial restricted to
/// one axis (`T(0, y)` and `T(x, 0)` respectively); the driver applies
/// the sign and substitution that turn them into the conventional flow
/// and chromatic polynomials.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PolyKind {
    #[default]
    Tutte,
    Chromatic,
    Flow,
}

/// Edge-selection policy: which edge the next delete-contract splits on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EdgeSelection {
    MaximiseDegree,
    MaximiseMdegree,
    MinimiseDegree,
    MinimiseSdegree,
    MinimiseMdegree,
    #[default]
    VertexOrder,
    Random,
}

/// Vertex relabelling applied once on ingestion. Changes the shape of
/// the search tree, never the polynomial.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum VertexOrdering {
    None,
    Random,
    MinDegree,
    MaxDegree,
    MinUnderlyingDegree,
    #[default]
    MaxUnderlyingDegree,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub kind: PolyKind,
    pub edge_selection: EdgeSelection,
    pub vertex_ordering: VertexOrdering,
    /// Graphs below this vertex count skip the cache entirely.
    pub small_graph_threshold: usize,
    pub reduce_multicycles: bool,
    pub reduce_multiedges: bool,
    pub reduce_lines: bool,
    pub timeout: Option<Duration>,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            kind: PolyKind::default(),
            edge_selection: EdgeSelection::default(),
            vertex_ordering: VertexOrdering::default(),
            small_graph_threshold: 5,
            reduce_multicycles: true,
            reduce_multiedges: true,
            reduce_lines: false,
            timeout: None,
            seed: 0,
        }
    }
}

/// Per-graph statistics, reset by [`Engine::run`].
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub num_steps: u64,
    pub num_bicomps: u64,
    pub num_disbicomps: u64,
    pub num_trees: u64,
    pub num_cycles: u64,
    /// Histogram of cache hits by graph vertex count.
    pub cache_hit_sizes: Vec<u64>,
}

pub struct Engine {
    config: EngineConfig,
    cache: GraphCache,
    counters: Counters,
    rng: ChaCha8Rng,
    deadline: Option<Instant>,
    timed_out: bool,
    tree_id: u32,
    tree: Option<TreeWriter>,
    status_flag: Option<Arc<AtomicBool>>,
    old_num_steps: u64,
    last_status: Instant,
}

impl Engine {
    pub fn new(config: EngineConfig, mut cache: GraphCache) -> Self {
        cache.set_seed(config.seed);
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Engine {
            config,
            cache,
            counters: Counters::default(),
            rng,
            deadline: None,
            timed_out: false,
            tree_id: 2,
            tree: None,
            status_flag: None,
            old_num_steps: 0,
            last_status: Instant::now(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn cache(&self) -> &GraphCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut GraphCache {
        &mut self.cache
    }

    /// True when the previous [`Engine::run`] hit the deadline; its
    /// result is then the sentinel `x(0)` chain, not a valid polynomial.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn set_tree_writer(&mut self, tree: Option<TreeWriter>) {
        self.tree = tree;
    }

    pub fn tree_writer_mut(&mut self) -> Option<&mut TreeWriter> {
        self.tree.as_mut()
    }

    /// Install the flag a driver-side ticker sets to request a progress
    /// line.
    pub fn set_status_flag(&mut self, flag: Arc<AtomicBool>) {
        self.status_flag = Some(flag);
    }

    /// Ingestion pass: compact the vertex domain, then relabel by the
    /// configured vertex-ordering heuristic.
    pub fn prepare(&mut self, graph: &MultiGraph) -> MultiGraph {
        let graph = graph.compact();
        let mut order: Vec<u32> = graph.vertices().collect();
        match self.config.vertex_ordering {
            VertexOrdering::None => return graph,
            VertexOrdering::Random => order.shuffle(&mut self.rng),
            VertexOrdering::MinDegree => order.sort_by_key(|&v| graph.num_edges_at(v)),
            VertexOrdering::MaxDegree => {
                order.sort_by_key(|&v| std::cmp::Reverse(graph.num_edges_at(v)))
            }
            VertexOrdering::MinUnderlyingDegree => {
                order.sort_by_key(|&v| graph.num_underlying_edges(v))
            }
            VertexOrdering::MaxUnderlyingDegree => {
                order.sort_by_key(|&v| std::cmp::Reverse(graph.num_underlying_edges(v)))
            }
        }
        let mut relabel = vec![0u32; order.len()];
        for (i, &v) in order.iter().enumerate() {
            relabel[v as usize] = i as u32;
        }
        let mut out = MultiGraph::new(order.len() as u32);
        for (u, v, k) in graph.edges() {
            out.add_edge_multi(relabel[u as usize], relabel[v as usize], k);
        }
        out
    }

    /// Reduce one prepared graph to its polynomial. Resets the per-graph
    /// counters and the deadline; the cache is carried over (the driver
    /// clears it between graphs unless `--no-reset` is given).
    pub fn run(&mut self, mut graph: MultiGraph) -> Result<FactorPoly, Error> {
        self.counters = Counters::default();
        self.counters.cache_hit_sizes = vec![0; graph.num_vertices() + 1];
        self.timed_out = false;
        self.deadline = self.config.timeout.map(|t| Instant::now() + t);
        self.tree_id = 2;
        self.old_num_steps = 0;
        self.last_status = Instant::now();
        self.reduce(&mut graph, 1)
    }

    fn reduce(&mut self, graph: &mut MultiGraph, mid: u32) -> Result<FactorPoly, Error> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.timed_out = true;
                return Ok(FactorPoly::x(0));
            }
        }
        if let Some(flag) = &self.status_flag {
            if flag.swap(false, Ordering::Relaxed) {
                self.print_status();
            }
        }
        self.counters.num_steps += 1;

        // 1. Local reductions: strip loops into a y^loops prefactor.
        // Chromatic mode never sees loops (simple contraction suppresses
        // them) and skips this step.
        let rf = match self.config.kind {
            PolyKind::Chromatic => FactorPoly::x(0),
            _ => FactorPoly::y(graph.reduce_loops()),
        };

        // 2. Memo probe.
        let mut key = None;
        if graph.num_vertices() >= self.config.small_graph_threshold && !graph.is_multitree() {
            let k = GraphKey::of(graph);
            if let Some((p, match_id)) = self.cache.lookup(k.bytes())? {
                debug!("cache hit for {} vertices (id {})", graph.num_vertices(), match_id);
                if let Some(tree) = &mut self.tree {
                    tree.matched(mid, match_id, graph);
                }
                let n = graph.num_vertices();
                if self.counters.cache_hit_sizes.len() <= n {
                    self.counters.cache_hit_sizes.resize(n + 1, 0);
                }
                self.counters.cache_hit_sizes[n] += 1;
                return Ok(p * rf);
            }
            key = Some(k);
        }

        let kind = self.config.kind;
        let poly;

        // 3. Structural shortcuts.
        if kind != PolyKind::Chromatic
            && self.config.reduce_multicycles
            && graph.is_multicycle()
        {
            self.counters.num_cycles += 1;
            poly = self.reduce_cycle(graph);
            if let Some(tree) = &mut self.tree {
                tree.leaf(mid, graph);
            }
        } else if !graph.is_biconnected() {
            let comps = graph.extract_biconnected_components();
            let mut tid = self.tree_id;
            self.tree_id += comps.len() as u32;
            if let Some(tree) = &mut self.tree {
                if comps.is_empty() {
                    tree.leaf(mid, graph);
                } else {
                    tree.nonleaf(mid, tid, comps.len() as u32, graph);
                }
            }

            if kind == PolyKind::Flow {
                // A single-multiplicity edge in the skeleton is a bridge,
                // and a bridge kills the whole flow polynomial.
                if graph.edges().any(|(_, _, k)| k == 1) {
                    self.counters.num_trees += 1;
                    if let Some(tree) = &mut self.tree {
                        tree.leaf(mid, graph);
                    }
                    return Ok(FactorPoly::zero());
                }
            }

            if graph.is_multitree() {
                self.counters.num_trees += 1;
            }
            if comps.len() > 1 {
                self.counters.num_disbicomps += 1;
            }

            let mut acc = match kind {
                PolyKind::Chromatic => FactorPoly::x(graph.num_edges() as u32),
                _ => self.reduce_tree(graph),
            };
            for mut comp in comps {
                self.counters.num_bicomps += 1;
                if kind != PolyKind::Chromatic && comp.is_multicycle() {
                    self.counters.num_cycles += 1;
                    acc = acc * self.reduce_cycle(&comp);
                    if let Some(tree) = &mut self.tree {
                        tree.leaf(tid, &comp);
                    }
                    tid += 1;
                } else {
                    let sub = self.reduce(&mut comp, tid)?;
                    tid += 1;
                    acc = acc * sub;
                }
            }
            poly = acc;
        } else {
            // 4. Delete-contract on a selected edge (or line).
            let lid = self.tree_id;
            let rid = self.tree_id + 1;
            self.tree_id += 2;
            if let Some(tree) = &mut self.tree {
                tree.nonleaf(mid, lid, 2, graph);
            }

            let (u, v, k) = self.select_edge(graph, key.as_ref())?;
            // Lines are traced only along unit-multiplicity edges; a
            // parallel class is never part of a series path.
            let line = if self.config.reduce_lines
                && kind != PolyKind::Chromatic
                && graph.multiplicity(u, v) == 1
            {
                trace_line(graph, u, v)
            } else {
                vec![u, v]
            };

            if line.len() > 2 {
                // A line of m unit edges in series:
                //   T(G) = T(G/L) + (x^{m-1} + ... + 1) * T(G - L)
                // In flow mode only the constant survives at x = 0.
                let m = (line.len() - 1) as u32;
                let mut g2 = graph.clone();
                for w in line.windows(2) {
                    graph.remove_edge(w[0], w[1], 1);
                }
                for &w in &line[1..] {
                    g2.contract_edge(line[0], w, 1);
                }
                let del = self.reduce(graph, lid)?;
                let con = self.reduce(&mut g2, rid)?;
                let factor = match kind {
                    PolyKind::Flow => FactorPoly::x(0),
                    _ => FactorPoly::x_range(0, m - 1),
                };
                poly = del * factor + con;
            } else {
                let mut g2 = graph.clone();
                graph.remove_edge(u, v, k);
                if kind == PolyKind::Chromatic {
                    g2.simple_contract_edge(u, v);
                } else {
                    g2.contract_edge(u, v, k);
                }
                let del = self.reduce(graph, lid)?;
                let con = self.reduce(&mut g2, rid)?;
                poly = if k > 1 && kind != PolyKind::Chromatic {
                    del + con * FactorPoly::y_range(0, k - 1)
                } else {
                    del + con
                };
            }
        }

        if let Some(key) = key {
            // The graph stored here is the one this frame finished with,
            // but the id recorded is the entry frame's: tree dumps can
            // mislabel cross-references because of this.
            self.cache.store(key.bytes(), &poly, mid)?;
        }

        Ok(poly * rf)
    }

    /// Product over the edge classes of a (multi)tree skeleton: a class
    /// of multiplicity `k` contributes `seed + y + ... + y^{k-1}`, so a
    /// unit bridge is `x` for Tutte and zero for flow.
    fn reduce_tree(&self, graph: &MultiGraph) -> FactorPoly {
        let seed = self.cycle_seed();
        let mut poly = FactorPoly::x(0);
        for (_, _, k) in graph.edges() {
            poly = poly * (seed.clone() + FactorPoly::y_range(1, k - 1));
        }
        poly
    }

    /// Closed form for a multicycle, by the recurrence
    ///
    /// ```text
    /// T(k_1..k_n) = prod_{i>=2}(seed + Y(1, k_i - 1))
    ///             + Y(0, k_1 - 1) * T(k_2..k_n)
    /// ```
    ///
    /// with base case `y^{k_n}` (the fully contracted loop class).
    fn reduce_cycle(&self, graph: &MultiGraph) -> FactorPoly {
        let seed = self.cycle_seed();
        let ks = cycle_multiplicities(graph);
        let n = ks.len();
        debug_assert!(n >= 3, "multicycle shorter than three classes");
        let mut acc = FactorPoly::y(ks[n - 1]);
        let mut suffix = FactorPoly::x(0);
        for j in (0..n - 1).rev() {
            suffix = suffix * (seed.clone() + FactorPoly::y_range(1, ks[j + 1] - 1));
            acc = suffix.clone() + FactorPoly::y_range(0, ks[j] - 1) * acc;
        }
        acc
    }

    fn cycle_seed(&self) -> FactorPoly {
        match self.config.kind {
            PolyKind::Flow => FactorPoly::zero(),
            _ => FactorPoly::x(1),
        }
    }

    /// Pick the edge for the next delete-contract. Iterates vertices in
    /// the canonical-label order when this frame computed a key (so the
    /// choice is invariant under input relabelling), else in sorted
    /// order.
    fn select_edge(
        &mut self,
        graph: &MultiGraph,
        key: Option<&GraphKey>,
    ) -> Result<(u32, u32, u32), Error> {
        let order: Vec<u32> = match key {
            Some(k) => k.perm().to_vec(),
            None => graph.vertices().collect(),
        };
        let maxv = order.iter().copied().max().unwrap_or(0) as usize;
        let mut pos = vec![0u32; maxv + 1];
        for (i, &v) in order.iter().enumerate() {
            pos[v as usize] = i as u32;
        }

        let nverts = graph.num_vertices() as u64;
        let lines = self.config.reduce_lines;
        let full_mult = self.config.reduce_multiedges;

        let mut rtarget = 0u64;
        let mut rcount = 0u64;
        if self.config.edge_selection == EdgeSelection::Random {
            rtarget = self.rng.gen_range(0..graph.num_edges() as u64);
        }

        let mut best = 0u64;
        let mut result = None;
        for &head in &order {
            let headc = graph.num_underlying_edges(head) as u64;
            if lines && headc == 2 {
                // In lines mode interior path vertices are not anchors.
                continue;
            }
            for (tail, count) in graph.neighbours(head) {
                let tailc = graph.num_underlying_edges(tail) as u64;
                if !(pos[head as usize] < pos[tail as usize] || (lines && tailc == 2)) {
                    continue;
                }
                let mult = if full_mult { count } else { 1 };
                let cost = match self.config.edge_selection {
                    EdgeSelection::MaximiseDegree => headc + tailc,
                    EdgeSelection::MaximiseMdegree => {
                        graph.num_edges_at(head) as u64 * graph.num_edges_at(tail) as u64
                    }
                    EdgeSelection::MinimiseDegree => 2 * nverts - (headc + tailc),
                    EdgeSelection::MinimiseSdegree => nverts - headc.min(tailc),
                    EdgeSelection::MinimiseMdegree => {
                        // Multiplicity-weighted degrees can exceed V, so
                        // keep the cost positive.
                        (nverts * nverts)
                            .saturating_sub(
                                graph.num_edges_at(head) as u64
                                    * graph.num_edges_at(tail) as u64,
                            )
                            .max(1)
                    }
                    EdgeSelection::VertexOrder => {
                        return Ok((head, tail, mult));
                    }
                    EdgeSelection::Random => {
                        if rcount + count as u64 > rtarget {
                            return Ok((head, tail, mult));
                        }
                        rcount += count as u64;
                        continue;
                    }
                };
                if cost > best {
                    best = cost;
                    result = Some((head, tail, mult));
                }
            }
        }

        result.ok_or(Error::Internal("select_edge found no candidate edge"))
    }

    fn print_status(&mut self) {
        let elapsed = self.last_status.elapsed().as_secs_f64().max(1e-9);
        let rate = (self.counters.num_steps - self.old_num_steps) as f64 / elapsed;
        let fill = 100.0 * self.cache.size() as f64 / self.cache.capacity().max(1) as f64;
        info!(
            "Completed {} graphs at rate of {}/s, cache is {:.2}% full.",
            self.counters.num_steps,
            rate as u64,
            fill
        );
        self.old_num_steps = self.counters.num_steps;
        self.last_status = Instant::now();
    }
}

/// Walk the cycle from its smallest vertex and record the multiplicity
/// of each class in cycle order.
fn cycle_multiplicities(graph: &MultiGraph) -> Vec<u32> {
    let start = graph.vertices().next().expect("cycle has vertices");
    let first = graph
        .neighbours(start)
        .map(|(w, _)| w)
        .next()
        .expect("cycle vertex has neighbours");
    let mut ks = vec![graph.multiplicity(start, first)];
    let mut prev = start;
    let mut cur = first;
    while cur != start {
        let next = graph
            .neighbours(cur)
            .map(|(w, _)| w)
            .find(|&w| w != prev)
            .expect("cycle vertex has two neighbours");
        ks.push(graph.multiplicity(cur, next));
        prev = cur;
        cur = next;
    }
    ks
}

/// Extend the edge `(u0, v0)` into the maximal line through
/// underlying-degree-2 vertices along unit-multiplicity edges. Returns
/// the vertex path, starting at the anchor `u0`.
fn trace_line(graph: &MultiGraph, u0: u32, v0: u32) -> Vec<u32> {
    let mut path = vec![u0, v0];
    loop {
        let last = path[path.len() - 1];
        let prev = path[path.len() - 2];
        if graph.num_underlying_edges(last) != 2 {
            break;
        }
        let Some(next) = graph
            .neighbours(last)
            .map(|(w, _)| w)
            .find(|&w| w != prev && w != last)
        else {
            break;
        };
        if graph.multiplicity(last, next) != 1 || next == u0 {
            break;
        }
        path.push(next);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(kind: PolyKind) -> Engine {
        let config = EngineConfig {
            kind,
            ..EngineConfig::default()
        };
        Engine::new(config, GraphCache::new(1 << 20, 1024))
    }

    fn reduce(desc: &str, kind: PolyKind) -> FactorPoly {
        let mut e = engine(kind);
        let g = e.prepare(&MultiGraph::parse(desc).unwrap());
        e.run(g).unwrap()
    }

    #[test]
    fn test_triangle() {
        assert_eq!(reduce("0--1,1--2,0--2", PolyKind::Tutte).to_string(), "y + x + x^2");
    }

    #[test]
    fn test_path_is_x_cubed() {
        assert_eq!(reduce("0--1,1--2,2--3", PolyKind::Tutte).to_string(), "x^3");
    }

    #[test]
    fn test_dipole() {
        // Two parallel edges: T = y + x.
        assert_eq!(reduce("0--1,0--1", PolyKind::Tutte).to_string(), "y + x");
    }

    #[test]
    fn test_loop_multiplies_by_y() {
        assert_eq!(reduce("0--1,0--0", PolyKind::Tutte).to_string(), "x*y");
    }

    #[test]
    fn test_pentagon() {
        assert_eq!(
            reduce("0--1,1--2,2--3,3--4,4--0", PolyKind::Tutte).to_string(),
            "y + x + x^2 + x^3 + x^4"
        );
    }

    #[test]
    fn test_cycle_recurrence_matches_delete_contract() {
        // With the multicycle shortcut disabled the recursion must agree
        // with the closed form.
        let desc = "0--1,0--1,1--2,2--3,2--3,3--0";
        let shortcut = reduce(desc, PolyKind::Tutte);
        let mut e = Engine::new(
            EngineConfig {
                reduce_multicycles: false,
                ..EngineConfig::default()
            },
            GraphCache::new(1 << 20, 1024),
        );
        let g = e.prepare(&MultiGraph::parse(desc).unwrap());
        let plain = e.run(g).unwrap();
        assert_eq!(shortcut.to_string(), plain.to_string());
    }

    #[test]
    fn test_multiedge_expansion_matches_plain() {
        let desc = "0--1,0--1,0--1,1--2,0--2,2--3,3--1";
        let expanded = reduce(desc, PolyKind::Tutte);
        let mut e = Engine::new(
            EngineConfig {
                reduce_multiedges: false,
                ..EngineConfig::default()
            },
            GraphCache::new(1 << 20, 1024),
        );
        let g = e.prepare(&MultiGraph::parse(desc).unwrap());
        let plain = e.run(g).unwrap();
        assert_eq!(expanded.to_string(), plain.to_string());
    }

    #[test]
    fn test_counters() {
        let mut e = engine(PolyKind::Tutte);
        let g = e.prepare(&MultiGraph::parse("0--1,1--2,0--2,2--3,3--4,4--5,3--5").unwrap());
        e.run(g).unwrap();
        assert!(e.counters().num_steps >= 1);
        assert_eq!(e.counters().num_bicomps, 2);
        assert_eq!(e.counters().num_cycles, 2);
        assert!(e.counters().num_trees >= 1);
    }

    #[test]
    fn test_timeout_returns_sentinel() {
        let mut e = Engine::new(
            EngineConfig {
                timeout: Some(Duration::from_secs(0)),
                ..EngineConfig::default()
            },
            GraphCache::new(1 << 20, 64),
        );
        let g = e.prepare(&MultiGraph::parse("0--1,1--2,0--2").unwrap());
        let p = e.run(g).unwrap();
        assert!(e.timed_out());
        assert_eq!(p.to_string(), "1");
    }

    #[test]
    fn test_edge_selection_policies_agree() {
        let desc = "0--1,0--2,0--3,1--2,1--3,2--3,3--4,4--0,4--1";
        let reference = reduce(desc, PolyKind::Tutte).to_string();
        for policy in [
            EdgeSelection::MaximiseDegree,
            EdgeSelection::MaximiseMdegree,
            EdgeSelection::MinimiseDegree,
            EdgeSelection::MinimiseSdegree,
            EdgeSelection::MinimiseMdegree,
            EdgeSelection::Random,
        ] {
            let mut e = Engine::new(
                EngineConfig {
                    edge_selection: policy,
                    seed: 3,
                    ..EngineConfig::default()
                },
                GraphCache::new(1 << 20, 1024),
            );
            let g = e.prepare(&MultiGraph::parse(desc).unwrap());
            assert_eq!(e.run(g).unwrap().to_string(), reference, "{:?}", policy);
        }
    }

    #[test]
    fn test_vertex_orderings_agree() {
        let desc = "0--1,0--2,0--3,1--2,1--3,2--3,3--4,4--0";
        let reference = reduce(desc, PolyKind::Tutte).to_string();
        for ordering in [
            VertexOrdering::None,
            VertexOrdering::Random,
            VertexOrdering::MinDegree,
            VertexOrdering::MaxDegree,
            VertexOrdering::MinUnderlyingDegree,
        ] {
            let mut e = Engine::new(
                EngineConfig {
                    vertex_ordering: ordering,
                    seed: 11,
                    ..EngineConfig::default()
                },
                GraphCache::new(1 << 20, 1024),
            );
            let g = e.prepare(&MultiGraph::parse(desc).unwrap());
            assert_eq!(e.run(g).unwrap().to_string(), reference, "{:?}", ordering);
        }
    }

    #[test]
    fn test_line_reduction_agrees() {
        // K_4 with two subdivided edges has genuine lines.
        let desc = "0--1,0--2,0--3,1--2,1--4,4--3,2--5,5--3";
        let reference = reduce(desc, PolyKind::Tutte).to_string();
        let mut e = Engine::new(
            EngineConfig {
                reduce_lines: true,
                ..EngineConfig::default()
            },
            GraphCache::new(1 << 20, 1024),
        );
        let g = e.prepare(&MultiGraph::parse(desc).unwrap());
        assert_eq!(e.run(g).unwrap().to_string(), reference);
    }

    #[test]
    fn test_trace_line() {
        // 0-4-5-1 is a line between the anchors 0 and 1.
        let g = MultiGraph::parse("0--1,0--2,0--3,1--2,1--3,2--3,0--4,4--5,5--1").unwrap();
        let path = trace_line(&g, 0, 4);
        assert_eq!(path, vec![0, 4, 5, 1]);
        // A plain edge between anchors does not extend.
        assert_eq!(trace_line(&g, 0, 1), vec![0, 1]);
    }

    #[test]
    fn test_cycle_multiplicities() {
        let g = MultiGraph::parse("0--1,0--1,1--2,2--0,2--0,2--0").unwrap();
        let ks = cycle_multiplicities(&g);
        assert_eq!(ks.len(), 3);
        let mut sorted = ks.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3]);
    }
}
