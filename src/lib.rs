//! # tutte-rs: Tutte polynomials by delete-contract reduction
//!
//! **`tutte-rs`** computes the **Tutte polynomial** (and its chromatic
//! and flow specialisations) of an undirected multigraph. The recursion
//! is the classic deletion-contraction
//!
//! ```text
//! T(G) = T(G - e) + T(G / e)
//! ```
//!
//! with closed forms for loops, bridges, multi-edge classes, trees and
//! cycles, and factorisation over biconnected components. What makes
//! non-trivial graphs feasible is a **memoization cache keyed by graph
//! isomorphism**: every sufficiently large subgraph is canonically
//! labelled and probed against previously solved subproblems, so
//! structurally identical branches of the search tree are solved once.
//!
//! ## Core components
//!
//! - **[`graph`]**: the mutable [`MultiGraph`][crate::graph::MultiGraph]
//!   the recursion destructs, with connectivity and biconnectivity
//!   queries.
//! - **[`poly`]**: [`FactorPoly`][crate::poly::FactorPoly], a bivariate
//!   polynomial kept as a lazy product of sums so that cache entries
//!   stay small.
//! - **[`canon`]**: canonical labelling of multigraphs into the byte
//!   keys the cache compares.
//! - **[`cache`]**: the arena-backed
//!   [`GraphCache`][crate::cache::GraphCache] with usage-aware eviction
//!   and compaction.
//! - **[`engine`]**: the [`Engine`][crate::engine::Engine] driving the
//!   reduction, plus its edge-selection and vertex-ordering heuristics.
//!
//! ## Example
//!
//! ```rust
//! use tutte_rs::cache::GraphCache;
//! use tutte_rs::engine::{Engine, EngineConfig};
//! use tutte_rs::graph::MultiGraph;
//!
//! let mut engine = Engine::new(EngineConfig::default(), GraphCache::new(1 << 20, 1024));
//! let graph = MultiGraph::parse("0--1,1--2,0--2").unwrap();
//! let graph = engine.prepare(&graph);
//! let poly = engine.run(graph).unwrap();
//! assert_eq!(poly.to_string(), "y + x + x^2");
//! assert_eq!(poly.substitute(1, 1), 3.into()); // spanning trees of K_3
//! ```

pub mod bignum;
pub mod cache;
pub mod canon;
pub mod engine;
pub mod error;
pub mod graph;
pub mod poly;
pub mod tree;
