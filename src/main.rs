//! Command-line driver: reads a batch of graphs, runs the engine, and
//! formats polynomials, evaluation points, and cache statistics.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use num_bigint::BigInt;
use num_traits::Zero;

use tutte_rs::bignum::BigNum;
use tutte_rs::cache::GraphCache;
use tutte_rs::canon::GraphKey;
use tutte_rs::engine::{
    Counters, EdgeSelection, Engine, EngineConfig, PolyKind, VertexOrdering,
};
use tutte_rs::graph::MultiGraph;
use tutte_rs::poly::FactorPoly;
use tutte_rs::tree::{TreeFormat, TreeWriter};

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(author, version, about = "Tutte, chromatic and flow polynomials by delete-contract")]
struct Cli {
    /// Input file: one graph per line as u--v,u--v,...
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output summary information regarding the computation.
    #[arg(short = 'i', long)]
    info: bool,

    /// Output the info summary as a single line (useful for generating data).
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Display extra progress information.
    #[arg(long)]
    verbose: bool,

    /// Timeout after the given number of seconds per graph.
    #[arg(short = 't', long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Evaluate the computed polynomial at x,y (repeatable).
    #[arg(short = 'T', long = "eval", value_name = "X,Y", value_parser = parse_evalpoint)]
    eval: Vec<(i64, i64)>,

    /// Generate the chromatic polynomial.
    #[arg(long, conflicts_with = "flow")]
    chromatic: bool,

    /// Generate the flow polynomial.
    #[arg(long)]
    flow: bool,

    /// Threshold below which graphs bypass the cache.
    #[arg(long = "small-graphs", value_name = "SIZE", default_value_t = 5)]
    small_graphs: usize,

    /// Number of graphs to process from the input file.
    #[arg(short = 'n', long, value_name = "COUNT")]
    ngraphs: Option<usize>,

    /// Cache arena size to allocate, e.g. 700M.
    #[arg(short = 'c', long = "cache-size", value_name = "AMOUNT", default_value = "256M", value_parser = parse_amount)]
    cache_size: usize,

    /// Number of buckets to use in the cache.
    #[arg(long = "cache-buckets", value_name = "COUNT", default_value_t = 1_000_000)]
    cache_buckets: usize,

    /// Ratio (between 0 and 1) of the cache to displace when full.
    #[arg(long = "cache-replacement", value_name = "RATIO")]
    cache_replacement: Option<f64>,

    /// Use the random replacement policy.
    #[arg(long = "cache-random")]
    cache_random: bool,

    /// Print a cache stats summary, or write detailed stats to a file.
    #[arg(long = "cache-stats", value_name = "FILE", num_args = 0..=1, require_equals = true, default_missing_value = "")]
    cache_stats: Option<String>,

    /// Disable caching.
    #[arg(long = "no-caching")]
    no_caching: bool,

    /// Keep the cache across graphs in a batch.
    #[arg(long = "no-reset")]
    no_reset: bool,

    /// Minimise endpoint (underlying) degree sum.
    #[arg(long = "minimise-degree")]
    minimise_degree: bool,

    /// Minimise single endpoint (underlying) degree.
    #[arg(long = "minimise-sdegree")]
    minimise_sdegree: bool,

    /// Minimise endpoint degree product.
    #[arg(long = "minimise-mdegree")]
    minimise_mdegree: bool,

    /// Maximise endpoint (underlying) degree sum.
    #[arg(long = "maximise-degree")]
    maximise_degree: bool,

    /// Maximise endpoint degree product.
    #[arg(long = "maximise-mdegree")]
    maximise_mdegree: bool,

    /// Select the first available non-tree edge in canonical order.
    #[arg(long = "vertex-order")]
    vertex_order: bool,

    /// Random edge selection.
    #[arg(long = "random")]
    random: bool,

    /// Use a random ordering of vertices.
    #[arg(long = "random-ordering")]
    random_ordering: bool,

    /// Sort vertices by degree, smallest first.
    #[arg(long = "mindeg-ordering")]
    mindeg_ordering: bool,

    /// Sort vertices by degree, largest first.
    #[arg(long = "maxdeg-ordering")]
    maxdeg_ordering: bool,

    /// Sort vertices by underlying degree, smallest first.
    #[arg(long = "minudeg-ordering")]
    minudeg_ordering: bool,

    /// Sort vertices by underlying degree, largest first.
    #[arg(long = "maxudeg-ordering")]
    maxudeg_ordering: bool,

    /// Output the computation tree.
    #[arg(long)]
    tree: bool,

    /// Output the full computation tree.
    #[arg(long = "full-tree")]
    full_tree: bool,

    /// Output the computation tree as XML.
    #[arg(long = "xml-tree")]
    xml_tree: bool,

    /// Delete-contract on lines, not just edges.
    #[arg(long = "with-lines")]
    with_lines: bool,

    /// Disable the multicycle shortcut.
    #[arg(long = "no-multicycles")]
    no_multicycles: bool,

    /// Disable one-step multi-edge expansion.
    #[arg(long = "no-multiedges")]
    no_multiedges: bool,

    /// Seed for the random heuristics and random eviction.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn parse_evalpoint(s: &str) -> Result<(i64, i64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected 'x,y', got '{}'", s))?;
    let x = x.trim().parse().map_err(|_| format!("bad coordinate '{}'", x))?;
    let y = y.trim().parse().map_err(|_| format!("bad coordinate '{}'", y))?;
    Ok((x, y))
}

/// Byte amounts with optional K/M/G suffix, e.g. `700M`.
fn parse_amount(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (digits, scale) = match s.as_bytes().last() {
        Some(b'K') => (&s[..s.len() - 1], 1024),
        Some(b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    let n: usize = digits
        .parse()
        .map_err(|_| format!("bad amount '{}'", s))?;
    Ok(n * scale)
}

impl Cli {
    fn kind(&self) -> PolyKind {
        if self.chromatic {
            PolyKind::Chromatic
        } else if self.flow {
            PolyKind::Flow
        } else {
            PolyKind::Tutte
        }
    }

    fn edge_selection(&self) -> EdgeSelection {
        if self.minimise_degree {
            EdgeSelection::MinimiseDegree
        } else if self.minimise_sdegree {
            EdgeSelection::MinimiseSdegree
        } else if self.minimise_mdegree {
            EdgeSelection::MinimiseMdegree
        } else if self.maximise_degree {
            EdgeSelection::MaximiseDegree
        } else if self.maximise_mdegree {
            EdgeSelection::MaximiseMdegree
        } else if self.random {
            EdgeSelection::Random
        } else {
            EdgeSelection::VertexOrder
        }
    }

    fn vertex_ordering(&self) -> VertexOrdering {
        if self.random_ordering {
            VertexOrdering::Random
        } else if self.mindeg_ordering {
            VertexOrdering::MinDegree
        } else if self.maxdeg_ordering {
            VertexOrdering::MaxDegree
        } else if self.minudeg_ordering {
            VertexOrdering::MinUnderlyingDegree
        } else {
            VertexOrdering::MaxUnderlyingDegree
        }
    }

    fn tree_format(&self) -> Option<TreeFormat> {
        if self.xml_tree {
            Some(TreeFormat::Xml)
        } else if self.full_tree {
            Some(TreeFormat::FullText)
        } else if self.tree {
            Some(TreeFormat::Text)
        } else {
            None
        }
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let level = if cli.quiet {
        simplelog::LevelFilter::Warn
    } else if cli.verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let config = EngineConfig {
        kind: cli.kind(),
        edge_selection: cli.edge_selection(),
        vertex_ordering: cli.vertex_ordering(),
        small_graph_threshold: if cli.no_caching {
            usize::MAX
        } else {
            cli.small_graphs
        },
        reduce_multicycles: !cli.no_multicycles,
        reduce_multiedges: !cli.no_multiedges,
        reduce_lines: cli.with_lines,
        timeout: cli.timeout.map(Duration::from_secs),
        seed: cli.seed,
    };

    let mut cache = GraphCache::new(cli.cache_size, cli.cache_buckets);
    if let Some(ratio) = cli.cache_replacement {
        cache.set_replacement(ratio);
    }
    if cli.cache_random {
        cache.set_random_replacement();
    }

    let mut engine = Engine::new(config, cache);
    if let Some(format) = cli.tree_format() {
        engine.set_tree_writer(Some(TreeWriter::stdout(format)));
    }

    // Ticker thread requesting a progress line every few seconds; the
    // engine polls the flag at each recursion entry.
    if !cli.quiet {
        let flag = Arc::new(AtomicBool::new(false));
        engine.set_status_flag(flag.clone());
        std::thread::spawn(move || loop {
            std::thread::sleep(STATUS_INTERVAL);
            flag.store(true, Ordering::Relaxed);
        });
    }

    let input = BufReader::new(File::open(&cli.input)?);
    let ngraphs = cli.ngraphs.unwrap_or(usize::MAX);
    let mut completed = 0usize;

    for line in input.lines() {
        if completed >= ngraphs {
            break;
        }
        let line = line?;
        let parsed = match MultiGraph::parse(&line) {
            Ok(g) => g,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };
        if parsed.num_edges() == 0 {
            // Blank tail of the input file; also permits trailing
            // comment lines after the graphs.
            break;
        }

        let graph = engine.prepare(&parsed);
        let nverts = graph.num_vertices();
        let nedges = graph.num_edges();
        let ncomps = graph.num_components();

        if !cli.no_reset {
            engine.cache_mut().clear();
        }
        engine.cache_mut().reset_stats();

        if let Some(tree) = engine.tree_writer_mut() {
            tree.start(completed as u32);
        }
        let timer = Instant::now();
        let poly = engine.run(graph)?;
        let elapsed = timer.elapsed();
        if let Some(tree) = engine.tree_writer_mut() {
            tree.end(completed as u32);
        }
        if engine.timed_out() {
            eprintln!(
                "graph {}: timeout expired, result is not a valid polynomial",
                completed + 1
            );
        }

        completed += 1;
        report(
            &cli,
            completed,
            &poly,
            nverts,
            nedges,
            ncomps,
            elapsed,
            engine.counters(),
        );
    }

    if let Some(stats) = &cli.cache_stats {
        if stats.is_empty() {
            print_cache_summary(&cli, engine.cache(), engine.counters());
        } else {
            let mut out = File::create(stats)?;
            write_bucket_lengths(&mut out, engine.cache())?;
            write_graph_sizes(&mut out, engine.cache())?;
            write_hit_counts(&mut out, engine.counters())?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn report(
    cli: &Cli,
    n: usize,
    poly: &FactorPoly,
    nverts: usize,
    nedges: usize,
    ncomps: usize,
    elapsed: Duration,
    counters: &Counters,
) {
    let kind = cli.kind();

    if cli.quiet {
        let mut fields: Vec<String> = cli
            .eval
            .iter()
            .map(|&(x, y)| poly.substitute(x, y).to_string())
            .collect();
        if cli.info {
            fields.push(nverts.to_string());
            fields.push(nedges.to_string());
            fields.push(format!("{:.3}", elapsed.as_secs_f64()));
            fields.push(counters.num_steps.to_string());
            fields.push(counters.num_bicomps.to_string());
            fields.push(counters.num_disbicomps.to_string());
            fields.push(counters.num_cycles.to_string());
            fields.push(counters.num_trees.to_string());
            if kind == PolyKind::Tutte {
                fields.push(poly.substitute(1, 1).to_string());
                fields.push(poly.substitute(2, 2).to_string());
            }
        }
        println!("{}", fields.join("\t"));
        return;
    }

    match kind {
        PolyKind::Tutte => {
            println!("TP[{}] := {} :", n, poly);
        }
        PolyKind::Flow => {
            let exp = nedges as i64 - nverts as i64 + ncomps as i64;
            let sign = if exp.rem_euclid(2) == 1 { -1 } else { 1 };
            println!(
                "FP[{}] := {} * ( {} ) :",
                n,
                sign,
                poly.to_string().replace('y', "(1-x)")
            );
        }
        PolyKind::Chromatic => {
            let sign = if (nverts - ncomps) % 2 == 1 { -1 } else { 1 };
            println!(
                "CP[{}] := {} * x * ( {} ) :",
                n,
                sign,
                poly.to_string().replace('x', "(1-x)")
            );
        }
    }

    for &(x, y) in &cli.eval {
        println!("TP[{}]({},{}) = {}", n, x, y, poly.substitute(x, y));
    }

    if cli.info {
        println!("=======");
        println!("V = {}, E = {}", nverts, nedges);
        println!("Size of Computation Tree: {} graphs.", counters.num_steps);
        println!(
            "Number of Biconnected Components Extracted: {}.",
            counters.num_bicomps
        );
        println!(
            "Number of Biconnected Components Separated: {}.",
            counters.num_disbicomps
        );
        println!("Number of Cycles Terminated: {}.", counters.num_cycles);
        println!("Number of Trees Terminated: {}.", counters.num_trees);
        println!("Time : {:.3}s", elapsed.as_secs_f64());

        if kind == PolyKind::Tutte {
            println!("T(1,1) = {}", poly.substitute(1, 1));
            println!(
                "T(2,2) = {} (should be {})",
                poly.substitute(2, 2),
                BigNum::from(2u64).pow(nedges as u32)
            );
            // T(-1,-1) is always plus or minus a power of two.
            let mut t = poly.substitute(-1, -1);
            let mut pow = 0u32;
            if !t.is_zero() {
                while (&t % BigInt::from(2)).is_zero() {
                    t = t / BigInt::from(2);
                    pow += 1;
                }
            }
            if t == BigInt::from(-1) {
                println!("T(-1,-1) = -2^{}", pow);
            } else if t == BigInt::from(1) {
                println!("T(-1,-1) = 2^{}", pow);
            } else {
                // Getting here indicates an error in the computation.
                println!("T(-1,-1) = 2^{} * {}", pow, t);
            }
        }
    }
}

fn print_cache_summary(cli: &Cli, cache: &GraphCache, counters: &Counters) {
    println!();
    println!("###############");
    println!("# CACHE STATS #");
    println!("###############");
    println!("Size: {}MB", cli.cache_size / (1024 * 1024));
    println!("Density: {:.2} graphs/MB", cache.density() * 1024.0 * 1024.0);
    println!("# Entries: {}", cache.num_entries());
    println!("# Cache Hits: {}", cache.num_hits());
    println!("# Cache Misses: {}", cache.num_misses());
    println!("# Cache Collisions: {}", cache.num_collisions());
    println!("Min Bucket Length: {}", cache.min_bucket_size());
    println!("Max Bucket Length: {}", cache.max_bucket_size());
    let mut stdout = std::io::stdout();
    let _ = write_hit_counts(&mut stdout, counters);
}

fn write_bucket_lengths(out: &mut dyn Write, cache: &GraphCache) -> std::io::Result<()> {
    writeln!(out, "############################")?;
    writeln!(out, "# CACHE BUCKET LENGTH DATA #")?;
    writeln!(out, "############################")?;
    writeln!(out, "# Length\tCount")?;
    let mut counts: Vec<usize> = Vec::new();
    for b in 0..cache.num_buckets() {
        let len = cache.bucket_length(b);
        if counts.len() < len + 1 {
            counts.resize(len + 1, 0);
        }
        counts[len] += 1;
    }
    for (len, count) in counts.iter().enumerate() {
        let percentage = (*count as f64 * 100.0) / cache.num_buckets() as f64;
        writeln!(out, "{}\t{}\t{:.2}", len, count, percentage)?;
    }
    Ok(())
}

fn write_graph_sizes(out: &mut dyn Write, cache: &GraphCache) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out)?;
    writeln!(out, "#########################")?;
    writeln!(out, "# CACHE GRAPH SIZE DATA #")?;
    writeln!(out, "#########################")?;
    writeln!(out, "# V\t#Graphs (%)\t#MultiGraphs (%)")?;
    let mut counts: Vec<usize> = Vec::new();
    let mut mcounts: Vec<usize> = Vec::new();
    let mut ngraphs = 0usize;
    let mut nmgraphs = 0usize;
    for (key, _) in cache.entries() {
        let Ok(graph) = GraphKey::reconstruct(key) else {
            continue;
        };
        let v = graph.num_vertices();
        if counts.len() < v + 1 {
            counts.resize(v + 1, 0);
        }
        ngraphs += 1;
        counts[v] += 1;
        if graph.is_multi_graph() {
            nmgraphs += 1;
            if mcounts.len() < v + 1 {
                mcounts.resize(v + 1, 0);
            }
            mcounts[v] += 1;
        }
    }
    for v in 0..counts.len() {
        let pct = (counts[v] as f64 * 100.0) / ngraphs.max(1) as f64;
        let mcount = mcounts.get(v).copied().unwrap_or(0);
        let mpct = (mcount as f64 * 100.0) / nmgraphs.max(1) as f64;
        writeln!(out, "{}\t{}\t{:.2}\t{}\t{:.2}", v, counts[v], pct, mcount, mpct)?;
    }
    Ok(())
}

fn write_hit_counts(out: &mut dyn Write, counters: &Counters) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out)?;
    writeln!(out, "##############################")?;
    writeln!(out, "# CACHE GRAPH HIT COUNT DATA #")?;
    writeln!(out, "##############################")?;
    writeln!(out, "# V\tHit Count")?;
    for (v, hits) in counters.cache_hit_sizes.iter().enumerate() {
        writeln!(out, "{}\t{}", v, hits)?;
    }
    Ok(())
}
