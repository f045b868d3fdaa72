use h2h_td::logger::{build_logger, build_logger_for_level};
use h2h_td::{EliminationConfig, MtxOptions, MtxReader, QueueStrategy, WeightedGraph};
use log::{info, LevelFilter};
use std::convert::TryFrom;
use std::io::stdin;
use std::path::PathBuf;
use std::time::Instant;
use structopt::StructOpt;

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "h2h-td-cli",
    about = "Computes a minimum-degree tree decomposition and its weight labels."
)]
struct Opt {
    /// Input file, a matrix-market style edge list.
    /// `stdin` if not specified.
    #[structopt(parse(from_os_str))]
    input: Option<PathBuf>,

    /// Read the third column of every edge line as its weight.
    #[structopt(short, long)]
    weighted: bool,

    /// Do not add reverse edges while loading.
    #[structopt(short, long)]
    directed: bool,

    /// Use the binary heap instead of degree buckets.
    #[structopt(long)]
    heap: bool,

    /// Report a breadth-first traversal from this 0-based vertex.
    #[structopt(long)]
    bfs_start: Option<usize>,

    /// Print the weight labels of the first `k` eliminated vertices.
    #[structopt(long)]
    labels: Option<usize>,

    /// Log level, repeat for more output.
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,
}

fn main() -> h2h_td::Result<()> {
    let opt = Opt::from_args();
    match opt.verbose {
        0 => build_logger(),
        1 => build_logger_for_level(LevelFilter::Info),
        2 => build_logger_for_level(LevelFilter::Debug),
        _ => build_logger_for_level(LevelFilter::Trace),
    }

    let options = MtxOptions::default()
        .weighted(opt.weighted)
        .directed(opt.directed);

    let start = Instant::now();
    let graph = match opt.input {
        Some(path) => WeightedGraph::from_mtx(path, options)?,
        None => {
            let stdin = stdin();
            WeightedGraph::try_from(MtxReader::new(stdin.lock(), "stdin", options))?
        }
    };
    info!(
        "loaded {} vertices and {} adjacency entries in {:?}",
        graph.order(),
        graph.edge_count(),
        start.elapsed()
    );

    if let Some(v) = opt.bfs_start {
        let start = Instant::now();
        let visited = graph.bfs_traversal(v)?;
        info!("bfs from {} took {:?}", v, start.elapsed());
        println!("bfs {} {}", v, visited.len());
    }

    let strategy = if opt.heap {
        QueueStrategy::BinaryHeap
    } else {
        QueueStrategy::Buckets
    };
    let config = EliminationConfig::default().strategy(strategy);

    let start = Instant::now();
    let td = graph.compute_tree_decomposition_with(&config, |_, _| {})?;
    info!("decomposition took {:?}", start.elapsed());

    println!("treewidth {}", td.treewidth());
    let roots: Vec<String> = td.roots().iter().map(|r| r.to_string()).collect();
    println!("roots {}", roots.join(" "));

    if let Some(k) = opt.labels {
        for label in td.labels().iter().take(k) {
            let entries: Vec<String> = label.iter().map(|(v, w)| format!("{}:{}", v, w)).collect();
            println!("label {} {}", label.vertex, entries.join(" "));
        }
    }
    Ok(())
}
