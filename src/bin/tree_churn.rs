//! Tree Churn Simulator
//!
//! Grows a tree to a target size, then applies seeded random inserts and
//! deletes at arbitrary positions, verifying every structural invariant after
//! each step. Seeds run in parallel; results are written as a JSON report.

use fanout_tree::audit::init_console_logging;
use fanout_tree::{IdAssignment, Peer, PeerHandle, StatsSnapshot, Tree, TreeConfig, TreeError};
use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChurnRun {
    seed: u64,
    inserts: usize,
    deletes: usize,
    rejected_inserts: usize,
    final_len: usize,
    final_height: i32,
    max_height_seen: i32,
    /// Smallest AVL bound observed: 1.44 * log2(len + 2) - 1 minus actual height
    min_height_slack: f64,
    violations: Vec<String>,
    stats: StatsSnapshot,
    elapsed_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChurnReport {
    peers: usize,
    ops: usize,
    insert_ratio: f64,
    config: TreeConfig,
    seeds: Vec<u64>,
    runs: Vec<ChurnRun>,
    total_violations: usize,
    stats: StatsSnapshot,
}

fn parse_seed_list(input: &str) -> Vec<u64> {
    input
        .split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect()
}

fn ensure_output_dir(path: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn avl_height_bound(len: usize) -> f64 {
    1.44 * ((len + 2) as f64).log2() - 1.0
}

fn run_seed(seed: u64, peers: usize, ops: usize, insert_ratio: f64, config: &TreeConfig) -> ChurnRun {
    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut violations = Vec::new();

    let tree = match Tree::with_config(format!("churn-{}", seed), config.clone()) {
        Ok(tree) => tree,
        Err(err) => {
            violations.push(format!("config rejected: {}", err));
            return ChurnRun {
                seed,
                inserts: 0,
                deletes: 0,
                rejected_inserts: 0,
                final_len: 0,
                final_height: -1,
                max_height_seen: -1,
                min_height_slack: 0.0,
                violations,
                stats: StatsSnapshot::default(),
                elapsed_ms: 0.0,
            };
        }
    };

    let mut handles: Vec<PeerHandle> = Vec::with_capacity(peers);
    let mut inserts = 0;
    let mut deletes = 0;
    let mut rejected_inserts = 0;
    let mut max_height_seen = -1;
    let mut min_height_slack = f64::INFINITY;

    let total_steps = peers + ops;
    for step in 0..total_steps {
        let grow = step < peers || handles.is_empty() || rng.gen::<f64>() < insert_ratio;

        if grow {
            let port = rng.gen_range(1024..u16::MAX);
            let peer = Peer::with_endpoint(format!("10.0.{}.{}", step / 256 % 256, step % 256), port);
            match tree.insert(peer) {
                Ok(handle) => {
                    handles.push(handle);
                    inserts += 1;
                }
                Err(TreeError::CapacityExceeded { .. }) => rejected_inserts += 1,
                Err(err) => violations.push(format!("step {}: insert failed: {}", step, err)),
            }
        } else {
            let victim = handles.swap_remove(rng.gen_range(0..handles.len()));
            match tree.delete(victim) {
                Ok(_) => deletes += 1,
                Err(err) => violations.push(format!("step {}: delete failed: {}", step, err)),
            }
        }

        if let Err(violation) = tree.check_invariants() {
            violations.push(format!("step {}: {}", step, violation));
        }

        let height = tree.height();
        max_height_seen = max_height_seen.max(height);
        if !tree.is_empty() {
            min_height_slack = min_height_slack.min(avl_height_bound(tree.len()) - height as f64);
        }
    }

    if tree.len() != handles.len() {
        violations.push(format!(
            "tree reports {} peers, {} handles still live",
            tree.len(),
            handles.len()
        ));
    }

    ChurnRun {
        seed,
        inserts,
        deletes,
        rejected_inserts,
        final_len: tree.len(),
        final_height: tree.height(),
        max_height_seen,
        min_height_slack: if min_height_slack.is_finite() { min_height_slack } else { 0.0 },
        violations,
        stats: tree.stats(),
        elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_console_logging(false);

    println!("Fan-out Tree Churn Simulator");
    println!("============================\n");

    let args: Vec<String> = std::env::args().collect();

    let mut peers = 1000usize;
    let mut ops = 10_000usize;
    let mut insert_ratio = 0.5f64;
    let mut seeds = vec![42u64];
    let mut config = TreeConfig::default();
    let mut max_height_override: Option<usize> = None;
    let mut monotonic = false;
    let mut rebalance_on_insert = false;
    let mut output_file = "churn_results/tree_churn.json".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--peers" | "-n" => {
                if i + 1 < args.len() {
                    peers = args[i + 1].parse().unwrap_or(peers);
                    i += 1;
                }
            }
            "--ops" | "-t" => {
                if i + 1 < args.len() {
                    ops = args[i + 1].parse().unwrap_or(ops);
                    i += 1;
                }
            }
            "--insert-ratio" => {
                if i + 1 < args.len() {
                    insert_ratio = args[i + 1].parse().unwrap_or(insert_ratio);
                    i += 1;
                }
            }
            "--seeds" => {
                if i + 1 < args.len() {
                    let parsed = parse_seed_list(&args[i + 1]);
                    if !parsed.is_empty() {
                        seeds = parsed;
                    }
                    i += 1;
                }
            }
            "--max-height" => {
                if i + 1 < args.len() {
                    max_height_override = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--monotonic" => monotonic = true,
            "--rebalance-on-insert" => rebalance_on_insert = true,
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config = TreeConfig::from_file(&args[i + 1])?;
                    i += 1;
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    output_file = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: tree_churn [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --peers NUM         Peers inserted before churn (default: 1000)");
                println!("  -t, --ops NUM           Random operations after growth (default: 10000)");
                println!("  --insert-ratio P        Probability an op is an insert (default: 0.5)");
                println!("  --seeds LIST            Comma-separated seeds (default: 42)");
                println!("  --max-height NUM        Override the configured max height");
                println!("  --monotonic             Use monotonic peer ids");
                println!("  --rebalance-on-insert   Run the fix-up pass after inserts too");
                println!("  -c, --config FILE       JSON tree configuration");
                println!("  -o, --output FILE       Output JSON file");
                println!("  -h, --help              Show this help");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    if let Some(max_height) = max_height_override {
        config = config.with_max_height(max_height);
    }
    if monotonic {
        config = config.with_id_assignment(IdAssignment::Monotonic);
    }
    if rebalance_on_insert {
        config = config.with_rebalance_on_insert(true);
    }
    config.validate()?;
    let insert_ratio = insert_ratio.clamp(0.0, 1.0);

    println!("Configuration:");
    println!("  Peers:        {}", peers);
    println!("  Ops:          {}", ops);
    println!("  Insert ratio: {:.2}", insert_ratio);
    println!("  Max height:   {} (capacity {})", config.max_height, config.capacity());
    println!("  Ids:          {:?}", config.id_assignment);
    println!("  Insert fixup: {}", config.rebalance_on_insert);
    println!("  Seeds:        {:?}", seeds);
    println!("  Output file:  {}", output_file);
    println!();

    let runs: Vec<ChurnRun> = seeds
        .par_iter()
        .map(|&seed| run_seed(seed, peers, ops, insert_ratio, &config))
        .collect();

    println!(
        "{:>8} {:>8} {:>8} {:>9} {:>7} {:>7} {:>10} {:>10}",
        "seed", "inserts", "deletes", "rejected", "len", "height", "rotations", "violations"
    );
    for run in &runs {
        println!(
            "{:>8} {:>8} {:>8} {:>9} {:>7} {:>7} {:>10} {:>10}",
            run.seed,
            run.inserts,
            run.deletes,
            run.rejected_inserts,
            run.final_len,
            run.final_height,
            run.stats.rotations,
            run.violations.len()
        );
        for violation in run.violations.iter().take(5) {
            println!("    ! {}", violation);
        }
    }

    let total_violations = runs.iter().map(|run| run.violations.len()).sum();
    let stats = runs
        .iter()
        .fold(StatsSnapshot::default(), |acc, run| acc.merge(run.stats));

    println!();
    println!(
        "Total: {} inserts, {} deletes, {} rotations ({:.3} per delete), {} violations",
        stats.inserts,
        stats.deletes,
        stats.rotations,
        stats.rotations_per_delete(),
        total_violations
    );

    let report = ChurnReport {
        peers,
        ops,
        insert_ratio,
        config,
        seeds,
        runs,
        total_violations,
        stats,
    };

    ensure_output_dir(&output_file)?;
    let json = serde_json::to_string_pretty(&report)?;
    let mut file = File::create(&output_file)?;
    file.write_all(json.as_bytes())?;
    println!("Results written to {}", output_file);

    if total_violations > 0 {
        return Err(format!("{} invariant violations", total_violations).into());
    }
    Ok(())
}
