//! Glyph Search CLI - Run a rendering-configuration search from JSON
//! configuration.

use std::fs;
use std::path::PathBuf;

use glyph_search::{
    eval::offline::{OfflineEvaluator, OfflineRenderer},
    eval::{BenchmarkTask, Document},
    schema::SearchConfig,
    search::SearchDriver,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <search.json> [tasks.json]", args[0]);
        eprintln!();
        eprintln!("Search for a rendering configuration from a JSON search config.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  search.json  Path to search configuration file");
        eprintln!("  tasks.json   Path to a benchmark task suite (default: built-in demo suite)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });
    let config: SearchConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let tasks: Vec<BenchmarkTask> = match args.get(2) {
        Some(path) => {
            let tasks_str = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading tasks file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&tasks_str).unwrap_or_else(|e| {
                eprintln!("Error parsing tasks: {}", e);
                std::process::exit(1);
            })
        }
        None => demo_tasks(),
    };

    println!("Glyph Search");
    println!("============");
    println!("Parameters: {}", config.space.len());
    println!("Population: {}", config.population.size);
    println!(
        "Budget: {} generations / {} evaluations",
        config.budget.max_generations, config.budget.max_evaluations
    );
    println!("Tasks: {}", tasks.len());
    println!();

    let driver = SearchDriver::new(config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    // Typing "stop" on stdin cancels at the next generation boundary,
    // leaving the checkpoint intact.
    let cancel = driver.cancel_handle();
    std::thread::spawn(move || {
        let mut buf = String::new();
        while std::io::stdin().read_line(&mut buf).is_ok() {
            if buf.trim() == "stop" {
                cancel.store(true, std::sync::atomic::Ordering::Relaxed);
                return;
            }
            if buf.is_empty() {
                return;
            }
            buf.clear();
        }
    });

    println!("Running search...");
    let outcome = driver
        .run(&OfflineRenderer, &OfflineEvaluator::default(), &tasks)
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("Finished: {:?}", outcome.stop_reason);
    println!("  Generations: {}", outcome.generations);
    println!("  Evaluations: {}", outcome.total_evaluations);
    println!("  Elapsed: {:.2}s", outcome.elapsed_seconds);
    println!();
    println!("Best configuration (fitness {:?}):", outcome.best.fitness);
    for (name, value) in outcome.best.config.iter() {
        println!("  {} = {:?}", name, value);
    }
    if let Some(result) = &outcome.best.result {
        println!();
        println!(
            "  accuracy={:.4} compression={:.4} latency={:.1}ms pages={}",
            result.accuracy, result.compression_ratio, result.latency_ms, result.pages
        );
    }
}

fn demo_tasks() -> Vec<BenchmarkTask> {
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(400);
    vec![
        BenchmarkTask {
            id: "demo-0".to_string(),
            document: Document {
                id: "doc-0".to_string(),
                text: text.clone(),
            },
            question: "What jumps over the dog?".to_string(),
        },
        BenchmarkTask {
            id: "demo-1".to_string(),
            document: Document {
                id: "doc-1".to_string(),
                text,
            },
            question: "What is the dog doing?".to_string(),
        },
    ]
}

fn print_example_config() {
    let config = SearchConfig::default();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error generating example config: {}", e),
    }
}
