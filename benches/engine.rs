//! Benchmarks for the genetic search engine loop.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use glyph_search::{
    eval::offline::{OfflineEvaluator, OfflineRenderer},
    eval::{BenchmarkTask, Document},
    schema::{BudgetConfig, ConvergenceConfig, EvaluationConfig, PopulationConfig, SearchConfig},
    search::SearchDriver,
};

fn tasks(count: usize) -> Vec<BenchmarkTask> {
    let text = "lorem ipsum dolor sit amet consectetur adipiscing elit ".repeat(300);
    (0..count)
        .map(|i| BenchmarkTask {
            id: format!("task-{i}"),
            document: Document {
                id: format!("doc-{i}"),
                text: text.clone(),
            },
            question: "what follows lorem?".to_string(),
        })
        .collect()
}

fn bench_search_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_run");

    for population in [8, 16, 32] {
        let config = SearchConfig {
            population: PopulationConfig { size: population },
            budget: BudgetConfig {
                max_generations: 5,
                max_evaluations: 100_000,
            },
            convergence: ConvergenceConfig {
                epsilon: 0.0,
                window: 100,
                variance_floor: 0.0,
            },
            evaluation: EvaluationConfig {
                concurrency: 4,
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        };
        let suite = tasks(4);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("pop{population}")),
            &population,
            |b, _| {
                b.iter(|| {
                    let driver = SearchDriver::new(config.clone()).unwrap();
                    let outcome = driver
                        .run(
                            &OfflineRenderer,
                            &OfflineEvaluator::default(),
                            black_box(&suite),
                        )
                        .unwrap();
                    black_box(outcome.best.fitness)
                });
            },
        );
    }

    group.finish();
}

fn bench_evaluation_cache_effect(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_effect");

    // Tiny discrete-only space: later generations mostly re-propose
    // already-cached configurations.
    let config = SearchConfig {
        space: glyph_search::ConfigSpace::new()
            .with_param(
                "font_size",
                glyph_search::ParamSpec::Discrete { min: 8, max: 12 },
            )
            .with_param(
                "dpi",
                glyph_search::ParamSpec::Discrete { min: 100, max: 102 },
            ),
        population: PopulationConfig { size: 16 },
        budget: BudgetConfig {
            max_generations: 10,
            max_evaluations: 100_000,
        },
        convergence: ConvergenceConfig {
            epsilon: 0.0,
            window: 100,
            variance_floor: 0.0,
        },
        random_seed: Some(7),
        ..Default::default()
    };
    let suite = tasks(2);

    group.bench_function("discrete_space", |b| {
        b.iter(|| {
            let driver = SearchDriver::new(config.clone()).unwrap();
            let outcome = driver
                .run(
                    &OfflineRenderer,
                    &OfflineEvaluator::default(),
                    black_box(&suite),
                )
                .unwrap();
            black_box(outcome.total_evaluations)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_search_run, bench_evaluation_cache_effect);
criterion_main!(benches);
