//! Benchmarks for budget allocation and batch evaluation.
//! Run with: cargo bench -p adpilot-engine

use adpilot_core::types::{EntityInput, EntityRef, EntityType, PerformanceMetrics, SiblingInput};
use adpilot_core::EngineConfig;
use adpilot_engine::{AllocationStrategy, DecisionEngine};
use chrono::{Duration, Utc};

fn metrics(i: usize) -> PerformanceMetrics {
    let impressions = 5_000 + (i as u64 * 137) % 40_000;
    let clicks = impressions / (40 + (i as u64 % 60));
    let spend = 20.0 + (i % 90) as f64 * 3.5;
    let conversions = (i as u64 * 7) % 25;
    PerformanceMetrics {
        impressions,
        clicks,
        spend,
        ctr: clicks as f64 / impressions as f64 * 100.0,
        cpc: if clicks > 0 { spend / clicks as f64 } else { 0.0 },
        frequency: 1.0 + (i % 40) as f64 * 0.1,
        conversions,
        cost_per_conversion: if conversions > 0 {
            spend / conversions as f64
        } else {
            0.0
        },
        roas: (i % 50) as f64 * 0.1,
        ..Default::default()
    }
}

fn main() {
    let engine = DecisionEngine::new(EngineConfig {
        min_allocation_pct: 0.01,
        ..Default::default()
    })
    .expect("Failed to create engine");

    let siblings: Vec<SiblingInput> = (0..100)
        .map(|i| SiblingInput {
            entity: EntityRef::new(EntityType::AdGroup, format!("ag-{:04}", i), "bench"),
            metrics: metrics(i),
            current_budget: 50.0,
        })
        .collect();

    // Warmup
    for _ in 0..10 {
        engine
            .allocate(&siblings, 5_000.0, AllocationStrategy::Performance)
            .unwrap();
    }

    let iterations: u32 = 10_000;
    let start = std::time::Instant::now();
    for _ in 0..iterations {
        let _ = engine
            .allocate(&siblings, 5_000.0, AllocationStrategy::Performance)
            .unwrap();
    }
    let elapsed = start.elapsed();

    println!("=== Allocation Benchmark ===");
    println!("Iterations:  {}", iterations);
    println!("Siblings:    {}", siblings.len());
    println!("Total time:  {:?}", elapsed);
    println!("Per call:    {:?}", elapsed / iterations);

    let now = Utc::now();
    let entities: Vec<EntityInput> = (0..1_000)
        .map(|i| EntityInput {
            entity: EntityRef::new(EntityType::Ad, format!("ad-{:05}", i), "bench"),
            metrics: metrics(i),
            created_at: Some(now - Duration::hours((i % 300) as i64)),
            current_budget: Some(25.0),
        })
        .collect();

    let start = std::time::Instant::now();
    let batch = engine.evaluate(&entities, now);
    let elapsed = start.elapsed();

    println!("=== Evaluation Benchmark ===");
    println!("Entities:    {}", entities.len());
    println!("Decisions:   {}", batch.decisions.len());
    println!("Alerts:      {}", batch.alerts.len());
    println!("Total time:  {:?}", elapsed);
    println!(
        "Throughput:  {:.0} entities/sec",
        entities.len() as f64 / elapsed.as_secs_f64()
    );
}
