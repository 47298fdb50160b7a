use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tandem::pool::units::{CountingUnit, FailingUnit, FibonacciUnit, SleepUnit};
use tandem::{
    channel, counter, pool, resource, CounterRunConfig, Pacing, ProducerConsumerConfig, RingConfig,
    WorkUnit,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set default tracing subscriber");

    counter_demo().await?;
    channel_demo().await?;
    resource_demo().await?;
    pool_demo().await?;

    println!("\nAll phases complete.");
    Ok(())
}

async fn counter_demo() -> Result<()> {
    println!("=== Phase 1: shared counter, with and without a lock ===");

    let base = CounterRunConfig {
        guarded: false,
        contexts: 3,
        increments_per_context: 1000,
        pacing: Pacing::Fixed(Duration::from_micros(100)),
    };

    let unguarded = counter::run_increments(&base).await?;
    println!(
        "unguarded: expected {}, observed {} ({} lost updates)",
        unguarded.expected, unguarded.observed, unguarded.lost_updates
    );

    let guarded = counter::run_increments(&CounterRunConfig {
        guarded: true,
        ..base
    })
    .await?;
    println!(
        "guarded:   expected {}, observed {} ({} lost updates)",
        guarded.expected, guarded.observed, guarded.lost_updates
    );
    Ok(())
}

async fn channel_demo() -> Result<()> {
    println!("\n=== Phase 2: bounded channel, producers and consumers ===");

    let config = ProducerConsumerConfig {
        capacity: 5,
        total_items: 12,
        producers: 2,
        consumers: 2,
        op_timeout: Duration::from_secs(2),
        produce_pacing: Pacing::jittered_ms(30, 80),
        consume_pacing: Pacing::jittered_ms(50, 150),
    };
    let report = channel::run_producer_consumer(&config).await?;
    println!(
        "produced {}, consumed {}, remaining {} (capacity {}, {}ms)",
        report.produced, report.consumed, report.remaining, config.capacity, report.elapsed_ms
    );
    Ok(())
}

async fn resource_demo() -> Result<()> {
    println!("\n=== Phase 3: ordered acquisition over a resource ring ===");

    let config = RingConfig {
        actors: 3,
        cycles_per_actor: 3,
        think_pacing: Pacing::jittered_ms(100, 250),
        hold_pacing: Pacing::jittered_ms(100, 200),
    };
    let reports = resource::run_ring_actors(&config).await?;
    for report in &reports {
        println!(
            "actor {} completed {} cycles ({:?})",
            report.actor, report.cycles_completed, report.phase
        );
    }
    let total: u32 = reports.iter().map(|report| report.cycles_completed).sum();
    println!("total cycles across the ring: {total}");
    Ok(())
}

async fn pool_demo() -> Result<()> {
    println!("\n=== Phase 4: task pool, sequential vs. parallel ===");

    let pacing = Pacing::jittered_ms(30, 70);
    let units: Vec<Arc<dyn WorkUnit>> = vec![
        Arc::new(FibonacciUnit::new(20, pacing.clone())),
        Arc::new(SleepUnit::new("io-1", Duration::from_millis(80))),
        Arc::new(CountingUnit::new("count-1", 1000, pacing.clone())),
        Arc::new(FibonacciUnit::new(15, pacing.clone())),
        Arc::new(SleepUnit::new("io-2", Duration::from_millis(120))),
        Arc::new(CountingUnit::new("count-2", 800, pacing.clone())),
        Arc::new(SleepUnit::new("io-3", Duration::from_millis(60))),
        Arc::new(FibonacciUnit::new(25, pacing.clone())),
        Arc::new(CountingUnit::new("count-3", 1200, pacing)),
        Arc::new(SleepUnit::new("io-4", Duration::from_millis(100))),
        Arc::new(FailingUnit::new("flaky", "simulated fault")),
    ];

    let workers = 4;
    let report = pool::compare_sequential_vs_parallel(&units, workers).await?;
    println!(
        "{} units on {} workers: sequential {}ms, parallel {}ms ({:.2}x speedup)",
        report.units, report.workers, report.sequential_ms, report.parallel_ms, report.speedup
    );

    // show per-unit outcomes from one more parallel run
    let pool = pool::TaskPool::new(workers)?;
    pool.submit(units.iter().cloned());
    let outcomes = pool.run_all().await?;
    let failed = outcomes.values().filter(|outcome| outcome.is_failed()).count();
    println!(
        "outcomes recorded: {} ({} completed, {} failed)",
        outcomes.len(),
        outcomes.len() - failed,
        failed
    );
    Ok(())
}
