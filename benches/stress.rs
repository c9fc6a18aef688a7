use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bookable::commerce::InMemoryCommerce;
use bookable::config::EngineConfig;
use bookable::model::{ProductKind, TimeRange};
use bookable::{BookingRequest, Engine};
use ulid::Ulid;

const HOUR: i64 = 3_600_000; // 1 hour in ms

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn engine() -> Arc<Engine> {
    Arc::new(Engine::new(
        EngineConfig::default(),
        Arc::new(InMemoryCommerce::new()),
    ))
}

async fn fixed_product(engine: &Engine, total_spaces: i64) -> Ulid {
    let id = Ulid::new();
    engine
        .register_product(id, None, ProductKind::FixedCapacity { total_spaces }, false)
        .await
        .expect("register product");
    id
}

async fn phase1_sequential(engine: &Engine) {
    let pid = fixed_product(engine, 10).await;
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let s = (i as i64) * HOUR;
        let t = Instant::now();
        engine
            .request_booking(BookingRequest::new(pid, TimeRange::new(s, s + HOUR), 1).confirmed())
            .await
            .expect("request booking");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("request latency", &mut latencies);
}

async fn phase2_contention(engine: Arc<Engine>) {
    // Every task fights over the same range; only `capacity` may win.
    let capacity = 50;
    let n_tasks = 20;
    let n_per_task = 100;
    let pid = fixed_product(&engine, capacity).await;
    let range = TimeRange::new(0, HOUR);

    let accepted = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_tasks {
        let engine = engine.clone();
        let accepted = accepted.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..n_per_task {
                let req = BookingRequest::new(pid, range, 1).confirmed();
                if engine.request_booking(req).await.is_ok() {
                    accepted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let won = accepted.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} tasks x {n_per_task} requests = {total} total in {:.2}s, {won} accepted (capacity {capacity})",
        elapsed.as_secs_f64()
    );
    let remaining = engine.remaining_units(pid, range).await.unwrap_or(i64::MIN);
    println!("  remaining units: {remaining}");
}

async fn phase3_read_under_load(engine: Arc<Engine>) {
    let pid = fixed_product(&engine, 10).await;
    for i in 0..500 {
        let s = (i as i64) * HOUR;
        let _ = engine
            .request_booking(BookingRequest::new(pid, TimeRange::new(s, s + HOUR), 1).confirmed())
            .await;
    }

    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for w in 0..5 {
        let engine = engine.clone();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let mut i = 0i64;
            while !stop.load(Ordering::Relaxed) {
                let s = (w as i64 * 100_000 + i) * HOUR;
                let req = BookingRequest::new(pid, TimeRange::new(s, s + HOUR), 1).confirmed();
                let _ = engine.request_booking(req).await;
                i += 1;
                tokio::task::yield_now().await;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 1000;
    let mut reader_handles = Vec::new();
    for _ in 0..n_readers {
        let engine = engine.clone();
        reader_handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                let _ = engine
                    .remaining_units(pid, TimeRange::new(0, 500 * HOUR))
                    .await;
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        if let Ok(latencies) = h.await {
            all_latencies.extend(latencies);
        }
    }

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("remaining_units query", &mut all_latencies);
}

#[tokio::main]
async fn main() {
    println!("=== bookable stress benchmark ===\n");

    println!("[phase 1] sequential request throughput");
    phase1_sequential(&engine()).await;

    println!("\n[phase 2] contended requests on one range");
    phase2_contention(engine()).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(engine()).await;

    println!("\n=== done ===");
}
