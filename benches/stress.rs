use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};
use ulid::Ulid;

const DAY: &str = "2035-06-04";

async fn connect(host: &str, port: u16, db: &str) -> Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(db)
        .user("brokerslot")
        .password("brokerslot");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

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
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

struct Office {
    db: String,
    broker: Ulid,
    property: Ulid,
    window: String,
}

/// A broker working 08:00-18:00 in 30 minute slots, assigned to one property.
async fn office(host: &str, port: u16, max_bookings: u32) -> Office {
    let db = format!("bench_{}", Ulid::new());
    let client = connect(host, port, &db).await;
    let broker = Ulid::new();
    let property = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO brokers (id, name, timezone) VALUES ('{broker}', 'Bench', 'Asia/Dubai')"
        ))
        .await
        .unwrap();
    client
        .batch_execute(&format!(
            "INSERT INTO property_brokers (property_id, broker_id, is_primary) VALUES ('{property}', '{broker}', true)"
        ))
        .await
        .unwrap();
    client
        .batch_execute(&format!(
            "INSERT INTO availability_windows VALUES ('{broker}', '{DAY}', '08:00', '18:00', 30, 0, {max_bookings})"
        ))
        .await
        .unwrap();

    let window = client
        .simple_query(&format!(
            "SELECT * FROM availability_windows WHERE broker_id = '{broker}' AND date = '{DAY}'"
        ))
        .await
        .unwrap()
        .into_iter()
        .find_map(|m| match m {
            SimpleQueryMessage::Row(r) => r.get("id").map(str::to_string),
            _ => None,
        })
        .expect("window row");

    Office { db, broker, property, window }
}

async fn phase1_sequential_blocks(host: &str, port: u16) {
    let office = office(host, port, 1).await;
    let client = connect(host, port, &office.db).await;

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    // Back-to-back hour blocks from 2036 on, adjacent so none conflict.
    for i in 0..n {
        let s = chrono::DateTime::from_timestamp(2_082_758_400 + (i as i64) * 3600, 0)
            .expect("valid timestamp")
            .to_rfc3339();
        let e = chrono::DateTime::from_timestamp(2_082_758_400 + (i as i64 + 1) * 3600, 0)
            .expect("valid timestamp")
            .to_rfc3339();
        let t = Instant::now();
        client
            .batch_execute(&format!(
                "INSERT INTO blocked_periods VALUES ('{}', '{s}', '{e}')",
                office.broker
            ))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} blocked periods in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_reservation_race(host: &str, port: u16) {
    let max_bookings = 25;
    let n_tasks = 50;
    let office = Arc::new(office(host, port, max_bookings).await);

    let reserved = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..n_tasks {
        let host = host.to_string();
        let office = office.clone();
        let reserved = reserved.clone();
        let rejected = rejected.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &office.db).await;
            let sql = format!(
                "INSERT INTO capacity_reservations (window_id) VALUES ('{}')",
                office.window
            );
            match client.simple_query(&sql).await {
                Ok(_) => reserved.fetch_add(1, Ordering::Relaxed),
                Err(_) => rejected.fetch_add(1, Ordering::Relaxed),
            };
        }));
    }

    for h in handles {
        h.await.unwrap();
    }

    let ok = reserved.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} racing reservations on capacity {max_bookings}: {ok} reserved, {} rejected in {:.2}s",
        rejected.load(Ordering::Relaxed),
        start.elapsed().as_secs_f64()
    );
    assert_eq!(ok, max_bookings as usize, "capacity must never be oversold");
}

async fn phase3_slots_under_load(host: &str, port: u16) {
    let office = Arc::new(office(host, port, 1000).await);

    // Writers reserve and release on the same window the readers query.
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let host = host.to_string();
        let office = office.clone();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &office.db).await;
            while !stop.load(Ordering::Relaxed) {
                let _ = client
                    .batch_execute(&format!(
                        "INSERT INTO capacity_reservations (window_id) VALUES ('{}')",
                        office.window
                    ))
                    .await;
                let _ = client
                    .batch_execute(&format!(
                        "DELETE FROM capacity_reservations WHERE window_id = '{}'",
                        office.window
                    ))
                    .await;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for _ in 0..n_readers {
        let host = host.to_string();
        let office = office.clone();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &office.db).await;
            let sql = format!(
                "SELECT * FROM available_slots WHERE property_id = '{}' AND date = '{DAY}'",
                office.property
            );
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                client.simple_query(&sql).await.unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("available_slots query", &mut all_latencies);
}

async fn phase4_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = Arc::new(AtomicUsize::new(0));

    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let office = office(&host, port, 10).await;
            let client = connect(&host, port, &office.db).await;
            for _ in 0..ops_per_conn {
                client
                    .batch_execute(&format!(
                        "SELECT * FROM dashboard_summary WHERE broker_id = '{}'",
                        office.broker
                    ))
                    .await
                    .unwrap();
            }
            success.fetch_add(1, Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = success.load(Ordering::Relaxed);
    println!(
        "  {n_conns} tenants, {ops_per_conn} dashboards each: {ok}/{n_conns} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("BROKERSLOT_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("BROKERSLOT_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid BROKERSLOT_PORT");

    println!("=== brokerslot stress benchmark ===");
    println!("target: {host}:{port}\n");

    // Each phase uses its own tenant (unique dbname) to avoid interference

    println!("[phase 1] sequential blocked-period writes");
    phase1_sequential_blocks(&host, port).await;

    println!("\n[phase 2] concurrent reservations on one window");
    phase2_reservation_race(&host, port).await;

    println!("\n[phase 3] slot query latency under reservation load");
    phase3_slots_under_load(&host, port).await;

    println!("\n[phase 4] connection storm");
    phase4_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
