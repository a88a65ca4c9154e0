use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio_postgres::error::SqlState;
use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

const HOUR: i64 = 3_600_000;
const DAY: i64 = 24 * HOUR;

async fn connect(host: &str, port: u16, dbname: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(dbname)
        .user("innkeep")
        .password("innkeep");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn fresh_tenant() -> String {
    format!("bench_{}", Ulid::new())
}

/// First whole day at least a day from now.
fn base_day() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;
    (now / DAY + 2) * DAY
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
    let ms = |d: Duration| d.as_secs_f64() * 1000.0;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        ms(avg),
        ms(percentile(latencies, 50.0)),
        ms(percentile(latencies, 95.0)),
        ms(percentile(latencies, 99.0)),
        ms(latencies[latencies.len() - 1]),
    );
}

/// Register one hotel with `n_rooms` rooms; returns the room ids.
async fn seed(client: &tokio_postgres::Client, n_rooms: usize) -> Vec<Ulid> {
    let hotel = Ulid::new();
    client
        .batch_execute(&format!(
            "INSERT INTO hotels (id, name) VALUES ('{hotel}', 'Bench Hotel')"
        ))
        .await
        .unwrap();
    let categories = ["Standard", "Deluxe", "Suite"];
    let mut rooms = Vec::with_capacity(n_rooms);
    for i in 0..n_rooms {
        let room = Ulid::new();
        let category = categories[i % categories.len()];
        client
            .batch_execute(&format!(
                "INSERT INTO rooms (id, hotel_id, name, floor, category, rate) VALUES ('{room}', '{hotel}', '{i}', {}, '{category}', {})",
                i / 10,
                80 + (i % 5) * 20
            ))
            .await
            .unwrap();
        rooms.push(room);
    }
    rooms
}

fn booking_sql(guest: &str, room: Ulid, from: i64, to: i64) -> String {
    format!(
        r#"INSERT INTO reservations (guest_name, room_id, "from", "to") VALUES ('{guest}', '{room}', {from}, {to})"#
    )
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port, &fresh_tenant()).await;
    let room = seed(&client, 1).await[0];
    let base = base_day();

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n {
        let from = base + (i as i64) * HOUR;
        let t = Instant::now();
        client
            .simple_query(&booking_sql("seq", room, from, from + HOUR))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("booking latency", &mut latencies);
}

/// Many connections fight over the same windows of one room; every window
/// must end up with exactly one reservation.
async fn phase2_contended(host: &str, port: u16) {
    let tenant = fresh_tenant();
    let setup = connect(host, port, &tenant).await;
    let room = seed(&setup, 1).await[0];
    let base = base_day();

    let n_tasks = 20;
    let n_windows = 100;
    let won = Arc::new(AtomicUsize::new(0));
    let lost = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for t in 0..n_tasks {
        let host = host.to_string();
        let tenant = tenant.clone();
        let won = won.clone();
        let lost = lost.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &tenant).await;
            for w in 0..n_windows {
                let from = base + (w as i64) * DAY;
                match client
                    .simple_query(&booking_sql(&format!("g{t}"), room, from, from + DAY))
                    .await
                {
                    Ok(_) => won.fetch_add(1, Ordering::Relaxed),
                    Err(e) => {
                        assert_eq!(e.code(), Some(&SqlState::EXCLUSION_VIOLATION), "{e}");
                        lost.fetch_add(1, Ordering::Relaxed)
                    }
                };
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let won = won.load(Ordering::Relaxed);
    let lost = lost.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} connections x {n_windows} windows in {:.2}s: {won} booked, {lost} conflicts",
        elapsed.as_secs_f64()
    );
    assert_eq!(won, n_windows, "each window must be booked exactly once");
}

async fn phase3_read_under_load(host: &str, port: u16) {
    let tenant = fresh_tenant();
    let setup = connect(host, port, &tenant).await;
    let rooms = seed(&setup, 50).await;
    let base = base_day();
    drop(setup);

    let stop = Arc::new(AtomicBool::new(false));
    let mut writers = Vec::new();
    for (w, room) in rooms.iter().copied().enumerate().take(5) {
        let host = host.to_string();
        let tenant = tenant.clone();
        let stop = stop.clone();
        writers.push(tokio::spawn(async move {
            let client = connect(&host, port, &tenant).await;
            let mut i = 0i64;
            while !stop.load(Ordering::Relaxed) {
                let from = base + i * HOUR;
                let _ = client
                    .simple_query(&booking_sql(&format!("w{w}"), room, from, from + HOUR))
                    .await;
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let mut readers = Vec::new();
    for _ in 0..n_readers {
        let host = host.to_string();
        let tenant = tenant.clone();
        readers.push(tokio::spawn(async move {
            let client = connect(&host, port, &tenant).await;
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for _ in 0..reads_per_reader {
                let t = Instant::now();
                client
                    .simple_query(&format!(
                        r#"SELECT * FROM availability WHERE "from" >= {base} AND "to" <= {}"#,
                        base + 7 * DAY
                    ))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in readers {
        all.extend(h.await.unwrap());
    }
    stop.store(true, Ordering::Relaxed);
    for h in writers {
        let _ = h.await;
    }
    print_latency("availability query", &mut all);
}

#[tokio::main]
async fn main() {
    let host = std::env::var("INNKEEP_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("INNKEEP_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid INNKEEP_PORT");

    println!("=== innkeep stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[phase 1] sequential booking throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] contended bookings on one room");
    phase2_contended(&host, port).await;

    println!("\n[phase 3] availability latency under write load");
    phase3_read_under_load(&host, port).await;

    println!("\n=== benchmark complete ===");
}
