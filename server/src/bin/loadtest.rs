//! Load test for the club relay server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect to the server and wait for the welcome snapshot
//! - Send positionUpdate messages at 20 Hz (the client-side throttle rate)
//! - Occasionally toggle a VJ control
//! - Receive and count relayed broadcasts
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N      Number of clients to spawn (default: 50)
//!   --duration S     Test duration in seconds (default: 30)
//!   --vj-rate R      VJ control toggles per second per client (default: 0.1)
//!   --url URL        Server URL (default: ws://127.0.0.1:8080/ws)

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const POSITION_RATE_HZ: f64 = 20.0;

// === Protocol types (minimal subset) ===

#[derive(Serialize)]
struct WireVec3 {
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Serialize)]
struct PositionUpdateMsg {
    #[serde(rename = "type")]
    msg_type: &'static str,
    position: WireVec3,
    rotation: WireVec3,
    #[serde(rename = "isVR")]
    is_vr: bool,
}

#[derive(Serialize)]
struct VjControlOut {
    #[serde(rename = "type")]
    msg_type: &'static str,
    control: &'static str,
    value: bool,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
#[allow(dead_code)]
enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome {
        #[serde(rename = "playerId")]
        player_id: u32,
        players: Vec<serde_json::Value>,
    },
    #[serde(rename = "playerJoined")]
    PlayerJoined { player: serde_json::Value },
    #[serde(rename = "playerLeft")]
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: u32,
    },
    #[serde(rename = "playerPosition")]
    PlayerPosition {
        #[serde(rename = "playerId")]
        player_id: u32,
    },
    #[serde(rename = "playerUpdate")]
    PlayerUpdate {
        #[serde(rename = "playerId")]
        player_id: u32,
    },
    #[serde(rename = "vjControl")]
    VjControl { control: String },
    #[serde(rename = "audioSync")]
    AudioSync {},
    #[serde(rename = "chat")]
    Chat { message: String },
}

// === Metrics ===

struct Metrics {
    connected: AtomicU64,
    messages_received: AtomicU64,
    player_positions_received: AtomicU64,
    vj_controls_received: AtomicU64,
    position_updates_sent: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            connected: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            player_positions_received: AtomicU64::new(0),
            vj_controls_received: AtomicU64::new(0),
            position_updates_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    vj_rate: f64,
    duration: Duration,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();

    let ws_result = connect_async(&url).await;
    let (mut ws, _) = match ws_result {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let connect_latency = connect_start.elapsed();
    metrics
        .latency_sum_ms
        .fetch_add(connect_latency.as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    // Wait for the welcome snapshot before doing anything else
    let got_welcome = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                    if text.contains("\"type\":\"welcome\"") {
                        return true;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return false,
                _ => {}
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    if !got_welcome {
        if client_id < 3 {
            eprintln!("Client {} failed to get welcome", client_id);
        }
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }

    let mut position_timer =
        tokio::time::interval(Duration::from_secs_f64(1.0 / POSITION_RATE_HZ));
    position_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let vj_interval = if vj_rate > 0.0 {
        Duration::from_secs_f64(1.0 / vj_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut vj_timer = tokio::time::interval(vj_interval);
    vj_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = Instant::now() + duration;
    // Each client orbits the dance floor on its own phase.
    let phase = client_id as f64 * 0.7;
    let started = Instant::now();
    let mut strobes_on = false;

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = position_timer.tick() => {
                let t = started.elapsed().as_secs_f64() * 0.5 + phase;
                let msg = PositionUpdateMsg {
                    msg_type: "positionUpdate",
                    position: WireVec3 { x: 4.0 * t.cos(), y: 0.0, z: 4.0 * t.sin() },
                    rotation: WireVec3 { x: 0.0, y: t, z: 0.0 },
                    is_vr: false,
                };
                let json = serde_json::to_string(&msg).unwrap();
                if ws.send(Message::Text(json.into())).await.is_ok() {
                    metrics.position_updates_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            _ = vj_timer.tick() => {
                strobes_on = !strobes_on;
                let msg = VjControlOut {
                    msg_type: "vjControl",
                    control: "strobesActive",
                    value: strobes_on,
                };
                let json = serde_json::to_string(&msg).unwrap();
                if ws.send(Message::Text(json.into())).await.is_err() {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        if let Ok(server_msg) = serde_json::from_str::<ServerMsg>(&text) {
                            match server_msg {
                                ServerMsg::PlayerPosition { .. } => {
                                    metrics.player_positions_received.fetch_add(1, Ordering::Relaxed);
                                }
                                ServerMsg::VjControl { .. } => {
                                    metrics.vj_controls_received.fetch_add(1, Ordering::Relaxed);
                                }
                                _ => {}
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 50;
    let mut duration_secs: u64 = 30;
    let mut vj_rate: f64 = 0.1;
    let mut url = "ws://127.0.0.1:8080/ws".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(50);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--vj-rate" => {
                i += 1;
                vj_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(0.1);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Club Server Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("VJ rate: {}/s per client", vj_rate);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::new());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);

    println!("Spawning {} clients...", num_clients);
    let spawn_start = Instant::now();

    for client_id in 0..num_clients {
        let url = url.clone();
        let metrics = Arc::clone(&metrics);

        handles.push(tokio::spawn(async move {
            run_client(client_id, url, vj_rate, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    // Print stats periodically
    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 5 {
                break;
            }

            let connected = metrics_clone.connected.load(Ordering::Relaxed);
            let msgs = metrics_clone.messages_received.load(Ordering::Relaxed);
            let positions = metrics_clone.player_positions_received.load(Ordering::Relaxed);
            let vj = metrics_clone.vj_controls_received.load(Ordering::Relaxed);
            let sent = metrics_clone.position_updates_sent.load(Ordering::Relaxed);
            let errors = metrics_clone.errors.load(Ordering::Relaxed);

            println!(
                "[{:3}s] connected={}, msgs={}, player_positions={}, vj_controls={}, updates_sent={}, errors={}",
                elapsed, connected, msgs, positions, vj, sent, errors
            );
        }
    });

    // Wait for all clients to finish
    for handle in handles {
        let _ = handle.await;
    }

    stats_handle.abort();

    // Final stats
    println!();
    println!("=== Final Results ===");
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let positions = metrics.player_positions_received.load(Ordering::Relaxed);
    let vj = metrics.vj_controls_received.load(Ordering::Relaxed);
    let sent = metrics.position_updates_sent.load(Ordering::Relaxed);
    let errors = metrics.errors.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Total messages received: {}", msgs);
    println!("Total playerPosition messages: {}", positions);
    println!("Total vjControl echoes: {}", vj);
    println!("Total positionUpdate sent: {}", sent);
    println!("Total errors: {}", errors);

    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }

    // Every positionUpdate fans out to clients-1 receivers.
    let expected_positions = sent as f64 * (num_clients.saturating_sub(1)) as f64;
    if expected_positions > 0.0 {
        println!();
        println!("Messages/sec (total): {:.0}", msgs as f64 / duration_secs as f64);
        println!(
            "Fan-out delivery rate: {:.1}%",
            positions as f64 / expected_positions * 100.0
        );
    }
}
