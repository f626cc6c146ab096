//! Fires many concurrent bookings at a small class and checks that the
//! server never hands out more seats than the class has.
//!
//! Usage: `contention_probe [capacity] [clients]` against a server started with
//! a bootstrap admin (`ADMIN_USERNAME` / `ADMIN_PASSWORD` are read here too).

use chrono::{Duration as ChronoDuration, Utc};
use colored::*;
use hdrhistogram::Histogram;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let mut args = std::env::args().skip(1);
    let capacity: i32 = args.next().map(|a| a.parse::<i32>()).transpose()?.unwrap_or(5);
    let clients: usize = args.next().map(|a| a.parse::<usize>()).transpose()?.unwrap_or(200);
    let base_url = std::env::var("PROBE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

    println!("{}", "Starting contention probe".bold().green());
    println!("Target URL: {}  capacity: {}  clients: {}", base_url, capacity, clients);

    let client = Client::builder()
        .pool_max_idle_per_host(1000)
        .timeout(Duration::from_secs(30))
        .build()?;

    if client.get(format!("{}/health", base_url)).send().await.is_err() {
        anyhow::bail!("Server is not reachable at {base_url}. Please start it first.");
    }

    let token = login_staff(&client, &base_url).await?;
    let class_id = create_class(&client, &base_url, &token, capacity).await?;
    println!("{} {}", "Created class".yellow(), class_id);

    let mut tasks = JoinSet::new();
    for i in 0..clients {
        let client = client.clone();
        let url = format!("{}/api/v1/bookings", base_url);
        let class_id = class_id.clone();
        tasks.spawn(async move {
            let started = Instant::now();
            let res = client.post(&url)
                .json(&json!({
                    "class_id": class_id,
                    "client_name": format!("Probe {i}"),
                    "client_email": format!("probe-{i}-{}@example.com", Uuid::new_v4()),
                }))
                .send()
                .await;
            let latency = started.elapsed();

            let outcome = match res {
                Ok(r) if r.status() == StatusCode::CREATED => "CREATED".to_string(),
                Ok(r) => r.json::<Value>().await.ok()
                    .and_then(|body| body["code"].as_str().map(str::to_string))
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
                Err(_) => "TRANSPORT_ERROR".to_string(),
            };
            (latency, outcome)
        });
    }

    let mut histogram = Histogram::<u64>::new(3)?;
    let mut outcomes: HashMap<String, usize> = HashMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (latency, outcome) = joined?;
        histogram.record(latency.as_micros() as u64)?;
        *outcomes.entry(outcome).or_default() += 1;
    }

    println!("\n{:<10} | {:<15} | {:<15} | {:<15}", "Requests", "Mean (ms)", "P50 (ms)", "P99 (ms)");
    println!("{:-<10}-+-{:-<15}-+-{:-<15}-+-{:-<15}", "", "", "", "");
    println!(
        "{:<10} | {:<15.2} | {:<15.2} | {:<15.2}",
        histogram.len(),
        histogram.mean() / 1000.0,
        histogram.value_at_quantile(0.5) as f64 / 1000.0,
        histogram.value_at_quantile(0.99) as f64 / 1000.0,
    );

    let mut codes: Vec<_> = outcomes.iter().collect();
    codes.sort();
    for (code, count) in codes {
        println!("  {:<18} {}", code, count);
    }

    let created = outcomes.get("CREATED").copied().unwrap_or(0);
    let available = fetch_available(&client, &base_url, &class_id).await?;

    let expected = (capacity as usize).min(clients);
    let expected_available = capacity - expected as i32;
    if created == expected && available == expected_available {
        println!("{}", format!("OK: {created} bookings accepted, {available} slots left").green().bold());
        Ok(())
    } else {
        anyhow::bail!("Oversold or lost seats: {created} accepted (expected {expected}), {available} available (expected {expected_available})")
    }
}

async fn login_staff(client: &Client, base_url: &str) -> anyhow::Result<String> {
    let username = std::env::var("ADMIN_USERNAME")?;
    let password = std::env::var("ADMIN_PASSWORD")?;

    let res = client.post(format!("{}/api/v1/auth/login", base_url))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;

    if !res.status().is_success() {
        anyhow::bail!("Login failed. Status: {}", res.status());
    }

    let body: Value = res.json().await?;
    body["access_token"].as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Login response carried no access_token"))
}

async fn create_class(client: &Client, base_url: &str, token: &str, capacity: i32) -> anyhow::Result<String> {
    let res = client.post(format!("{}/api/v1/classes", base_url))
        .bearer_auth(token)
        .json(&json!({
            "category": "HIIT",
            "start_time": (Utc::now() + ChronoDuration::days(1)).to_rfc3339(),
            "instructor": "Probe",
            "total_capacity": capacity,
            "location": "Load test",
        }))
        .send()
        .await?;

    if !res.status().is_success() {
        let status = res.status();
        let txt = res.text().await.unwrap_or_default();
        anyhow::bail!("Failed to create class. Status: {}. Body: {}", status, txt);
    }

    let body: Value = res.json().await?;
    body["id"].as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Class response carried no id"))
}

async fn fetch_available(client: &Client, base_url: &str, class_id: &str) -> anyhow::Result<i32> {
    let body: Value = client.get(format!("{}/api/v1/classes/{}", base_url, class_id))
        .send()
        .await?
        .json()
        .await?;
    body["available_slots"].as_i64()
        .map(|n| n as i32)
        .ok_or_else(|| anyhow::anyhow!("Class response carried no available_slots"))
}
