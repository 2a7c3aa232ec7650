use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use rand::seq::SliceRandom;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Target URL (e.g., http://localhost:8000)
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Number of voters to simulate
    #[arg(short, long, default_value_t = 100)]
    users: usize,

    /// Number of concurrent voters
    #[arg(short, long, default_value_t = 10)]
    concurrency: usize,

    /// Admin password used to open voting
    #[arg(short, long, default_value = "password")]
    password: String,

    /// Extra ballots each voter tries to cast from a fresh session on the same device
    #[arg(short, long, default_value_t = 1)]
    duplicates: usize,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    id: i32,
}

#[derive(Deserialize, Debug)]
struct CandidateResult {
    votes: u64,
}

#[derive(Serialize, Clone)]
struct DeviceSignals {
    renderer: String,
    user_agent: String,
    screen_width: u32,
    screen_height: u32,
    timezone_offset: i32,
}

#[derive(Serialize)]
struct CastVoteRequest {
    candidate_id: i32,
}

#[derive(Serialize)]
struct VotingWindowRequest {
    open: bool,
}

#[derive(Serialize)]
struct AdminLoginRequest {
    password: String,
}

#[derive(Default)]
struct Counters {
    accepted: AtomicUsize,
    rejected: AtomicUsize,
    failed: AtomicUsize,
}

fn random_device(user_id: usize) -> DeviceSignals {
    let mut rng = rand::thread_rng();
    let screens = [(390, 844), (412, 915), (1366, 768), (1920, 1080)];
    let (screen_width, screen_height) = *screens.choose(&mut rng).unwrap_or(&(1280, 720));
    DeviceSignals {
        renderer: format!("data:image/png;base64,{:016x}", rng.gen::<u64>()),
        user_agent: format!("LoadTest/{} (device {})", env!("CARGO_PKG_VERSION"), user_id),
        screen_width,
        screen_height,
        timezone_offset: -420,
    }
}

/// Opens a session for `device` on a fresh cookie jar and casts one ballot.
async fn cast_ballot(
    base_url: &str,
    device: &DeviceSignals,
    candidate_id: i32,
) -> Result<StatusCode> {
    let client = Client::builder()
        .cookie_store(true)
        .build()
        .context("Failed to build voter client")?;

    client
        .post(format!("{}/api/session", base_url))
        .json(device)
        .send()
        .await
        .context("Failed to send session request")?
        .error_for_status()
        .context("Session creation failed")?;

    let response = client
        .post(format!("{}/api/vote", base_url))
        .json(&CastVoteRequest { candidate_id })
        .send()
        .await
        .context("Failed to send vote request")?;

    Ok(response.status())
}

async fn run_user_simulation(
    base_url: &str,
    user_id: usize,
    duplicates: usize,
    candidates: &[Candidate],
    counters: &Counters,
) {
    let device = random_device(user_id);

    for _ in 0..=duplicates {
        let candidate_id = match candidates.choose(&mut rand::thread_rng()) {
            Some(candidate) => candidate.id,
            None => return,
        };
        let counter = match cast_ballot(base_url, &device, candidate_id).await {
            Ok(StatusCode::CREATED) => &counters.accepted,
            Ok(StatusCode::CONFLICT) => &counters.rejected,
            Ok(_) | Err(_) => &counters.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    println!("🚀 Starting load test against {}", args.url);
    println!("👥 Voters: {}", args.users);
    println!("🔁 Duplicate attempts per voter: {}", args.duplicates);
    println!("⚡ Concurrency: {}", args.concurrency);

    let admin_client = Client::builder()
        .cookie_store(true)
        .build()
        .context("Failed to build admin client")?;

    admin_client
        .post(format!("{}/api/admin/login", args.url))
        .json(&AdminLoginRequest {
            password: args.password.clone(),
        })
        .send()
        .await
        .context("Failed to send login request")?
        .error_for_status()
        .context("Failed to login as admin")?;

    println!("🔑 Logged in as admin");

    admin_client
        .post(format!("{}/api/admin/status", args.url))
        .json(&VotingWindowRequest { open: true })
        .send()
        .await
        .context("Failed to open voting")?
        .error_for_status()
        .context("Failed to open voting")?;

    println!("✅ Voting opened via Admin API");

    let candidates: Vec<Candidate> = admin_client
        .get(format!("{}/api/candidates", args.url))
        .send()
        .await
        .context("Failed to fetch candidates")?
        .json()
        .await
        .context("Failed to parse candidates")?;

    if candidates.is_empty() {
        anyhow::bail!("No candidates found on the server. Cannot vote.");
    }
    println!("📋 Found {} candidates", candidates.len());

    let tally_before = total_votes(&admin_client, &args.url).await?;

    let candidates = Arc::new(candidates);
    let base_url = Arc::new(args.url.clone());
    let counters = Arc::new(Counters::default());

    let pb = ProgressBar::new(args.users as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let start_time = Instant::now();

    stream::iter(0..args.users)
        .map(|i| {
            let base_url = base_url.clone();
            let candidates = candidates.clone();
            let counters = counters.clone();
            let pb = pb.clone();
            let duplicates = args.duplicates;

            async move {
                run_user_simulation(&base_url, i, duplicates, &candidates, &counters).await;
                pb.set_message(format!(
                    "Accepted: {} Rejected: {}",
                    counters.accepted.load(Ordering::Relaxed),
                    counters.rejected.load(Ordering::Relaxed)
                ));
                pb.inc(1);
            }
        })
        .buffer_unordered(args.concurrency)
        .collect::<Vec<()>>()
        .await;

    pb.finish_with_message("Done");

    let duration = start_time.elapsed();
    let accepted = counters.accepted.load(Ordering::Relaxed);
    let rejected = counters.rejected.load(Ordering::Relaxed);
    let failed = counters.failed.load(Ordering::Relaxed);
    let attempts = args.users * (args.duplicates + 1);
    let rps = attempts as f64 / duration.as_secs_f64();

    let tally_after = total_votes(&admin_client, &args.url).await?;
    let counted = tally_after.saturating_sub(tally_before);

    println!("\n📊 Results:");
    println!("   Time taken: {:?}", duration);
    println!("   Ballots attempted: {}", attempts);
    println!("   Accepted (201): {}", accepted);
    println!("   Rejected as duplicate (409): {}", rejected);
    println!("   Other failures: {}", failed);
    println!("   Votes added to tally: {}", counted);
    println!("   Throughput: {:.2} ballots/sec", rps);

    if counted != accepted as u64 {
        anyhow::bail!(
            "Tally grew by {} but {} ballots were accepted",
            counted,
            accepted
        );
    }
    if accepted > args.users {
        anyhow::bail!("{} ballots accepted from {} devices", accepted, args.users);
    }
    println!("✅ One vote per device held");

    Ok(())
}

async fn total_votes(client: &Client, base_url: &str) -> Result<u64> {
    let results: Vec<CandidateResult> = client
        .get(format!("{}/api/tally", base_url))
        .send()
        .await
        .context("Failed to fetch tally")?
        .json()
        .await
        .context("Failed to parse tally")?;
    Ok(results.iter().map(|r| r.votes).sum())
}
