//! Café simulation driver.
//!
//! Opens a café, sends a batch of customers in at once, waits for every one
//! of them to leave, then closes the café.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use sleeping_barista::builders::build_cafe;
use sleeping_barista::config::{CafeConfig, OverflowPolicy};
use sleeping_barista::core::AppResult;
use sleeping_barista::runtime::run_arrivals;
use sleeping_barista::util::init_tracing;

/// Simulate customers visiting a café with sleeping baristas.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Seats in the café (defaults to `CAFE_SEATS` or 5).
    #[arg(long)]
    seats: Option<usize>,

    /// Baristas in the pool (defaults to `CAFE_BARISTAS` or 3).
    #[arg(long)]
    baristas: Option<usize>,

    /// Customers arriving at once.
    #[arg(long, default_value_t = 15)]
    customers: usize,

    /// Preparation time per coffee in milliseconds.
    #[arg(long)]
    service_ms: Option<u64>,

    /// Reject arrivals once this many are waiting at the door.
    #[arg(long)]
    max_waiting: Option<usize>,

    /// Give up waiting after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the final report as JSON.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn into_config(self, mut cfg: CafeConfig) -> CafeConfig {
        if let Some(seats) = self.seats {
            cfg.seats = seats;
        }
        if let Some(baristas) = self.baristas {
            cfg.baristas = baristas;
        }
        if let Some(ms) = self.service_ms {
            cfg.service_time_ms = ms;
        }
        if let Some(max_waiting) = self.max_waiting {
            cfg.overflow = OverflowPolicy::Reject { max_waiting };
        }
        if let Some(ms) = self.timeout_ms {
            cfg.arrival_timeout_ms = Some(ms);
        }
        cfg
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    init_tracing();

    let args = Args::parse();
    let customers = args.customers;
    let json = args.json;

    let base = CafeConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("reading CAFE_* environment")?;
    let cfg = args.into_config(base);

    let cafe = Arc::new(build_cafe(&cfg).context("opening cafe")?);
    let report = run_arrivals(&cafe, customers)
        .await
        .context("running arrivals")?;
    cafe.shutdown().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            served = report.served(),
            rejected = report.rejected,
            timed_out = report.timed_out,
            peak_occupancy = report.stats.peak_occupancy,
            peak_serving = report.stats.peak_serving,
            elapsed_ms = report.elapsed.as_millis(),
            "simulation finished"
        );
    }
    Ok(())
}
