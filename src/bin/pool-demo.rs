use std::process::exit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use clap::Parser;
use log::{error, info};
use rand::Rng;

use dispatch_pool::{Result, ThreadPool};

const DEFAULT_TASKS: usize = 20;
const DEFAULT_MAX_SLEEP_MS: u64 = 10;

#[derive(Parser)]
#[command(
    name = "pool-demo",
    version,
    about = "Runs a batch of jittered tasks through a dispatch pool"
)]
struct Cli {
    /// Number of worker threads [default: number of CPUs]
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Number of tasks to schedule
    #[arg(long, default_value_t = DEFAULT_TASKS, value_name = "N")]
    tasks: usize,

    /// Upper bound of each task's random sleep, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_SLEEP_MS, value_name = "MS")]
    max_sleep_ms: u64,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let threads = cli.threads.unwrap_or_else(num_cpus::get);

    info!("pool-demo {}", env!("CARGO_PKG_VERSION"));
    info!("Scheduling {} tasks on {} workers", cli.tasks, threads);

    let pool = ThreadPool::new(threads)?;
    let finished = Arc::new(Mutex::new(Vec::with_capacity(cli.tasks)));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for index in 0..cli.tasks {
        let finished = Arc::clone(&finished);
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        let max_sleep_ms = cli.max_sleep_ms;
        pool.schedule(move || {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);

            let sleep_ms = rand::thread_rng().gen_range(0..=max_sleep_ms);
            thread::sleep(Duration::from_millis(sleep_ms));

            finished.lock().unwrap().push(index);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        })?;
    }

    pool.wait();
    pool.shutdown()?;

    let completed = finished.lock().unwrap().len();
    println!(
        "completed {} tasks on {} workers, peak concurrency {}",
        completed,
        threads,
        peak.load(Ordering::SeqCst)
    );

    Ok(())
}
