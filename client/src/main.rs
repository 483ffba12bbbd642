use std::{
    path::PathBuf,
    process::exit,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use clap::Parser;
use colored::Colorize;
use crossterm::event::Event;
use shared::{errors::ClientError, interaction::RangeResponse, log::init_log};
use tokio::{signal, sync::Notify, time};
use tracing::*;

use crate::{
    config::{load_config, Config},
    engine::EngineRunner,
    parser::TargetMatch,
    restful::{validate_prefix, ServerAPI, API_URL},
};

mod config;
mod engine;
mod gpu;
mod parser;
mod pow;
mod restful;

/// The one address the whole pool is hunting for.
pub const TARGET_ADDR: &str = "1MVDYgVaSN6iKKEsbzRUAYFrYJadLYZvvZ";

const CONFIG_FILE: &str = "config.json";
const RESULT_FILE: &str = "68bit.txt";

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        const ENGINE_PATH: &str = "VanitySearch.exe";
    } else {
        const ENGINE_PATH: &str = "./vanitysearch";
    }
}

const ACQUIRE_RETRY_DELAY: u64 = 60;
const INCOMPLETE_RETRY_DELAY: u64 = 5;
const SUBMIT_RETRY_DELAY: u64 = 60;
const CYCLE_DELAY: u64 = 1;

#[derive(Parser, Debug)]
#[command(about, version)]
struct Args {
    #[arg(long, value_name = "FILE", help = "Path to the JSON config file", default_value = CONFIG_FILE)]
    config: String,

    #[arg(long, value_name = "URL", help = "Coordination server API base url", default_value = API_URL)]
    api_url: String,

    #[arg(long, value_name = "PATH", help = "Path to the search engine executable", default_value = ENGINE_PATH)]
    engine: PathBuf,
}

/// Cooperative shutdown request, set from the ctrl-c task and observed by
/// the session loop and the engine read loop.
pub struct Shutdown {
    flag: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Shutdown {
            flag: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

#[tokio::main]
async fn main() {
    init_log();

    let args = Args::parse();

    let code = match run(args).await {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            1
        }
    };

    press_any_key();
    exit(code);
}

async fn run(args: Args) -> Result<(), ClientError> {
    let config = load_config(&args.config).await?;

    info!("device: {}", config.device_name.bold());
    info!("worker: {}", config.workername.bold());

    // a bad prefix must never reach the server
    if let Some(prefix) = config.prefix() {
        validate_prefix(prefix)?;
    }

    if !args.engine.exists() {
        return Err(ClientError::EngineMissing(format!(
            "{}, place it next to this binary",
            args.engine.display()
        )));
    }

    let shutdown = Arc::new(Shutdown::new());
    let ctrl_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("ctrl+c received, finishing up");
            ctrl_shutdown.trigger();
        }
    });

    let mut session = Session {
        api: ServerAPI {
            url: args.api_url,
            token: config.token.clone(),
        },
        runner: EngineRunner::new(args.engine, TARGET_ADDR),
        config,
        shutdown,
    };

    match session.run().await {
        SessionEnd::Found => {
            info!("{}", "the search is over, enjoy the reward".bold().green());
        }
        SessionEnd::Aborted => {}
        SessionEnd::Interrupted => {
            info!("interrupted, shutting down");
        }
    }
    Ok(())
}

#[derive(Debug)]
enum Step {
    Acquire,
    Scan { range: String, addresses: Vec<String> },
    Submit { range: String, proof_of_work: String },
    Found(TargetMatch),
}

enum SessionEnd {
    Found,
    Aborted,
    Interrupted,
}

enum AcquireDecision {
    Grant { range: String, addresses: Vec<String> },
    Denied(Option<String>),
    Incomplete,
}

/// A grant is only usable with a non-empty range and address list; anything
/// else is retried from `Acquire` after a backoff.
fn decide_acquire(resp: RangeResponse) -> AcquireDecision {
    if !resp.success {
        return AcquireDecision::Denied(resp.message);
    }
    match (resp.range, resp.addresses) {
        (Some(range), Some(addresses)) if !range.is_empty() && !addresses.is_empty() => {
            AcquireDecision::Grant { range, addresses }
        }
        _ => AcquireDecision::Incomplete,
    }
}

struct Session {
    config: Config,
    api: ServerAPI,
    runner: EngineRunner,
    shutdown: Arc<Shutdown>,
}

impl Session {
    /// One range at a time: acquire, scan, submit, repeat. Ends on a target
    /// hit, an unrecoverable run, or an operator interrupt.
    async fn run(&mut self) -> SessionEnd {
        let mut step = Step::Acquire;
        loop {
            if self.shutdown.is_triggered() {
                return SessionEnd::Interrupted;
            }
            step = match step {
                Step::Acquire => {
                    info!("requesting a new scan range");
                    match self.api.acquire_range(&self.config).await {
                        Ok(resp) => match decide_acquire(resp) {
                            AcquireDecision::Grant { range, addresses } => {
                                Step::Scan { range, addresses }
                            }
                            AcquireDecision::Denied(message) => {
                                warn!(
                                    "range not granted: {}",
                                    message.as_deref().unwrap_or("unknown reason")
                                );
                                self.pause(ACQUIRE_RETRY_DELAY).await;
                                Step::Acquire
                            }
                            AcquireDecision::Incomplete => {
                                warn!("incomplete range grant, asking again");
                                self.pause(INCOMPLETE_RETRY_DELAY).await;
                                Step::Acquire
                            }
                        },
                        Err(err) => {
                            warn!("fail to acquire range: {err:#}");
                            self.pause(ACQUIRE_RETRY_DELAY).await;
                            Step::Acquire
                        }
                    }
                }

                Step::Scan { range, addresses } => {
                    info!("scanning range {}", range.bold());
                    match self
                        .runner
                        .run(&self.config.gpu_id, &range, &addresses, &self.shutdown)
                        .await
                    {
                        Err(err) => {
                            error!("engine run failed: {err:#}");
                            return SessionEnd::Aborted;
                        }
                        Ok(outcome) => {
                            if self.shutdown.is_triggered() {
                                return SessionEnd::Interrupted;
                            }
                            if let Some(hit) = outcome.hit {
                                Step::Found(hit)
                            } else if outcome.candidates.is_empty() {
                                error!("engine produced no candidates and no hit, giving up");
                                return SessionEnd::Aborted;
                            } else {
                                let proof_of_work = pow::compute_sha256_sum(&outcome.candidates);
                                Step::Submit { range, proof_of_work }
                            }
                        }
                    }
                }

                Step::Submit { range, proof_of_work } => {
                    match self
                        .api
                        .submit_range(
                            &range,
                            &proof_of_work,
                            &self.config.device_name,
                            &self.config.workername,
                        )
                        .await
                    {
                        Ok(resp) if resp.success => {
                            info!("range {} submitted", range.bold());
                        }
                        Ok(resp) => {
                            warn!(
                                "range submit rejected: {}",
                                resp.message.as_deref().unwrap_or("unknown reason")
                            );
                            self.pause(SUBMIT_RETRY_DELAY).await;
                        }
                        Err(err) => {
                            warn!("fail to submit range: {err:#}");
                            self.pause(SUBMIT_RETRY_DELAY).await;
                        }
                    }
                    self.pause(CYCLE_DELAY).await;
                    Step::Acquire
                }

                Step::Found(hit) => {
                    match save_target_result(&hit) {
                        Ok(()) => info!("private key saved to {}", RESULT_FILE.bold()),
                        Err(err) => {
                            // never lose the key material over a write error
                            error!("fail to write result file: {err}");
                            info!(
                                "match result: addr={} wif={} hex={}",
                                hit.pub_addr,
                                hit.priv_wif.as_deref().unwrap_or(""),
                                hit.priv_hex.as_deref().unwrap_or("")
                            );
                        }
                    }
                    info!("{}", "the target key was found during this scan".bold().green());
                    info!(
                        "move the reward through a private relay service so the sweep \
                         transaction cannot be replaced in the public mempool"
                    );
                    return SessionEnd::Found;
                }
            };
        }
    }

    /// Backoff sleep that yields early on a shutdown request.
    async fn pause(&self, secs: u64) {
        tokio::select! {
            _ = time::sleep(Duration::from_secs(secs)) => {}
            _ = self.shutdown.wait() => {}
        }
    }
}

/// Written once, only on a hit.
fn save_target_result(hit: &TargetMatch) -> std::io::Result<()> {
    let text = format!(
        "Public Addr: {}\nPriv (WIF): {}\nPriv (HEX): {}\n",
        hit.pub_addr,
        hit.priv_wif.as_deref().unwrap_or(""),
        hit.priv_hex.as_deref().unwrap_or(""),
    );
    std::fs::write(RESULT_FILE, text)
}

/// Blocking exit gate; every termination path goes through it so the
/// operator sees the final message before the window closes.
fn press_any_key() {
    println!("{}", "press any key to exit...".bold());
    if crossterm::terminal::enable_raw_mode().is_ok() {
        loop {
            match crossterm::event::read() {
                Ok(Event::Key(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = crossterm::terminal::disable_raw_mode();
    } else {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    }
}
