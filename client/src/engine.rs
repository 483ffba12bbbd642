use std::{
    io::Write,
    path::PathBuf,
    process::Stdio,
};

use anyhow::Context;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    sync::mpsc,
};
use tracing::*;

use crate::{
    parser::{ParseStep, StreamParser, TargetMatch},
    Shutdown,
};

/// Fixed engine scan width; one range token plus this suffix forms the
/// numeric start offset of a scan.
pub const SCAN_WIDTH: &str = "42";
pub const START_SUFFIX: &str = "0000000000";

pub const SCRATCH_FILE: &str = "addresses_temp.txt";

pub struct EngineRunner {
    pub engine_path: PathBuf,
    pub scratch_path: PathBuf,
    pub target_addr: String,
}

/// One finished engine run. `hit` is set when the fixed target address was
/// reported, possibly with partially captured key fields.
pub struct RunOutcome {
    pub candidates: Vec<String>,
    pub hit: Option<TargetMatch>,
}

impl EngineRunner {
    pub fn new(engine_path: PathBuf, target_addr: &str) -> Self {
        EngineRunner {
            engine_path,
            scratch_path: PathBuf::from(SCRATCH_FILE),
            target_addr: target_addr.to_string(),
        }
    }

    /// Runs one full scan over `range`. The scratch address file is written
    /// before launch and removed after the engine has fully exited, on every
    /// path.
    pub async fn run(
        &self,
        gpu_id: &str,
        range: &str,
        addresses: &[String],
        shutdown: &Shutdown,
    ) -> anyhow::Result<RunOutcome> {
        self.write_scratch(addresses).await?;
        let result = self.scan(gpu_id, range, shutdown).await;
        if let Err(err) = tokio::fs::remove_file(&self.scratch_path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("fail to remove scratch file: {err}");
            }
        }
        result
    }

    /// One address per line, the fixed target address always last.
    async fn write_scratch(&self, addresses: &[String]) -> anyhow::Result<()> {
        let mut text = String::new();
        for addr in addresses {
            text.push_str(addr.trim());
            text.push('\n');
        }
        text.push_str(&self.target_addr);
        text.push('\n');
        tokio::fs::write(&self.scratch_path, text)
            .await
            .context("fail to write scratch address file")
    }

    async fn scan(
        &self,
        gpu_id: &str,
        range: &str,
        shutdown: &Shutdown,
    ) -> anyhow::Result<RunOutcome> {
        let start = format!("{range}{START_SUFFIX}");

        let mut child = Command::new(&self.engine_path)
            .arg("-gpuId")
            .arg(gpu_id)
            .arg("-i")
            .arg(&self.scratch_path)
            .arg("-start")
            .arg(&start)
            .arg("-range")
            .arg(SCAN_WIDTH)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("fail to launch engine {:?}", self.engine_path))?;

        let stdout = child.stdout.take().context("engine stdout not captured")?;
        let stderr = child.stderr.take().context("engine stderr not captured")?;

        // merge both pipes into one chunk stream
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
        spawn_pipe_reader(stdout, tx.clone());
        spawn_pipe_reader(stderr, tx);

        let mut parser = StreamParser::new(&self.target_addr);
        let mut matched = false;

        loop {
            let chunk = tokio::select! {
                chunk = rx.recv() => chunk,
                _ = shutdown.wait() => {
                    info!("shutdown requested, stopping engine");
                    break;
                }
            };
            let Some(chunk) = chunk else {
                // both pipes closed
                parser.finish();
                break;
            };
            let step = parser.push(&String::from_utf8_lossy(&chunk));
            redraw_speed(parser.latest_speed());
            if step == ParseStep::MatchFound {
                matched = true;
                break;
            }
        }

        // the engine keeps scanning past a hit; take it down the moment the
        // hit resolves, and on operator shutdown
        if matched || shutdown.is_triggered() {
            if let Err(err) = child.kill().await {
                debug!("engine kill: {err}");
            }
        }
        let status = child.wait().await.context("fail to wait for engine exit")?;
        debug!("engine exited: {status}");

        // move past the in-place speed redraw
        println!();

        let (candidates, hit) = parser.into_results();
        Ok(RunOutcome { candidates, hit })
    }
}

fn spawn_pipe_reader<R>(mut pipe: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin + Send + 'static, {
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn redraw_speed(speed: &str) {
    if speed.is_empty() {
        return;
    }
    let mut out = std::io::stdout();
    let _ = write!(out, "\r{speed}");
    let _ = out.flush();
}
