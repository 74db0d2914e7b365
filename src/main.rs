use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use fpcbox::{Outcome, Runner, RunnerConfig, Submission};
use tokio::runtime;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Opt {
    /// Pascal source file, or `-` for stdin.
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Program arguments, split on whitespace.
    #[arg(long, default_value = "")]
    args: String,

    /// Text fed to the program's stdin.
    #[arg(long, default_value = "")]
    input: String,

    #[arg(long, short = 'p')]
    pretty: bool,

    #[command(flatten)]
    config: RunnerConfig,
}

fn setup_tracing() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    tracing_subscriber::fmt()
        .event_format(fmt::format::Format::default().pretty())
        .with_env_filter(EnvFilter::from_default_env())
        .with_timer(fmt::time::SystemTime)
        .with_writer(io::stderr)
        .finish()
        .with(ErrorLayer::default())
        .init();
}

fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read source from stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read source: path = {}", path.display()))
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();

    let opt = Opt::parse();

    let submission = Submission::new(read_source(&opt.source)?)
        .with_args(opt.args)
        .with_stdin(opt.input);

    let runner = Runner::new(opt.config)?;

    let runtime = runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let outcome: Outcome = runtime.block_on(runner.run_submission(&submission));

    {
        let stdout = io::stdout();
        let mut stdout_lock = stdout.lock();
        let out = &mut stdout_lock;
        if opt.pretty {
            serde_json::to_writer_pretty(&mut *out, &outcome)?;
        } else {
            serde_json::to_writer(&mut *out, &outcome)?;
        }
        writeln!(out)?;
    }

    Ok(())
}
