use chrono::Local;
use clap::Parser;
use colored::*;
use pagurus::{Error, Runner, RunnerConfig, SinkFormat, Target};
use std::fs;
use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Attach to a process and stream its resource usage to csv or jsonl
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Process id to attach to (instead of the pid file)
    #[clap(short = 'i', long)]
    pid: Option<usize>,

    /// Output file name
    #[clap(short, long, value_name = "FILE")]
    outfile: Option<PathBuf>,

    /// Tag used in the default output file name
    #[clap(short, long)]
    tag: Option<String>,

    /// Polling rate in seconds
    #[clap(short, long, default_value = "0.1")]
    rate: f64,

    /// Write jsonl records instead of csv rows
    #[clap(short, long)]
    json: bool,

    /// Skip the csv header line
    #[clap(long)]
    no_header: bool,

    /// Environment variable to append to every record (repeatable)
    #[clap(short, long, value_name = "NAME")]
    env: Vec<String>,

    /// Pid file consulted when no pid or command is given
    #[clap(long, value_name = "FILE", default_value = "watch.pid")]
    pidfile: PathBuf,

    /// Run with debugging info
    #[clap(short, long)]
    debug: bool,

    /// Command to launch and monitor
    #[clap(trailing_var_arg = true)]
    command: Vec<String>,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.debug { "info" } else { "error" }),
    )
    .init();

    if !args.rate.is_finite() || args.rate <= 0.0 {
        eprintln!("{} polling rate must be a positive number", "Error:".red());
        exit(1);
    }

    let target = if let Some(pid) = args.pid {
        Target::Pid(pid)
    } else if !args.command.is_empty() {
        Target::Command(args.command.clone())
    } else {
        // A leftover pid file from an earlier run would point at a dead
        // process; drop it before waiting for a fresh one.
        let _ = fs::remove_file(&args.pidfile);
        Target::PidFile(args.pidfile.clone())
    };

    let format = if args.json {
        SinkFormat::Structured
    } else {
        SinkFormat::Delimited
    };
    let outfile = args.outfile.clone().unwrap_or_else(|| {
        let now = Local::now().format("%m-%d-%Y-%H:%M:%S");
        let ext = if args.json { "jsonl" } else { "csv" };
        match &args.tag {
            Some(tag) => PathBuf::from(format!("{}_stats_{}.{}", tag, now, ext)),
            None => PathBuf::from(format!("stats_{}.{}", now, ext)),
        }
    });

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        eprintln!("\nReceived Ctrl-C, finishing...");
    })
    .unwrap_or_else(|err| {
        eprintln!("Error setting Ctrl-C handler: {}", err);
        exit(1);
    });

    match &target {
        Target::Pid(pid) => println!("Monitoring process {}", pid.to_string().cyan()),
        Target::PidFile(path) => println!(
            "Waiting for pid file {}",
            path.display().to_string().cyan()
        ),
        Target::Command(cmd) => println!("Monitoring command: {}", cmd.join(" ").cyan()),
    }

    let config = RunnerConfig::new(target, &outfile)
        .with_format(format)
        .with_interval(Duration::from_secs_f64(args.rate))
        .with_write_header(!args.no_header)
        .with_static_fields(args.env.clone())
        .with_stop_flag(running);

    if let Err(err) = Runner::new(config).run() {
        eprintln!("{} {}", "Error:".red(), err);
        match err {
            Error::AttachTimeout { .. } => exit(100),
            Error::ProcessNotFound(_) => exit(200),
            _ => exit(1),
        }
    }

    println!("Stats written to {}", outfile.display().to_string().green());
}
