//! Binary entry point for the swaparena inspection and stress CLI.
#![forbid(unsafe_code)]

mod cli {
    pub mod config;
    pub mod ui;
}

use std::error::Error;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;
use swaparena::{
    ArenaOptions, EvictionController, Handle, ObjectArena, PagingOptions, Record, RecordKind,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::config::CliConfig;
use cli::ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "swaparena",
    version,
    about = "Inspect and exercise a paged object arena",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "SWAPARENA_CONFIG",
        value_name = "FILE",
        help = "Path to a TOML config file"
    )]
    config: Option<PathBuf>,

    #[command(flatten)]
    paging: PagingArgs,

    #[arg(long, global = true, value_enum, default_value_t = Theme::Auto)]
    theme: Theme,

    #[arg(long, short, global = true, help = "Plain, minimal output")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PagingArgs {
    #[arg(long, global = true, help = "Page size as a power of two (8..=24)")]
    page_shift: Option<u32>,

    #[arg(
        long,
        global = true,
        help = "Percent of the memory ceiling usable by resident pages (0 disables paging)"
    )]
    threshold_percent: Option<u8>,

    #[arg(long, global = true, help = "Memory ceiling in bytes")]
    memory_ceiling: Option<u64>,

    #[arg(long, global = true, help = "Explicit resident page budget")]
    budget_pages: Option<usize>,

    #[arg(long, global = true, help = "Minimum pages evicted per pass")]
    batch_size: Option<usize>,

    #[arg(long, global = true, help = "Page materializations between passes")]
    check_interval: Option<usize>,

    #[arg(long, global = true, value_name = "DIR", help = "Directory for swap files")]
    swap_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Deduplicate stored strings")]
    dedup: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resolved paging configuration.
    Info,
    /// Fill an arena under memory pressure and verify every record.
    Stress(StressCmd),
    /// Intern lines from stdin and report string-table statistics.
    Strings,
}

#[derive(Args, Debug)]
struct StressCmd {
    #[arg(long, default_value_t = 10_000, help = "Records to create")]
    records: u64,

    #[arg(long, default_value_t = 0x5eed, help = "Workload seed")]
    seed: u64,

    #[arg(long, default_value_t = 64, help = "Maximum label length")]
    max_label: usize,
}

/// Record layout used by the stress workload.
struct StressRecord;

impl RecordKind for StressRecord {
    const TAG: u8 = 0x5a;
    const SIZE: u32 = 24;
    const NAME: &'static str = "stress";
}

const VALUE: u32 = 1;
const LABEL: u32 = 9;
const PREV: u32 = 14;
const SEQ: u32 = 19;

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.clone())?;
    let ui = Ui::new(cli.theme, cli.quiet);
    let paging = build_paging_options(&config, &cli.paging);
    let mut arena_opts = config.arena_options();
    if cli.paging.dedup {
        arena_opts = arena_opts.dedup_strings(true);
    }

    match cli.command {
        Command::Info => {
            print_info(&ui, &config, &paging)?;
            Ok(0)
        }
        Command::Stress(cmd) => run_stress(&ui, &cmd, paging, arena_opts),
        Command::Strings => run_strings(&ui, paging, arena_opts),
    }
}

fn build_paging_options(config: &CliConfig, args: &PagingArgs) -> PagingOptions {
    let mut opts = config.paging_options();
    if let Some(shift) = args.page_shift {
        opts = opts.page_shift(shift);
    }
    if let Some(percent) = args.threshold_percent {
        opts = opts.memory_threshold_percent(percent);
    }
    if let Some(bytes) = args.memory_ceiling {
        opts = opts.memory_ceiling_bytes(bytes);
    }
    if let Some(pages) = args.budget_pages {
        opts = opts.resident_page_budget(pages);
    }
    if let Some(pages) = args.batch_size {
        opts = opts.batch_size(pages);
    }
    if let Some(interval) = args.check_interval {
        opts = opts.check_interval(interval);
    }
    if let Some(dir) = &args.swap_dir {
        opts = opts.swap_dir(dir.clone());
    }
    opts
}

fn print_info(ui: &Ui, config: &CliConfig, paging: &PagingOptions) -> Result<(), Box<dyn Error>> {
    let plan = paging.resolve()?;
    let config_path = config
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    ui.section(
        "Paging",
        [
            ("enabled", plan.enabled.to_string()),
            ("page size", format!("{} bytes", plan.page_size)),
            ("memory ceiling", format!("{} bytes", plan.memory_ceiling)),
            ("resident budget", format!("{} pages", plan.resident_budget)),
            ("batch size", plan.batch_size.to_string()),
            ("check interval", plan.check_interval.to_string()),
            ("swap dir", plan.swap_dir.display().to_string()),
            ("config", config_path),
        ],
    );
    Ok(())
}

fn run_stress(
    ui: &Ui,
    cmd: &StressCmd,
    paging: PagingOptions,
    arena_opts: ArenaOptions,
) -> Result<i32, Box<dyn Error>> {
    let controller = EvictionController::new(paging)?;
    let mut arena = ObjectArena::new(&controller, arena_opts)?;
    let mut rng = StdRng::seed_from_u64(cmd.seed);
    let mut expected: Vec<(Handle, u64, String)> = Vec::new();
    let mut prev = Handle::NULL;

    let pb = ui.progress(cmd.records, "writing");
    for seq in 0..cmd.records {
        let record = Record::<StressRecord>::create(&mut arena)?;
        let value: u64 = rng.gen();
        let label_len = rng.gen_range(0..=cmd.max_label);
        let label: String = (0..label_len)
            .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
            .collect();
        record.set_integer(&mut arena, VALUE, 8, value)?;
        record.set_string_field(&mut arena, LABEL, &label)?;
        record.set_handle_field(&mut arena, PREV, prev)?;
        record.set_integer(&mut arena, SEQ, 4, seq)?;
        prev = record.handle();
        expected.push((record.handle(), value, label));
        pb.inc(1);
    }
    pb.finish_and_clear();
    controller.run_housekeeping();
    info!(records = cmd.records, size = arena.size(), "swaparena.cli.stress_written");

    let pb = ui.progress(cmd.records, "verifying");
    let mut mismatches = 0u64;
    let mut prev = Handle::NULL;
    for (seq, (handle, value, label)) in expected.iter().enumerate() {
        let record = Record::<StressRecord>::attach(&arena, *handle)?;
        let ok = record.integer(&arena, VALUE, 8)? == *value
            && record.string_field(&arena, LABEL)?.as_deref() == Some(label.as_str())
            && record.handle_field(&arena, PREV)? == prev
            && record.integer(&arena, SEQ, 4)? == seq as u64 & 0xffff_ffff;
        if !ok {
            mismatches += 1;
        }
        prev = *handle;
        pb.inc(1);
    }
    pb.finish_and_clear();

    report_arena(ui, &controller, &arena);
    if mismatches > 0 {
        ui.warn(&format!("{mismatches} of {} records failed verification", cmd.records));
        return Ok(2);
    }
    ui.success(&format!("verified {} records", cmd.records));
    Ok(0)
}

fn run_strings(
    ui: &Ui,
    paging: PagingOptions,
    arena_opts: ArenaOptions,
) -> Result<i32, Box<dyn Error>> {
    let controller = EvictionController::new(paging)?;
    let mut arena = ObjectArena::new(&controller, arena_opts)?;
    let mut lines = 0u64;
    let mut distinct = FxHashSet::default();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let handle = arena.append_string(&line)?;
        if arena.read_string(handle)? != line {
            ui.warn(&format!("line {} did not read back intact", lines + 1));
            return Ok(2);
        }
        distinct.insert(handle);
        lines += 1;
    }
    arena.compact();
    ui.section(
        "Strings",
        [
            ("lines", lines.to_string()),
            ("distinct handles", distinct.len().to_string()),
            ("dedup", arena.dedup_enabled().to_string()),
        ],
    );
    report_arena(ui, &controller, &arena);
    Ok(0)
}

fn report_arena(ui: &Ui, controller: &Arc<EvictionController>, arena: &ObjectArena) {
    let stats = arena.stats();
    let mut rows = vec![
        ("size", format!("{} bytes", stats.size)),
        ("capacity", format!("{} bytes", stats.capacity)),
        ("pages", stats.store.pages.to_string()),
        ("resident pages", stats.store.resident_pages.to_string()),
        ("evictions", stats.store.evictions.to_string()),
        ("reloads", stats.store.reloads.to_string()),
        ("swap bytes", stats.store.swap_bytes.to_string()),
    ];
    if let Some(strings) = &stats.strings {
        rows.push(("strings", strings.to_string()));
    }
    ui.section("Arena", rows);
    ui.section("Controller", [("summary", controller.stats().to_string())]);
}
