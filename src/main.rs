use clap::Parser;
use fitmend::probe::FitRecordProbe;
use fitmend::repair::{self, RepairError, RepairOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit code for a search that ran to completion without a readable file.
const EXIT_UNRECOVERABLE: u8 = 2;
/// Exit code for a search stopped by Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "fitmend", version, about = "Repair truncated or tail-corrupted FIT files")]
struct Cli {
    /// FIT file to repair
    input: PathBuf,
    /// Output path (default: input with its last 4 characters replaced by `_rec.fit`)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Largest number of trailing bytes to try discarding
    #[arg(long)]
    max_trim: Option<usize>,
    /// Accept candidates whose records parse even if the file CRC does not match
    #[arg(long)]
    no_crc_check: bool,
    /// Only inspect the file; write nothing
    #[arg(long)]
    check: bool,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
    /// Suppress the progress counter
    #[arg(short, long)]
    quiet: bool,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ RepairError::Unrecoverable { .. }) => {
            eprintln!("\nunrecoverable: {e}");
            ExitCode::from(EXIT_UNRECOVERABLE)
        }
        Err(e @ RepairError::Cancelled { .. }) => {
            eprintln!("\n{e}; no output written");
            ExitCode::from(EXIT_CANCELLED)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "fitmend=debug",
        _ => "fitmend=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), RepairError> {
    let probe = FitRecordProbe { check_crc: !cli.no_crc_check, ..Default::default() };

    // ── Check ─────────────────────────────────────────────────────────────────
    if cli.check {
        let ins = repair::inspect_file(&cli.input, &probe)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&ins).map_err(std::io::Error::from)?);
            return Ok(());
        }
        let crc = |v: Option<u16>| v.map(|c| format!("{c:#06x}")).unwrap_or_else(|| "—".into());
        println!("── FIT file ─────────────────────────────────────────────");
        println!("  Path             {}", cli.input.display());
        println!("  Size             {} B (header implies {} B)", ins.size, ins.expected_size);
        println!("  Header size      {}", ins.header_size);
        println!("  Protocol         {:#04x}", ins.protocol_version);
        println!("  Profile          {}", ins.profile_version);
        println!("  Data size        {} B", ins.declared_data_size);
        println!("  Signature        {} ({})", ins.signature, if ins.signature_valid { "ok" } else { "bad" });
        println!("  Header CRC       {}", crc(ins.header_crc));
        println!("  File CRC         stored {} / computed {}", crc(ins.stored_crc), crc(ins.computed_crc));
        match (&ins.stats, &ins.problem) {
            (Some(s), _) => println!(
                "  Readable         yes ({} file(s), {} definitions, {} data messages)",
                s.files, s.definitions, s.data_messages
            ),
            (None, Some(p)) => println!("  Readable         no: {p}"),
            (None, None) => println!("  Readable         no"),
        }
        return Ok(());
    }

    // ── Repair ────────────────────────────────────────────────────────────────
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        if let Err(e) = ctrlc::set_handler(move || cancel.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    let opts = RepairOptions {
        output:   cli.output.clone(),
        max_trim: cli.max_trim,
        probe,
    };
    let show_progress = !cli.quiet && !cli.json;
    let mut progress = |trim: usize, _limit: usize| {
        if show_progress {
            eprint!("\r{trim}");
            let _ = std::io::stderr().flush();
        }
    };
    let report = repair::repair_file_with_progress(&cli.input, &opts, Some(&*cancel), Some(&mut progress))?;
    if show_progress {
        eprintln!();
    }

    if cli.json {
        println!("{}", report.to_json().map_err(std::io::Error::from)?);
    } else {
        println!("Recovered (trim = {})", report.trim);
        println!("  {}", report.summary());
        println!("  Written: {}", report.output);
    }
    Ok(())
}
