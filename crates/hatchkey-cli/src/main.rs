//! hatchkey - Recover the password of a ZipCrypto-protected archive
//!
//! This tool enumerates every password of a fixed length over an alphabet,
//! splits the work across threads, and stops as soon as one candidate
//! decrypts the archive.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use hatchkey_core::keyspace::{DIGITS, LOWERCASE, PUNCTUATION, UPPERCASE};
use hatchkey_core::{
    Alphabet, NullProgress, ProgressEvent, ProgressSink, Search, SearchConfig, SearchReport,
    SearchStatus, TracingProgress, ZipArchive,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, Level};
use tracing_subscriber::EnvFilter;

/// Exit code for fatal input errors and incomplete searches
const EXIT_ABORTED: u8 = 2;

/// Recover the password of a ZipCrypto-protected archive by exhaustive search
#[derive(Parser, Debug)]
#[command(name = "hatchkey")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the encrypted zip archive
    archive: PathBuf,

    /// Password length to search
    #[arg(short, long, env = "HATCHKEY_LENGTH", default_value = "6")]
    length: usize,

    /// Predefined character set
    #[arg(short, long, value_enum, default_value = "digits-lower")]
    charset: Charset,

    /// Explicit alphabet, in enumeration order (overrides --charset)
    #[arg(short, long, env = "HATCHKEY_ALPHABET", conflicts_with = "charset")]
    alphabet: Option<String>,

    /// Number of worker threads (at most the alphabet size)
    #[arg(short, long, env = "HATCHKEY_WORKERS", default_value = "8")]
    workers: usize,

    /// Attempts between progress lines per worker (0 = never)
    #[arg(long, default_value = "50000")]
    progress_every: u64,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// File the recovered password is written to
    #[arg(short, long, default_value = "password.txt")]
    output: PathBuf,

    /// Overwrite the output file if it already exists
    #[arg(long)]
    force: bool,

    /// Don't write the output file
    #[arg(long, conflicts_with_all = ["output", "force"])]
    no_output: bool,

    /// Suppress progress lines
    #[arg(short, long)]
    quiet: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only show the target entry and keyspace size
    #[arg(long)]
    info: bool,
}

/// Predefined alphabets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Charset {
    /// 0-9
    Digits,
    /// a-z
    Lower,
    /// 0-9 then a-z
    DigitsLower,
    /// 0-9, a-z then A-Z
    Alnum,
    /// Every printable ASCII character except space
    Printable,
}

impl Charset {
    fn symbols(self) -> String {
        match self {
            Self::Digits => DIGITS.to_string(),
            Self::Lower => LOWERCASE.to_string(),
            Self::DigitsLower => format!("{DIGITS}{LOWERCASE}"),
            Self::Alnum => format!("{DIGITS}{LOWERCASE}{UPPERCASE}"),
            Self::Printable => format!("{DIGITS}{LOWERCASE}{UPPERCASE}{PUNCTUATION}"),
        }
    }
}

/// Prints progress events to stderr
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn report(&self, event: &ProgressEvent) {
        eprintln!("{event}");
    }
}

/// Where progress events go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressMode {
    /// Dropped
    Silent,
    /// Bare lines on stderr
    Console,
    /// Through the log, interleaved with `-v` diagnostics
    Log,
}

impl ProgressMode {
    fn from_cli(cli: &Cli) -> Self {
        if cli.quiet || cli.progress_every == 0 {
            Self::Silent
        } else if cli.verbose > 0 {
            Self::Log
        } else {
            Self::Console
        }
    }

    fn sink(self) -> &'static dyn ProgressSink {
        match self {
            Self::Silent => &NullProgress,
            Self::Console => &ConsoleProgress,
            Self::Log => &TracingProgress,
        }
    }
}

impl Cli {
    fn search_config(&self) -> Result<SearchConfig> {
        let symbols = match &self.alphabet {
            Some(symbols) => symbols.clone(),
            None => self.charset.symbols(),
        };
        let alphabet = Alphabet::new(&symbols)?;

        Ok(SearchConfig::new()
            .alphabet(alphabet)
            .length(self.length)
            .workers(self.workers)
            .progress_interval(self.progress_every)
            .timeout(self.timeout.map(Duration::from_secs)))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

/// Runs the requested mode and returns the process exit code
fn run(cli: &Cli) -> Result<u8> {
    let config = cli.search_config()?;
    if !cli.info && !cli.no_output {
        check_output_path(&cli.output, cli.force)?;
    }
    let archive = ZipArchive::open(&cli.archive)?;
    let search = Search::new(&archive, config)?;

    if cli.info {
        print_info(&archive, &search);
        return Ok(0);
    }

    let report = search
        .run(ProgressMode::from_cli(cli).sink())
        .with_context(|| format!("Search over {} failed", cli.archive.display()))?;

    Ok(conclude(cli, &report))
}

/// Prints the report and saves a recovered password. The exit code always
/// follows the search status; a failed write is only logged.
fn conclude(cli: &Cli, report: &SearchReport) -> u8 {
    print_report(report);

    if let (Some(password), false) = (report.password(), cli.no_output) {
        match write_password_file(&cli.output, password, cli.force) {
            Ok(()) => info!("Wrote {}", cli.output.display()),
            Err(e) => error!("Password not saved: {e:#}"),
        }
    }

    report.status.exit_code()
}

/// Describe what would be searched
fn print_info(archive: &ZipArchive, search: &Search<'_, ZipArchive>) {
    let target = archive.target();
    let keyspace = search.keyspace();

    println!("Archive:   {}", archive.path().display());
    println!("Entries:   {}", archive.entry_count());
    println!(
        "Target:    {} ({:?}, {} -> {} bytes)",
        target.name, target.method, target.compressed_size, target.uncompressed_size
    );
    println!("Alphabet:  {} ({} symbols)", keyspace.alphabet(), keyspace.alphabet().len());
    println!("Length:    {}", keyspace.length());
    println!("Keyspace:  {} candidates", keyspace.size());
    for part in search.partitions() {
        debug!(
            "Worker {}: {} candidates starting at index {}",
            part.worker_id,
            part.candidate_count(keyspace),
            part.index_range(keyspace).start
        );
    }
}

fn print_report(report: &SearchReport) {
    let elapsed = report.elapsed.as_secs_f64();
    match &report.status {
        SearchStatus::Found(winner) => {
            println!("Password found: {}", winner.candidate);
            println!(
                "Found by worker {} after {} of its attempts ({} total) in {:.2}s",
                winner.worker_id, winner.attempts, report.total_attempts, elapsed
            );
        }
        SearchStatus::Exhausted => {
            println!(
                "Password not found: all {} candidates tried in {:.2}s",
                report.total_attempts, elapsed
            );
        }
        SearchStatus::Incomplete { aborted_workers } => {
            error!(
                "Workers {:?} aborted on I/O errors; their partitions were not fully searched",
                aborted_workers
            );
            println!(
                "Search incomplete: {} of {} candidates tried in {:.2}s",
                report.total_attempts, report.keyspace_size, elapsed
            );
        }
        SearchStatus::Cancelled => {
            println!(
                "Search timed out: {} of {} candidates tried in {:.2}s",
                report.total_attempts, report.keyspace_size, elapsed
            );
        }
    }
}

/// Fails if `output_path` would be clobbered without `force`
fn check_output_path(output_path: &Path, force: bool) -> Result<()> {
    if output_path.exists() && !force {
        bail!(
            "File already exists: {} (use --force to overwrite)",
            output_path.display()
        );
    }
    Ok(())
}

/// Write the recovered password, refusing to clobber an existing file
fn write_password_file(output_path: &Path, password: &str, force: bool) -> Result<()> {
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    check_output_path(output_path, force)?;

    let mut file = fs::File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

    writeln!(file, "{password}")
        .with_context(|| format!("Failed to write file: {}", output_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hatchkey_core::Winner;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    #[test]
    fn test_charset_symbols() {
        assert_eq!(Charset::Digits.symbols(), "0123456789");
        assert_eq!(
            Charset::DigitsLower.symbols(),
            "0123456789abcdefghijklmnopqrstuvwxyz"
        );
        assert_eq!(Charset::Alnum.symbols().len(), 62);
        assert_eq!(Charset::Printable.symbols().len(), 94);
        assert!(Alphabet::new(Charset::Printable.symbols()).is_ok());
    }

    #[test]
    fn test_search_config_from_args() {
        let cli = Cli::parse_from(["hatchkey", "locked.zip", "-l", "4", "-w", "3"]);
        let config = cli.search_config().unwrap();
        assert_eq!(config.length, 4);
        assert_eq!(config.workers, 3);
        assert_eq!(config.alphabet.len(), 36);
        assert_eq!(config.progress_interval, 50_000);
        assert_eq!(config.timeout, None);

        let cli = Cli::parse_from(["hatchkey", "locked.zip", "-a", "xyz", "--timeout", "5"]);
        let config = cli.search_config().unwrap();
        assert_eq!(config.alphabet.symbols(), b"xyz");
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));

        let cli = Cli::parse_from(["hatchkey", "locked.zip", "-a", "aa"]);
        assert!(cli.search_config().is_err());
    }

    #[test]
    fn test_alphabet_conflicts_with_charset() {
        let parsed = Cli::try_parse_from(["hatchkey", "x.zip", "-a", "abc", "-c", "digits"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_write_password_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("password.txt");

        write_password_file(&path, "7k2p", false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "7k2p\n");

        // Existing file is kept without --force
        let err = write_password_file(&path, "zzzz", false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "7k2p\n");

        write_password_file(&path, "zzzz", true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "zzzz\n");
    }

    #[test]
    fn test_missing_archive_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.zip");
        let args: Vec<std::ffi::OsString> = vec![
            "hatchkey".into(),
            missing.into_os_string(),
            "--no-output".into(),
        ];
        let cli = Cli::parse_from(args);
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    fn os_args(args: &[&OsStr]) -> Cli {
        Cli::parse_from(args.iter().copied())
    }

    fn found(password: &str) -> SearchReport {
        SearchReport {
            status: SearchStatus::Found(Winner {
                candidate: password.to_string(),
                worker_id: 1,
                attempts: 42,
                elapsed: Duration::from_millis(3),
            }),
            total_attempts: 100,
            keyspace_size: 1296,
            elapsed: Duration::from_millis(4),
            workers: Vec::new(),
        }
    }

    #[test]
    fn test_existing_output_rejected_before_search() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("password.txt");
        fs::write(&output, "old\n").unwrap();

        // The archive is never opened: the output check comes first
        let archive = temp_dir.path().join("missing.zip");
        let cli = os_args(&[
            OsStr::new("hatchkey"),
            archive.as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
        ]);
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("--force"));
        assert_eq!(fs::read_to_string(&output).unwrap(), "old\n");

        let cli = os_args(&[
            OsStr::new("hatchkey"),
            archive.as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
            OsStr::new("--force"),
        ]);
        let err = run(&cli).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_found_exit_code_survives_failed_write() {
        let temp_dir = TempDir::new().unwrap();

        let output = temp_dir.path().join("password.txt");
        let cli = os_args(&[
            OsStr::new("hatchkey"),
            OsStr::new("x.zip"),
            OsStr::new("-o"),
            output.as_os_str(),
        ]);
        assert_eq!(conclude(&cli, &found("k3")), 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "k3\n");

        // Output path is a directory, so creating the file fails
        let cli = os_args(&[
            OsStr::new("hatchkey"),
            OsStr::new("x.zip"),
            OsStr::new("-o"),
            temp_dir.path().as_os_str(),
            OsStr::new("--force"),
        ]);
        assert_eq!(conclude(&cli, &found("k3")), 0);

        let mut exhausted = found("k3");
        exhausted.status = SearchStatus::Exhausted;
        assert_eq!(conclude(&cli, &exhausted), 1);
    }

    #[test]
    fn test_progress_mode() {
        let mode = |args: &[&str]| ProgressMode::from_cli(&Cli::parse_from(args));
        assert_eq!(mode(&["hatchkey", "a.zip"]), ProgressMode::Console);
        assert_eq!(mode(&["hatchkey", "a.zip", "-v"]), ProgressMode::Log);
        assert_eq!(mode(&["hatchkey", "a.zip", "-v", "-q"]), ProgressMode::Silent);
        assert_eq!(mode(&["hatchkey", "a.zip", "--progress-every", "0"]), ProgressMode::Silent);

        // Every sink accepts events
        let event = ProgressEvent {
            worker_id: 0,
            attempts: 50_000,
            elapsed: Duration::from_secs(1),
        };
        for mode in [ProgressMode::Silent, ProgressMode::Console, ProgressMode::Log] {
            mode.sink().report(&event);
        }
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
