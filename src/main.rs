use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use clap::Parser;
use tracing::{error, info};
use symdb::core::config::Config;
use symdb::core::error::{Error, Result};
use symdb::core::hash::MurmurHash64A;
use symdb::dump::{dump_path, StdinGate, TextSink};
use symdb::resolver::Resolver;
use symdb::storage::fs::{FileSystem, StdFileSystem};
use symdb::writer::{DatabaseGenerator, LiteralScanner};

/// Generates and queries hash → string databases for debugging hashed builds
#[derive(Parser, Debug)]
#[command(name = "symdb", version)]
struct Cli {
    /// File or directory to search for databases (and to scan when generating)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Database path for --generate; with --dump, the dump is written to <OUTPUT>.txt
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Hash to reverse, hexadecimal unless --decimal (repeatable)
    #[arg(short, long = "search", value_name = "HASH")]
    search: Vec<String>,

    /// Parse --search values as base 10
    #[arg(long)]
    decimal: bool,

    /// Generate a database from the string literals under --input
    #[arg(short, long)]
    generate: bool,

    /// Store strings verbatim instead of prefix-coded
    #[arg(long)]
    no_compress: bool,

    /// Print a readable listing of the input (or generated) database
    #[arg(short, long)]
    dump: bool,

    /// Pause after every N dumped entries
    #[arg(long, value_name = "N")]
    page: Option<u32>,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_hash(query: &str, decimal: bool) -> Result<u64> {
    let parsed = if decimal {
        query.parse::<u64>()
    } else {
        let digits = query
            .strip_prefix("0x")
            .or_else(|| query.strip_prefix("0X"))
            .unwrap_or(query);
        u64::from_str_radix(digits, 16)
    };
    parsed.map_err(|e| Error::invalid_argument(format!("'{}' is not a hash: {}", query, e)))
}

fn default_output(root: &Path, extension: &str) -> PathBuf {
    let stem = root
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("symbols");
    PathBuf::from(format!("{}.{}", stem, extension))
}

fn with_txt_suffix(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".txt");
    PathBuf::from(name)
}

fn generate(config: &Config, output: &Path) -> Result<()> {
    let scanner = LiteralScanner::new(config, MurmurHash64A::default())?;
    let corpus = scanner.scan_path(&StdFileSystem, &config.root_path)?;
    DatabaseGenerator::new(config.compress).generate(&StdFileSystem, output, corpus)?;
    Ok(())
}

fn dump(config: &Config, input: &Path, output: Option<&Path>) -> Result<()> {
    match output {
        Some(output) => {
            let file = StdFileSystem.create_for_write(output)?;
            let mut sink = TextSink::new(file);
            dump_path(&StdFileSystem, config, input, &mut sink)?;
            info!(path = %output.display(), entries = sink.written(), "wrote dump");
        }
        None => {
            let mut sink = TextSink::paged(io::stdout().lock(), StdinGate, config.page_size);
            dump_path(&StdFileSystem, config, input, &mut sink)?;
        }
    }
    Ok(())
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(input) = &cli.input {
        config.root_path = input.clone();
    }
    if cli.no_compress {
        config.compress = false;
    }
    if let Some(page) = cli.page {
        config.page_size = page;
    }

    let hashes = cli
        .search
        .iter()
        .map(|query| parse_hash(query, cli.decimal))
        .collect::<Result<Vec<u64>>>()?;

    let mut resolver = Resolver::with_config(config.clone());
    for (query, hash) in cli.search.iter().zip(hashes) {
        println!("{} = '{}'", query, resolver.try_decode(hash));
    }

    let mut ok = true;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&config.root_path, &config.database_extension));

    if cli.generate {
        if let Err(e) = generate(&config, &output) {
            error!("generate failed: {}", e);
            ok = false;
        }
    }

    if cli.dump {
        let input = if cli.generate { output.as_path() } else { config.root_path.as_path() };
        let dump_file = cli.output.as_deref().map(with_txt_suffix);
        if let Err(e) = dump(&config, input, dump_file.as_deref()) {
            error!("dump failed: {}", e);
            ok = false;
        }
    }

    Ok(ok)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.quiet { tracing::Level::WARN } else { tracing::Level::INFO })
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let start = Instant::now();
    let result = run(cli);
    info!("done, took {:.3} s", start.elapsed().as_secs_f64());

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
