//! rektsafe: threshold key shares, encrypted file envelopes, and Ed25519 signing
//!
//! Commands:
//!   keygen                  - generate a keypair and write the key-shares bundle
//!   encrypt <file>          - encrypt a file into a `.encrypted` envelope
//!   decrypt <envelope>      - open an envelope (wrapped keys need shares)
//!   sign / verify           - Ed25519 signatures over a UTF-8 message
//!   sign-file / verify-file - signatures over a file's SHA-256 digest
//!   gate                    - dry-run a share selection against a bundle
//!   config show             - display the effective configuration
//!
//! Every command runs inside one session; its output lines are printed in
//! order and any error line makes the process exit non-zero.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rektsafe_core::config::RektsafeConfig;
use rektsafe_core::{Severity, TerminalLine};
use rektsafe_crypto::{Session, ShareBundle, ShareScheme};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "rektsafe",
    version,
    about = "Threshold key shares, encrypted envelopes, and signatures",
    long_about = "rektsafe: split an Ed25519 key across parties, encrypt files into portable \
                  envelopes, and sign or verify messages"
)]
struct Cli {
    /// Path to rektsafe.toml configuration file
    #[arg(long, short = 'c', env = "REKTSAFE_CONFIG", default_value = "rektsafe.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log].level
    #[arg(long, env = "REKTSAFE_LOG")]
    log: Option<String>,

    /// Log format; overrides [log].format
    #[arg(long, env = "REKTSAFE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

/// Bundle and share selection used to recover the signing key
#[derive(clap::Args, Debug, Clone, Default)]
struct ShareArgs {
    /// Key-shares bundle JSON
    #[arg(long, short = 'b')]
    bundle: Option<PathBuf>,
    /// Party ids to combine, e.g. --select 1,3,5
    #[arg(long, short = 's', value_delimiter = ',')]
    select: Vec<u8>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an Ed25519 keypair and split it into party shares
    Keygen {
        /// Number of parties (2..=10; default from [keygen])
        #[arg(long, short = 'n')]
        parties: Option<u8>,
        /// Shares required to unlock (default from [keygen])
        #[arg(long, short = 't')]
        threshold: Option<u8>,
        /// Share scheme: replicated or shamir (default from [keygen])
        #[arg(long)]
        scheme: Option<String>,
        /// Bundle output path (default: <output dir>/rektsafe-shares.json)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Encrypt a file with AES-256-GCM into a portable envelope
    ///
    /// Without --wrap the envelope embeds its key and anyone holding the file
    /// can open it. With --wrap the key is sealed under the bundle's signing
    /// key, recovered from the selected shares.
    Encrypt {
        /// File to encrypt
        input: PathBuf,
        /// Envelope output path (default: <output dir>/<name>.<extension>)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Wrap the file key under the signing key (envelope version 2)
        #[arg(long)]
        wrap: bool,
        #[command(flatten)]
        shares: ShareArgs,
    },

    /// Decrypt an envelope back to the original file
    Decrypt {
        /// Envelope file
        input: PathBuf,
        /// Plaintext output path (default: <output dir>/<original file name>)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        #[command(flatten)]
        shares: ShareArgs,
    },

    /// Sign a message with the key recovered from selected shares
    Sign {
        message: String,
        #[command(flatten)]
        shares: ShareArgs,
    },

    /// Verify a hex signature against the bundle's public key
    Verify {
        message: String,
        signature: String,
        /// Key-shares bundle JSON
        #[arg(long, short = 'b')]
        bundle: PathBuf,
    },

    /// Sign the SHA-256 digest of a file
    #[command(name = "sign-file")]
    SignFile {
        file: PathBuf,
        #[command(flatten)]
        shares: ShareArgs,
    },

    /// Verify a file digest signature against the bundle's public key
    #[command(name = "verify-file")]
    VerifyFile {
        file: PathBuf,
        signature: String,
        /// Key-shares bundle JSON
        #[arg(long, short = 'b')]
        bundle: PathBuf,
    },

    /// Check a share selection against a bundle's threshold
    Gate {
        #[command(flatten)]
        shares: ShareArgs,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = RektsafeConfig::load(&cli.config)?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| log_format_from_config(&config.log.format));
    init_logging(&level, &format);

    let data_on_stdout =
        matches!(&cli.command, Commands::Keygen { out: Some(path), .. } if is_stdout(path));
    let mut session = Session::new();
    let outcome = run(
        &mut session,
        &config,
        &cli.config,
        cli.command,
        &mut std::io::stdout(),
    )
    .await;

    // lines recorded before a failure are still reported
    let code = report(&session, data_on_stdout);
    outcome?;
    Ok(code)
}

async fn run(
    session: &mut Session,
    config: &RektsafeConfig,
    config_path: &Path,
    command: Commands,
    stdout: &mut dyn Write,
) -> Result<()> {
    match command {
        Commands::Keygen {
            parties,
            threshold,
            scheme,
            out,
        } => {
            cmd_keygen(
                session,
                config,
                parties,
                threshold,
                scheme.as_deref(),
                out,
                stdout,
            )
            .await?
        }
        Commands::Encrypt {
            input,
            out,
            wrap,
            shares,
        } => cmd_encrypt(session, config, &input, out, wrap, &shares).await?,
        Commands::Decrypt { input, out, shares } => {
            cmd_decrypt(session, config, &input, out, &shares).await?
        }
        Commands::Sign { message, shares } => {
            open_shares(session, &shares).await?;
            session.sign_message(&message);
        }
        Commands::Verify {
            message,
            signature,
            bundle,
        } => {
            load_bundle(session, &bundle).await?;
            session.verify_message(&message, &signature);
        }
        Commands::SignFile { file, shares } => {
            open_shares(session, &shares).await?;
            let data = read_input(&file).await?;
            session.sign_file(&data);
        }
        Commands::VerifyFile {
            file,
            signature,
            bundle,
        } => {
            load_bundle(session, &bundle).await?;
            let data = read_input(&file).await?;
            session.verify_file(&data, &signature);
        }
        Commands::Gate { shares } => cmd_gate(session, &shares).await?,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(config, config_path)?,
    }
    Ok(())
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn log_format_from_config(format: &str) -> LogFormat {
    if format.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Text
    }
}

/// Print session output; error lines go to stderr and fail the process.
///
/// When stdout carries data (a bundle written to `-`), every line goes to stderr.
fn report(session: &Session, data_on_stdout: bool) -> ExitCode {
    for line in session.output() {
        if data_on_stdout || line.severity == Severity::Error {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
    if session.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Explicit path, else `file_name` under the configured output directory.
fn output_path(config: &RektsafeConfig, explicit: Option<PathBuf>, file_name: &str) -> PathBuf {
    explicit.unwrap_or_else(|| {
        config
            .output
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(file_name)
    })
}

/// `-` as an output path means stdout.
fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Strip directory components from a name carried inside an envelope.
fn safe_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "decrypted.bin".to_string())
}

async fn read_input(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn write_output(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

// ── Bundle and share loading ──────────────────────────────────────────────────

async fn load_bundle(session: &mut Session, path: &Path) -> Result<bool> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading bundle: {}", path.display()))?;
    let bundle = match ShareBundle::from_json(&json) {
        Ok(bundle) => bundle,
        Err(e) => {
            session.push(TerminalLine::error(format!("{}: {e}", e.kind())));
            return Ok(false);
        }
    };
    Ok(session.load_bundle(bundle))
}

/// Load the bundle, select the requested parties, and combine when possible.
async fn open_shares(session: &mut Session, shares: &ShareArgs) -> Result<()> {
    let Some(bundle) = &shares.bundle else {
        return Ok(());
    };
    if !load_bundle(session, bundle).await? {
        return Ok(());
    }
    for &id in &shares.select {
        session.select_party(id);
    }
    if !shares.select.is_empty() {
        session.combine_selected();
    }
    Ok(())
}

// ── `rektsafe keygen` ─────────────────────────────────────────────────────────

async fn cmd_keygen(
    session: &mut Session,
    config: &RektsafeConfig,
    parties: Option<u8>,
    threshold: Option<u8>,
    scheme: Option<&str>,
    out: Option<PathBuf>,
    stdout: &mut dyn Write,
) -> Result<()> {
    let total = parties.unwrap_or(config.keygen.total_parties);
    let threshold = threshold.unwrap_or(config.keygen.threshold);
    let scheme: ShareScheme = scheme
        .unwrap_or(config.keygen.scheme.as_str())
        .parse()
        .context("parsing share scheme")?;

    if session.generate_keys_with(total, threshold, scheme).is_none() {
        return Ok(());
    }
    let Some(json) = session.export_shares() else {
        return Ok(());
    };

    let destination = match out {
        Some(path) if is_stdout(&path) => {
            writeln!(stdout, "{json}").context("writing bundle to stdout")?;
            "stdout".to_string()
        }
        out => {
            let path = output_path(config, out, "rektsafe-shares.json");
            write_output(&path, json.as_bytes()).await?;
            path.display().to_string()
        }
    };
    session.push(TerminalLine::info(format!(
        "Wrote key-shares bundle to {destination}; distribute each share to its party"
    )));
    Ok(())
}

// ── `rektsafe encrypt` ────────────────────────────────────────────────────────

async fn cmd_encrypt(
    session: &mut Session,
    config: &RektsafeConfig,
    input: &Path,
    out: Option<PathBuf>,
    wrap: bool,
    shares: &ShareArgs,
) -> Result<()> {
    let data = read_input(input).await?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("no file name in {}", input.display()))?;

    let envelope = if wrap || config.envelope.wrap_key {
        open_shares(session, shares).await?;
        session.encrypt_file_wrapped(&file_name, &data)
    } else {
        session.encrypt_file(&file_name, &data)
    };
    let Some(envelope) = envelope else {
        return Ok(());
    };

    let json = serde_json::to_string_pretty(&envelope).context("serializing envelope")?;
    let path = output_path(
        config,
        out,
        &format!("{file_name}.{}", config.envelope.extension),
    );
    write_output(&path, json.as_bytes()).await?;
    session.push(TerminalLine::info(format!("Wrote envelope to {}", path.display())));
    Ok(())
}

// ── `rektsafe decrypt` ────────────────────────────────────────────────────────

async fn cmd_decrypt(
    session: &mut Session,
    config: &RektsafeConfig,
    input: &Path,
    out: Option<PathBuf>,
    shares: &ShareArgs,
) -> Result<()> {
    open_shares(session, shares).await?;

    let json = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading envelope: {}", input.display()))?;
    if !session.load_envelope(&json) {
        return Ok(());
    }
    let Some((file_name, plaintext)) = session.decrypt_envelope() else {
        return Ok(());
    };

    let path = output_path(config, out, &safe_file_name(&file_name));
    write_output(&path, &plaintext).await?;
    session.push(TerminalLine::info(format!("Wrote plaintext to {}", path.display())));
    Ok(())
}

// ── `rektsafe gate` ───────────────────────────────────────────────────────────

async fn cmd_gate(session: &mut Session, shares: &ShareArgs) -> Result<()> {
    let bundle = shares
        .bundle
        .as_deref()
        .context("gate needs --bundle")?;
    if !load_bundle(session, bundle).await? {
        return Ok(());
    }
    for &id in &shares.select {
        session.select_party(id);
    }
    let state = session.gate_state();
    session.push(TerminalLine::info(format!(
        "Gate {state:?}: parties {:?} selected",
        session.selected_parties()
    )));
    if state == rektsafe_crypto::GateState::Unlocked {
        session.combine_selected();
    }
    Ok(())
}

// ── `rektsafe config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &RektsafeConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
