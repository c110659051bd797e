//! Library module for dbexport
//!
//! Argument parsing, capability selection and report output live here so
//! they can be tested; `main.rs` only wires them together.

pub mod output;

use clap::{Args, Parser, ValueEnum};
use dbexport_core::error::ExportError;
use dbexport_core::security::{DEFAULT_CATEGORY, Decryptor, PrefixDecryptor};
use dbexport_core::Result;
use std::path::PathBuf;
use std::sync::Arc;
use zeroize::Zeroizing;

/// CLI argument structure
#[derive(Parser)]
#[command(name = "dbexport")]
#[command(about = "Export database tables to delimited files, decrypting encrypted columns")]
#[command(version)]
#[command(long_about = "
dbexport - Decrypting table exporter

Runs every table export listed in a JSON job file. Each table's query result
is written to its output file as comma-joined lines under a header row.
Columns whose first value decrypts are treated as encrypted and decrypted for
every later row; values that fail to decrypt are written unchanged and
reported.

SECURITY FEATURES:
- Source databases are only queried, never modified
- Passwords are read from the environment or a hidden prompt, never logged
- Connection strings are redacted in logs and reports

SUPPORTED DATABASES:
- PostgreSQL (postgres://)
- SQLite (sqlite:// or .db/.sqlite files)
- SQL Server (mssql:// or Server=...;Database=... strings)

EXAMPLES:
  dbexport export.json
  DBEXPORT_PASSWORD_PII=... dbexport export.json --report report.json
  dbexport --capability prefix --prefix ENC: export.json
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Export job configuration file
    #[arg(value_name = "CONFIG", help = "JSON export job configuration")]
    pub config: PathBuf,

    #[command(flatten)]
    pub capability: CapabilityArgs,

    /// Write the full job report as JSON
    #[arg(long, value_name = "FILE", help = "Write the job report as JSON to this file")]
    pub report: Option<PathBuf>,

    /// Cell errors listed per table in the summary
    #[arg(
        long,
        default_value_t = 10,
        help = "Maximum decryption errors listed per table"
    )]
    pub max_errors: usize,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, help = "Suppress all output except errors")]
    pub quiet: bool,
}

/// Decrypt capability selection
#[derive(Args, Debug, Clone)]
pub struct CapabilityArgs {
    /// Capability used to decrypt values
    #[arg(
        long,
        value_enum,
        default_value_t = CapabilityKind::Aes,
        env = "DBEXPORT_CAPABILITY",
        help = "Decrypt capability"
    )]
    pub capability: CapabilityKind,

    /// Password category
    #[arg(
        long,
        default_value = DEFAULT_CATEGORY,
        help = "Password category looked up for the aes capability"
    )]
    pub category: String,

    /// Marker for the prefix capability
    #[arg(
        long,
        default_value = PrefixDecryptor::DEFAULT_PREFIX,
        help = "Marker stripped by the prefix capability"
    )]
    pub prefix: String,
}

/// Available decrypt capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CapabilityKind {
    /// AES-256-GCM cells keyed by a category password
    Aes,
    /// Values marked with a textual prefix
    Prefix,
}

/// Builds the decrypt capability selected on the command line.
///
/// For `aes` the password comes from `DBEXPORT_PASSWORD_<CATEGORY>`, or from
/// a hidden prompt when that variable is unset.
///
/// # Errors
/// Returns a configuration error if no usable password is available.
pub fn build_decryptor(args: &CapabilityArgs) -> Result<Arc<dyn Decryptor>> {
    build_decryptor_with(args, prompt_password)
}

/// [`build_decryptor`] with an injectable password prompt.
///
/// # Errors
/// Returns a configuration error if the prompt fails or yields an empty
/// password.
pub fn build_decryptor_with<P>(args: &CapabilityArgs, prompt: P) -> Result<Arc<dyn Decryptor>>
where
    P: FnOnce(&str) -> Result<Zeroizing<String>>,
{
    match args.capability {
        CapabilityKind::Prefix => {
            if args.prefix.is_empty() {
                return Err(ExportError::configuration("Prefix cannot be empty"));
            }
            Ok(Arc::new(PrefixDecryptor::new(args.prefix.clone())))
        }
        CapabilityKind::Aes => aes_decryptor(&args.category, prompt),
    }
}

#[cfg(feature = "encryption")]
fn aes_decryptor<P>(category: &str, prompt: P) -> Result<Arc<dyn Decryptor>>
where
    P: FnOnce(&str) -> Result<Zeroizing<String>>,
{
    use dbexport_core::security::{
        CapabilityProvider, EnvPasswordStore, FieldDecryptor, PasswordCapabilityProvider,
    };

    let provider = PasswordCapabilityProvider::new(EnvPasswordStore::default());
    if let Ok(capability) = provider.capability(category) {
        tracing::debug!("Using password for category '{}' from environment", category);
        return Ok(capability);
    }

    let password = prompt(category)?;
    if password.is_empty() {
        return Err(ExportError::configuration("Password cannot be empty"));
    }

    Ok(Arc::new(FieldDecryptor::new(password)))
}

#[cfg(not(feature = "encryption"))]
fn aes_decryptor<P>(_category: &str, _prompt: P) -> Result<Arc<dyn Decryptor>>
where
    P: FnOnce(&str) -> Result<Zeroizing<String>>,
{
    Err(ExportError::configuration(
        "AES decryption not available. Compile with --features encryption",
    ))
}

/// Reads a password from the terminal without echo.
fn prompt_password(category: &str) -> Result<Zeroizing<String>> {
    use std::io::{self, Write};

    print!("Enter password for category '{}': ", category);
    io::stdout().flush().map_err(|e| {
        ExportError::configuration(format!(
            "Failed to flush stdout before reading password: {}",
            e
        ))
    })?;

    rpassword::read_password()
        .map(Zeroizing::new)
        .map_err(|e| ExportError::configuration(format!("Failed to read password: {}", e)))
}
