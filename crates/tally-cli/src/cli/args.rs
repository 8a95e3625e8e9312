use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version,
    about = "Signed entitlement manifests: export, verify, and import reconciliation"
)]
pub struct Cli {
    /// YAML config file; TALLY_* environment variables override it
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Export a full signed manifest for a consumer
    Export(ExportArgs),
    /// Re-export entitlement certificates only
    Certs(CertsArgs),
    /// Check a manifest's signature
    Verify(VerifyArgs),
    /// Match incoming upstream subscriptions against existing ones
    Reconcile(ReconcileArgs),
}

/// Which entitlements may leave the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum RulesArg {
    /// Everything except entitlements from derived pools
    #[default]
    SkipDerived,
    /// Every entitlement
    All,
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Consumer snapshot (JSON)
    #[arg(long)]
    pub snapshot: PathBuf,

    /// RSA private key (PEM); defaults to signing_key_path from config
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// Directory to copy the signed manifest into
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// CDN label recorded in meta.json
    #[arg(long)]
    pub cdn_label: Option<String>,

    /// Web URL prefix, overrides config
    #[arg(long)]
    pub web_url: Option<String>,

    /// API URL prefix, overrides config
    #[arg(long)]
    pub api_url: Option<String>,

    /// Principal recorded in meta.json
    #[arg(long, default_value = "tally-cli")]
    pub principal: String,

    #[arg(long, value_enum, default_value_t = RulesArg::SkipDerived)]
    pub rules: RulesArg,
}

#[derive(Args, Debug, Clone)]
pub struct CertsArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Certificate serial to include (repeatable); all when omitted
    #[arg(long = "serial", value_name = "N")]
    pub serials: Vec<u64>,

    #[arg(long, default_value = "tally-cli")]
    pub principal: String,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// RSA public key (PEM)
    #[arg(long)]
    pub key: PathBuf,

    /// Signed manifest archive
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ReconcileArgs {
    /// Existing subscription records (JSON array)
    #[arg(long)]
    pub existing: PathBuf,

    /// Incoming subscription records (JSON array)
    #[arg(long)]
    pub incoming: PathBuf,
}
