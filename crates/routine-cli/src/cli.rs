use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use routine_core::rules::Preset;
use std::path::PathBuf;

/// Generate a year-long routine workbook and keep it backed up
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to ./routine.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Generate the yearly workbook with one view per period
    Generate(GenerateCommand),
    /// Show the occurrences of a date range without writing anything
    Preview(PreviewCommand),
    /// Back up the workbook right now
    Backup(BackupCommand),
    /// Run the daily backup scheduler until interrupted
    Watch(WatchCommand),
    /// List the built-in presets
    Presets,
}

/// How occurrences are split into period views
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartitionArg {
    /// One view per month ("January" .. "December")
    #[default]
    Month,
    /// One view per ISO week ("2025-W01")
    Week,
}

#[derive(Parser, Debug, Clone)]
pub struct GenerateCommand {
    /// Rule preset (task-manager, general-routine)
    #[arg(short, long)]
    pub preset: Option<Preset>,
    /// Year to generate
    #[arg(short, long)]
    pub year: Option<i32>,
    /// Output file (defaults to <output_dir>/<preset stem><year>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Period views to create next to the master view
    #[arg(long, value_enum, default_value_t = PartitionArg::Month)]
    pub partition: PartitionArg,
    /// Reject writes to a view once it holds this many rows
    #[arg(long)]
    pub row_limit: Option<usize>,
    /// Record rejected occurrences and keep going instead of aborting
    #[arg(long)]
    pub continue_on_error: bool,
    /// Check every period view against the master view before saving
    #[arg(long)]
    pub verify: bool,
    /// Overwrite an existing workbook without asking
    #[arg(short, long)]
    pub force: bool,
    /// Back up the workbook right after saving it
    #[arg(long)]
    pub backup: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct PreviewCommand {
    /// Rule preset (task-manager, general-routine)
    #[arg(short, long)]
    pub preset: Option<Preset>,
    /// First day to show (e.g. 'today', 'next monday', '2025-03-01')
    #[arg(long, conflicts_with = "month")]
    pub from: Option<String>,
    /// Number of days to show
    #[arg(long, default_value_t = 7, conflicts_with = "month")]
    pub days: u32,
    /// Show a whole month (1-12) of --year instead
    #[arg(long)]
    pub month: Option<u32>,
    /// Year used with --month
    #[arg(short, long)]
    pub year: Option<i32>,
}

#[derive(Parser, Debug, Clone)]
pub struct BackupCommand {
    /// Rule preset whose workbook to back up
    #[arg(short, long)]
    pub preset: Option<Preset>,
    /// Year of the workbook to back up
    #[arg(short, long)]
    pub year: Option<i32>,
    /// Workbook file (overrides --preset and --year)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct WatchCommand {
    /// Rule preset whose workbook to back up
    #[arg(short, long)]
    pub preset: Option<Preset>,
    /// Year of the workbook to back up
    #[arg(short, long)]
    pub year: Option<i32>,
    /// Workbook file (overrides --preset and --year)
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    /// Daily backup time, HH:MM
    #[arg(long)]
    pub at: Option<String>,
    /// Timezone of the backup time (IANA format, e.g. 'Europe/Istanbul')
    #[arg(long)]
    pub timezone: Option<String>,
    /// Generate the workbook first if it does not exist yet
    #[arg(long)]
    pub generate: bool,
}
