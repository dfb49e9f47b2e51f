use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tally::cli::{
    handle_budget_command, handle_currency_command, handle_expense_command, handle_export_command,
    handle_import_command, handle_month_command, handle_reset_command, handle_sync_command,
    BudgetCommands, ExpenseCommands, SyncCommands,
};
use tally::config::{SettingName, TallyPaths};
use tally::display::DEFAULT_CURRENCY;
use tally::{ExpenseFilter, Ledger};

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Monthly budgets and expenses, synced between devices",
    long_about = "Tally keeps monthly budgets and the expenses spent against them. \
                  Budgets roll forward into new months, and everything can replicate \
                  to a remote copy named by the sync token."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base directory for settings and data
    #[arg(long, global = true, env = "TALLY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a month's budgets and expenses
    Month {
        /// Month (YYYY-MM); defaults to the current month
        month: Option<String>,

        /// Only list expenses in this budget (repeatable)
        #[arg(short, long = "budget")]
        budgets: Vec<String>,

        /// Only list expenses whose description contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Budget management commands
    #[command(subcommand)]
    Budget(BudgetCommands),

    /// Expense management commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Export all data as JSON
    Export {
        /// Output file; prints to stdout when omitted
        file: Option<PathBuf>,
    },

    /// Import a JSON export
    Import {
        /// File to import
        file: PathBuf,
        /// Delete all existing data first
        #[arg(long)]
        replace: bool,
    },

    /// Replication commands
    #[command(subcommand)]
    Sync(SyncCommands),

    /// Show or set the currency code
    Currency {
        /// ISO currency code, e.g. EUR
        code: Option<String>,
    },

    /// Delete all data, locally and on the sync remote
    Reset {
        /// Skip the confirmation notice
        #[arg(long)]
        yes: bool,
    },

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let paths = match cli.data_dir {
        Some(dir) => TallyPaths::with_base_dir(dir),
        None => TallyPaths::new()?,
    };
    let ledger = Ledger::open(&paths)?;

    match cli.command {
        Some(Commands::Month {
            month,
            budgets,
            search,
        }) => {
            let filter = ExpenseFilter {
                description: search,
                budgets: budgets.into_iter().collect(),
            };
            handle_month_command(&ledger, month, filter)?
        }
        Some(Commands::Budget(cmd)) => handle_budget_command(&ledger, cmd)?,
        Some(Commands::Expense(cmd)) => handle_expense_command(&ledger, cmd)?,
        Some(Commands::Export { file }) => handle_export_command(&ledger, file.as_deref())?,
        Some(Commands::Import { file, replace }) => {
            handle_import_command(&ledger, &file, replace)?
        }
        Some(Commands::Sync(cmd)) => handle_sync_command(&ledger, cmd)?,
        Some(Commands::Currency { code }) => handle_currency_command(&ledger, code)?,
        Some(Commands::Reset { yes }) => handle_reset_command(&ledger, yes)?,
        Some(Commands::Config) => {
            let token = ledger.get_setting(SettingName::SyncToken)?;
            println!("Tally Configuration");
            println!("===================");
            println!("Base directory:  {}", paths.base_dir().display());
            println!("Data directory:  {}", paths.data_dir().display());
            println!("Settings file:   {}", paths.settings_file().display());
            println!();
            println!("Settings:");
            let currency = ledger.get_setting(SettingName::Currency)?;
            println!(
                "  Currency:      {}",
                if currency.is_empty() { DEFAULT_CURRENCY } else { currency.as_str() }
            );
            println!(
                "  Sync token:    {}",
                if token.is_empty() { "(none)" } else { token.as_str() }
            );
        }
        None => {
            println!("Tally - monthly budgets and expenses");
            println!();
            println!("Run 'tally --help' for usage information.");
            println!("Run 'tally month' to see the current month.");
        }
    }

    Ok(())
}
