//! Sync CLI commands

use std::time::Duration;

use clap::Subcommand;

use super::report_ignored;
use crate::config::SettingName;
use crate::display::format_sync_status;
use crate::error::TallyResult;
use crate::ledger::Ledger;

/// Sync subcommands
#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show or set the sync token (the remote replica's address)
    Token {
        /// New token; an empty string turns sync off
        token: Option<String>,
    },

    /// Show replication status
    Status,

    /// Replicate until both collections finished their first sync
    Run {
        /// Seconds to wait before giving up
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },
}

/// Handle a sync command
pub fn handle_sync_command(ledger: &Ledger, cmd: SyncCommands) -> TallyResult<()> {
    match cmd {
        SyncCommands::Token { token: None } => {
            let token = ledger.get_setting(SettingName::SyncToken)?;
            if token.is_empty() {
                println!("No sync token set.");
            } else {
                println!("{}", token);
            }
        }

        SyncCommands::Token { token: Some(token) } => {
            let token = token.trim();
            if report_ignored(ledger.save_setting(SettingName::SyncToken, token)?, "settings change")
                .is_some()
            {
                if token.is_empty() {
                    println!("Sync turned off.");
                } else {
                    println!("Sync token set to {}", token);
                }
            }
        }

        SyncCommands::Status => {
            print!("{}", format_sync_status(&ledger.sync_status()?));
        }

        SyncCommands::Run { timeout } => {
            let done = ledger.wait_for_first_sync(Duration::from_secs(timeout))?;
            print!("{}", format_sync_status(&ledger.sync_status()?));
            if !done {
                println!("\nSync did not finish within {} seconds.", timeout);
            }
        }
    }

    Ok(())
}
