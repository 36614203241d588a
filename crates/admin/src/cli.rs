use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use db::models::booking::BookingStatus;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "studio-admin", about = "Browse and edit studio customers and bookings")]
pub struct Cli {
    /// SQLite database to open
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://studio.db")]
    pub database_url: String,

    /// Use a throwaway in-memory database instead of `--database-url`
    #[arg(long)]
    pub ephemeral: bool,

    /// Insert this many demo customers (each with a booking) before running the command
    #[arg(long, default_value_t = 0)]
    pub seed: usize,

    /// TOML file with list settings (page_size, overscan, mutation_timeout_ms, ...)
    #[arg(long, env = "STUDIO_LIST_CONFIG")]
    pub list_config: Option<PathBuf>,

    /// Rows per fetched page; overrides the list config file
    #[arg(long, env = "LIST_PAGE_SIZE")]
    pub page_size: Option<usize>,

    /// Print rows as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Customer records
    #[command(subcommand)]
    Customers(CustomerCommand),
    /// Booking requests and appointments
    #[command(subcommand)]
    Bookings(BookingCommand),
}

/// Which slice of the list to show
#[derive(Debug, Clone, Copy, Args)]
pub struct WindowArgs {
    /// Index of the first row shown
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Number of rows shown
    #[arg(long, default_value_t = 20)]
    pub rows: usize,
}

#[derive(Debug, Subcommand)]
pub enum CustomerCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Delete {
        id: Uuid,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum BookingCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<BookingStatus>,
        #[command(flatten)]
        window: WindowArgs,
    },
    Add {
        #[arg(long)]
        client_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        service: String,
        #[arg(long)]
        placement: Option<String>,
        #[arg(long)]
        customer_id: Option<Uuid>,
        #[arg(long)]
        deposit_cents: Option<i64>,
    },
    /// Move a booking to another status
    Status { id: Uuid, status: BookingStatus },
    Delete {
        id: Uuid,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_booking_status_parses_lowercase() {
        let cli = Cli::try_parse_from([
            "studio-admin",
            "--ephemeral",
            "bookings",
            "list",
            "--status",
            "confirmed",
            "--rows",
            "5",
        ])
        .unwrap();
        match cli.command {
            Command::Bookings(BookingCommand::List { status, window, .. }) => {
                assert_eq!(status, Some(BookingStatus::Confirmed));
                assert_eq!(window.rows, 5);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
