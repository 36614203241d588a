mod cli;
mod commands;
mod render;

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use db::models::{
    booking::{BookingFilter, CreateBooking, UpdateBooking},
    customer::{CreateCustomer, CustomerFilter, UpdateCustomer},
};
use deployment::{Deployment, ServerConfig};
use dialoguer::Confirm;
use local_deployment::LocalDeployment;
use serde::Serialize;
use services::services::{
    admin_lists::AdminLists,
    list::{ListConfig, ListInstance, Mutation, RowSource, Viewport},
};
use utils::logging::init_tracing;

use crate::{
    cli::{BookingCommand, Cli, Command, CustomerCommand, WindowArgs},
    commands::{browse, load_row, mutate, seed, spinner},
    render::TableRow,
};

fn load_list_config(path: Option<&Path>, page_size: Option<usize>) -> anyhow::Result<ListConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("invalid list config {}", path.display()))?
        }
        None => ListConfig::default(),
    };
    if let Some(page_size) = page_size {
        config.page_size = page_size;
    }
    config.validate()?;
    Ok(config)
}

async fn show<S>(
    list: &ListInstance<S>,
    filter: S::Filter,
    window: WindowArgs,
    as_json: bool,
) -> anyhow::Result<()>
where
    S: RowSource,
    S::Row: TableRow + Serialize,
{
    list.set_filter(filter).await?;
    let window = browse(list, Viewport::new(window.offset, window.rows)).await?;
    if as_json {
        println!("{}", render::json(&window)?);
    } else {
        println!("{}", render::table(&window));
    }
    Ok(())
}

fn confirm(prompt: String, yes: bool) -> anyhow::Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

fn print_saved<R: TableRow>(row: Option<R>) {
    match row {
        Some(row) => println!("Saved\n  {}\n  {}", R::header(), row.line()),
        None => println!("Saved"),
    }
}

async fn run_customers(lists: &AdminLists, command: CustomerCommand, as_json: bool) -> anyhow::Result<()> {
    let customers = lists.customers.as_ref();
    match command {
        CustomerCommand::List { search, window } => {
            show(customers, CustomerFilter { search }, window, as_json).await
        }
        CustomerCommand::Add {
            name,
            email,
            phone,
            notes,
        } => {
            let payload = CreateCustomer {
                name,
                email,
                phone,
                notes,
            };
            print_saved(mutate(customers, Mutation::Create { payload }, &spinner()).await?);
            Ok(())
        }
        CustomerCommand::Update {
            id,
            name,
            email,
            phone,
            notes,
        } => {
            load_row(customers, &id).await?;
            let payload = UpdateCustomer {
                name,
                email,
                phone,
                notes,
            };
            print_saved(mutate(customers, Mutation::Update { id, payload }, &spinner()).await?);
            Ok(())
        }
        CustomerCommand::Delete { id, yes } => {
            let customer = load_row(customers, &id).await?;
            if !confirm(format!("Delete customer {}?", customer.name), yes)? {
                return Ok(());
            }
            mutate(customers, Mutation::Delete { id }, &spinner()).await?;
            println!("Deleted {}", customer.name);
            Ok(())
        }
    }
}

async fn run_bookings(lists: &AdminLists, command: BookingCommand, as_json: bool) -> anyhow::Result<()> {
    let bookings = lists.bookings.as_ref();
    match command {
        BookingCommand::List {
            search,
            status,
            window,
        } => show(bookings, BookingFilter { search, status }, window, as_json).await,
        BookingCommand::Add {
            client_name,
            email,
            service,
            placement,
            customer_id,
            deposit_cents,
        } => {
            let payload = CreateBooking {
                customer_id,
                client_name,
                email,
                service,
                placement,
                scheduled_at: None,
                deposit_cents,
                notes: None,
            };
            print_saved(mutate(bookings, Mutation::Create { payload }, &spinner()).await?);
            Ok(())
        }
        BookingCommand::Status { id, status } => {
            load_row(bookings, &id).await?;
            let payload = UpdateBooking {
                status: Some(status),
                ..Default::default()
            };
            print_saved(mutate(bookings, Mutation::Update { id, payload }, &spinner()).await?);
            Ok(())
        }
        BookingCommand::Delete { id, yes } => {
            let booking = load_row(bookings, &id).await?;
            if !confirm(
                format!("Delete the {} booking for {}?", booking.service, booking.client_name),
                yes,
            )? {
                return Ok(());
            }
            mutate(bookings, Mutation::Delete { id }, &spinner()).await?;
            println!("Deleted booking {id}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("warn");
    let cli = Cli::parse();

    let config = ServerConfig {
        database_url: cli.database_url.clone(),
        list: load_list_config(cli.list_config.as_deref(), cli.page_size)?,
        ..ServerConfig::default()
    };
    let deployment = if cli.ephemeral {
        LocalDeployment::ephemeral(config).await?
    } else {
        LocalDeployment::new(config).await?
    };

    if cli.seed > 0 {
        seed(deployment.db(), cli.seed).await?;
    }

    let lists = deployment.admin_lists()?;
    let result = match cli.command {
        Command::Customers(command) => run_customers(&lists, command, cli.json).await,
        Command::Bookings(command) => run_bookings(&lists, command, cli.json).await,
    };

    for notification in deployment.notifications().recent().await {
        eprintln!("{}: {}", notification.title, notification.message);
    }
    result
}
