//! Command implementations, driven through the same list instances the dashboard uses.

use std::time::Duration;

use anyhow::{Context, bail};
use db::{
    DBService,
    models::{
        booking::{Booking, BookingStatus, CreateBooking},
        customer::{CreateCustomer, Customer},
    },
};
use indicatif::{ProgressBar, ProgressStyle};
use services::services::list::{
    ListInstance, MutationOutcome, RenderState, RowId, RowSource, SourceMutation, ViewRow,
    Viewport,
};
use tracing::debug;
use uuid::Uuid;

/// Rows of one viewport plus what the list knows beyond it
#[derive(Debug)]
pub struct Window<R> {
    pub rows: Vec<ViewRow<R>>,
    pub offset: usize,
    pub loaded: usize,
    pub has_more: bool,
    pub state: RenderState,
}

pub async fn browse<S: RowSource>(
    list: &ListInstance<S>,
    viewport: Viewport,
) -> anyhow::Result<Window<S::Row>> {
    list.ensure_viewport(viewport)
        .await
        .with_context(|| format!("failed to load {}", list.name()))?;

    let view = list.view();
    let range = viewport.visible_range();
    let end = range.end.min(view.len());
    let start = range.start.min(end);

    Ok(Window {
        rows: view.slice(start..end).to_vec(),
        offset: start,
        loaded: view.len(),
        has_more: view.has_more,
        state: list.render_state(),
    })
}

/// Page forward until `id` is loaded. Mutations only target loaded rows.
pub async fn load_row<S: RowSource>(
    list: &ListInstance<S>,
    id: &RowId<S>,
) -> anyhow::Result<S::Row> {
    loop {
        if let Some(row) = list.find(id) {
            return Ok(row);
        }
        let loaded = list.view().len();
        list.ensure_range(loaded..loaded + list.config().page_size)
            .await
            .with_context(|| format!("failed to load {}", list.name()))?;
        if list.view().len() == loaded {
            bail!("{} has no row {id}", list.name());
        }
    }
}

/// Dispatch `mutation`, show it as pending, and wait for the server.
///
/// Returns the confirmed row for creates and updates.
pub async fn mutate<S: RowSource>(
    list: &ListInstance<S>,
    mutation: SourceMutation<S>,
    progress: &ProgressBar,
) -> anyhow::Result<Option<S::Row>> {
    let kind = mutation.kind();
    let dispatched = list.dispatch(mutation).await?;
    progress.set_message(format!("Saving {kind} on {}...", list.name()));
    debug!(mutation_id = %dispatched.id(), "Waiting for confirmation");

    let settled = dispatched.settled().await;
    progress.finish_and_clear();

    match settled.outcome {
        MutationOutcome::Confirmed => Ok(settled.row_id.and_then(|id| list.find(&id))),
        MutationOutcome::RolledBack(err) => Err(err).context("change was reverted"),
        MutationOutcome::Stale => bail!("{} was reset before the change settled", list.name()),
    }
}

pub fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

const SERVICES: [&str; 4] = ["Fine line", "Blackwork", "Cover-up", "Flash"];

/// Insert `count` demo customers, each with one booking.
pub async fn seed(db: &DBService, count: usize) -> anyhow::Result<()> {
    for i in 0..count {
        let customer = Customer::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateCustomer {
                name: format!("Demo Client {i:03}"),
                email: format!("client{i:03}@example.com"),
                phone: None,
                notes: None,
            },
        )
        .await?;

        let booking = Booking::create(
            &db.pool,
            Uuid::new_v4(),
            &CreateBooking {
                customer_id: Some(customer.id),
                client_name: customer.name.clone(),
                email: customer.email.clone(),
                service: SERVICES[i % SERVICES.len()].to_string(),
                placement: None,
                scheduled_at: None,
                deposit_cents: Some(5_000),
                notes: None,
            },
        )
        .await?;
        if i % 3 == 0 {
            Booking::update_status(&db.pool, booking.id, BookingStatus::Confirmed).await?;
        }
    }
    Ok(())
}
