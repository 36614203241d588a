//! Shared admin-dashboard state, held in one explicit store.
//!
//! The store is created once at startup and handed around by clone. Readers
//! subscribe to a `watch` channel; sign-out swaps in a fresh default state.

use chrono::{DateTime, Utc};
use db::models::{booking::BookingFilter, customer::CustomerFilter};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSession {
    pub admin_email: String,
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    pub session: Option<AdminSession>,
    pub customer_filter: CustomerFilter,
    pub booking_filter: BookingFilter,
}

#[derive(Clone)]
pub struct AppStore {
    tx: watch::Sender<AppState>,
}

impl Default for AppStore {
    fn default() -> Self {
        Self::init(AppState::default())
    }
}

impl AppStore {
    pub fn init(initial: AppState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn current(&self) -> AppState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }

    /// Apply `f` and notify subscribers only if the state actually changed.
    pub fn update(&self, f: impl FnOnce(&mut AppState)) -> bool {
        self.tx.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        })
    }

    pub fn sign_in(&self, admin_email: impl Into<String>) {
        let admin_email = admin_email.into();
        info!(admin_email = %admin_email, "Admin signed in");
        self.update(|state| {
            state.session = Some(AdminSession {
                admin_email,
                signed_in_at: Utc::now(),
            })
        });
    }

    /// Drop the session and every filter.
    pub fn sign_out(&self) {
        self.tx.send_replace(AppState::default());
        info!("Admin signed out");
    }

    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().session.is_some()
    }

    pub fn set_customer_filter(&self, filter: CustomerFilter) -> bool {
        self.update(|state| state.customer_filter = filter)
    }

    pub fn set_booking_filter(&self, filter: BookingFilter) -> bool {
        self.update(|state| state.booking_filter = filter)
    }
}
