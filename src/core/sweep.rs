//! Periodic entitlement sweep.
//!
//! Once per interval (and once at startup) the sweep deactivates subscribers
//! whose payment is due today without a confirmed payment, and reminds
//! subscribers whose trial ends tomorrow. Every affected subscriber and every
//! admin get one notification per event; a failed delivery is logged and the
//! sweep moves on.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as DateDuration, NaiveDate};
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::core::config::sweep;
use crate::core::error::AppResult;
use crate::storage::db::DbPool;
use crate::storage::get_connection;
use crate::storage::ledger::{self, Subscriber};

/// A notification produced by the sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// To the subscriber: access ended, pay to continue
    SubscriptionExpired,
    /// To an admin: a subscriber was deactivated
    SubscriberDeactivated {
        user_id: i64,
        email: Option<String>,
        telegram: Option<String>,
    },
    /// To the subscriber: the trial ends on `trial_end`
    TrialEndingReminder { trial_end: NaiveDate },
    /// To an admin: a subscriber's trial ends on `trial_end`
    TrialEnding {
        user_id: i64,
        email: Option<String>,
        telegram: Option<String>,
        trial_end: NaiveDate,
    },
}

/// Delivers sweep notices. Implemented over the Bot API in the Telegram layer.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, chat_id: i64, notice: &Notice) -> AppResult<()>;
}

/// What a single sweep pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deactivated: Vec<i64>,
    pub reminded: Vec<i64>,
    pub failed_deliveries: usize,
}

/// Runs one sweep pass for `today`.
///
/// Fails only when the ledger cannot be read; per-subscriber failures are
/// logged and counted in the report.
pub async fn run_sweep(
    db_pool: &DbPool,
    notifier: &dyn Notifier,
    admin_ids: &[i64],
    today: NaiveDate,
) -> AppResult<SweepReport> {
    let tomorrow = today + DateDuration::days(1);
    let mut report = SweepReport::default();

    // The connection is released before any notification is awaited
    let (overdue, trials_ending) = {
        let conn = get_connection(db_pool)?;
        (
            ledger::get_unpaid_due_on(&conn, today)?,
            ledger::get_trials_ending_on(&conn, tomorrow)?,
        )
    };

    log::info!(
        "Sweep {}: {} overdue, {} trial(s) ending {}",
        today,
        overdue.len(),
        trials_ending.len(),
        tomorrow
    );

    for subscriber in &overdue {
        match deactivate(db_pool, subscriber.user_id) {
            Ok(true) => report.deactivated.push(subscriber.user_id),
            Ok(false) => {
                log::warn!("Subscriber {} disappeared before deactivation", subscriber.user_id);
                continue;
            }
            Err(e) => {
                log::error!("Failed to deactivate subscriber {}: {}", subscriber.user_id, e);
                continue;
            }
        }

        report.failed_deliveries += deliver(notifier, subscriber.user_id, &Notice::SubscriptionExpired).await;
        let admin_notice = Notice::SubscriberDeactivated {
            user_id: subscriber.user_id,
            email: subscriber.email.clone(),
            telegram: subscriber.telegram.clone(),
        };
        report.failed_deliveries += notify_admins(notifier, admin_ids, &admin_notice).await;
    }

    for subscriber in &trials_ending {
        report.failed_deliveries += deliver(
            notifier,
            subscriber.user_id,
            &Notice::TrialEndingReminder {
                trial_end: subscriber.trial_end,
            },
        )
        .await;
        report.failed_deliveries += notify_admins(notifier, admin_ids, &trial_ending_notice(subscriber)).await;
        report.reminded.push(subscriber.user_id);
    }

    log::info!(
        "Sweep {} finished: {} deactivated, {} reminded, {} failed deliveries",
        today,
        report.deactivated.len(),
        report.reminded.len(),
        report.failed_deliveries
    );
    Ok(report)
}

fn deactivate(db_pool: &DbPool, user_id: i64) -> AppResult<bool> {
    let conn = get_connection(db_pool)?;
    Ok(ledger::deactivate_subscriber(&conn, user_id)?)
}

fn trial_ending_notice(subscriber: &Subscriber) -> Notice {
    Notice::TrialEnding {
        user_id: subscriber.user_id,
        email: subscriber.email.clone(),
        telegram: subscriber.telegram.clone(),
        trial_end: subscriber.trial_end,
    }
}

/// Sends one notice; returns 1 on failure so callers can sum failures.
async fn deliver(notifier: &dyn Notifier, chat_id: i64, notice: &Notice) -> usize {
    match notifier.notify(chat_id, notice).await {
        Ok(()) => 0,
        Err(e) => {
            log::warn!("Failed to deliver {:?} to {}: {}", notice, chat_id, e);
            1
        }
    }
}

async fn notify_admins(notifier: &dyn Notifier, admin_ids: &[i64], notice: &Notice) -> usize {
    let mut failed = 0;
    for &admin_id in admin_ids {
        failed += deliver(notifier, admin_id, notice).await;
    }
    failed
}

/// Spawns the sweep loop. The first pass runs immediately.
pub fn spawn_sweep_task(
    db_pool: Arc<DbPool>,
    notifier: Arc<dyn Notifier>,
    admin_ids: Vec<i64>,
    interval_hours: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(sweep::interval(interval_hours));
        log::info!("Entitlement sweep started (interval: {}h)", interval_hours.max(1));

        loop {
            ticker.tick().await;

            let today = chrono::Local::now().date_naive();
            if let Err(e) = run_sweep(&db_pool, notifier.as_ref(), &admin_ids, today).await {
                log::error!("Entitlement sweep failed: {}", e);
            }
        }
    })
}
