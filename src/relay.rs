//! Bootstrap and poll orchestration.
//!
//! ```text
//! Bootstrapping --backlog done--> Polling --cancel--> ShuttingDown --> Stopped
//!       |                                                              ^
//!       +-------------------------cancel-------------------------------+
//! ```
//!
//! Bootstrapping drains the backlog once; any fetch or store failure there
//! is fatal. Polling repeats fetch, reconcile, dispatch and sleep until
//! cancelled; a failed iteration is logged and the next one starts from
//! scratch. Store failures are fatal in both phases.

use crate::changelog::parse_changelog;
use crate::config::RelayConfig;
use crate::dispatch::{DispatchReport, Dispatcher, MessageFormatter};
use crate::error::Result;
use crate::reconcile::reconcile;
use crate::shutdown::Shutdown;
use crate::store::DeliveryStore;
use crate::transport::{ChangelogSource, MessageSink};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Lifecycle of a [`Relay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Not started.
    Idle,
    /// Draining the startup backlog.
    Bootstrapping,
    /// Waiting for and handling changelog updates.
    Polling,
    /// Cancellation observed; winding down.
    ShuttingDown,
    /// Finished.
    Stopped,
}

/// Counters across the relay's lifetime.
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Completed poll iterations, successful or not.
    pub cycles: u64,
    /// Poll iterations that ended in an error.
    pub failed_cycles: u64,
    /// Messages delivered, backlog included.
    pub delivered: u64,
    /// Last poll error.
    pub last_error: Option<String>,
}

/// Ties the changelog source, delivery store and dispatcher together.
pub struct Relay<C, S> {
    changelog_url: String,
    poll_interval: Duration,
    source: C,
    store: DeliveryStore,
    dispatcher: Dispatcher<S>,
    shutdown: Shutdown,
    state: RwLock<RelayState>,
    stats: RwLock<RelayStats>,
}

impl<C: ChangelogSource, S: MessageSink> Relay<C, S> {
    pub fn new(
        config: &RelayConfig,
        source: C,
        sink: S,
        store: DeliveryStore,
        shutdown: Shutdown,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            sink,
            config.destination(),
            MessageFormatter::new(config.product_name.clone()),
            config.dispatch.clone(),
            shutdown.clone(),
        );

        Self {
            changelog_url: config.changelog_url.clone(),
            poll_interval: config.poll_interval,
            source,
            store,
            dispatcher,
            shutdown,
            state: RwLock::new(RelayState::Idle),
            stats: RwLock::new(RelayStats::default()),
        }
    }

    pub fn state(&self) -> RelayState {
        *self.state.read()
    }

    pub fn stats(&self) -> RelayStats {
        self.stats.read().clone()
    }

    pub fn store(&self) -> &DeliveryStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    fn set_state(&self, state: RelayState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Relay state change");
        }
    }

    /// Run until cancelled: probe, drain the backlog, then poll.
    ///
    /// Returns an error only for backlog or store failures.
    pub fn run(&self) -> Result<()> {
        self.probe_destination();

        if let Err(e) = self.run_backlog() {
            error!(error = %e, "Startup backlog failed");
            self.set_state(RelayState::Stopped);
            return Err(e);
        }

        if self.shutdown.is_cancelled() {
            info!("Shutdown requested during backlog processing");
            self.set_state(RelayState::Stopped);
            return Ok(());
        }
        info!("Backlog processing completed");

        let result = self.poll_loop();
        self.set_state(RelayState::Stopped);
        result
    }

    /// Check that the destination is reachable. Never fatal.
    pub fn probe_destination(&self) {
        let destination = self.dispatcher.destination();
        match self.dispatcher.sink().probe(destination) {
            Ok(()) => debug!(chat = %destination, "Destination probe succeeded"),
            Err(e) => warn!(chat = %destination, error = %e, "Could not verify destination access"),
        }
    }

    /// Fetch once and deliver everything never delivered, oldest first.
    pub fn run_backlog(&self) -> Result<DispatchReport> {
        self.set_state(RelayState::Bootstrapping);
        info!("Processing backlog");

        let document = self.source.fetch_text(&self.changelog_url)?;
        let changelog = parse_changelog(&document);
        info!(entries = changelog.len(), "Parsed changelog");

        let reconciliation = reconcile(&changelog, &self.store)?;
        info!(
            already_known = reconciliation.parsed - reconciliation.new_versions.len(),
            pending = reconciliation.pending.len(),
            "Backlog reconciled"
        );

        let report = self.dispatcher.deliver(&reconciliation.pending, &self.store)?;
        self.stats.write().delivered += report.delivered.len() as u64;
        Ok(report)
    }

    /// One poll iteration: fetch, reconcile, deliver.
    pub fn poll_once(&self) -> Result<DispatchReport> {
        debug!("Polling for updates");

        let document = self.source.fetch_text(&self.changelog_url)?;
        let changelog = parse_changelog(&document);
        if changelog.is_empty() {
            warn!("No entries found in changelog");
            return Ok(DispatchReport::default());
        }

        let reconciliation = reconcile(&changelog, &self.store)?;
        if reconciliation.new_versions.is_empty() {
            debug!("No new versions found");
        } else {
            info!(
                count = reconciliation.new_versions.len(),
                versions = ?reconciliation.new_versions,
                "Found new versions"
            );
        }

        let report = self.dispatcher.deliver(&reconciliation.pending, &self.store)?;
        self.stats.write().delivered += report.delivered.len() as u64;
        Ok(report)
    }

    /// Poll every interval until cancelled.
    ///
    /// Iteration failures are logged and retried next interval, except
    /// store failures, which end the loop with an error.
    pub fn poll_loop(&self) -> Result<()> {
        self.set_state(RelayState::Polling);
        info!(interval_secs = self.poll_interval.as_secs(), "Starting polling loop");

        while !self.shutdown.is_cancelled() {
            let outcome = self.poll_once();

            {
                let mut stats = self.stats.write();
                stats.cycles += 1;
                if let Err(e) = &outcome {
                    stats.failed_cycles += 1;
                    stats.last_error = Some(e.to_string());
                }
            }

            match outcome {
                Ok(_) => {}
                Err(e) if e.is_store_error() => {
                    error!(error = %e, "Delivery store failure, stopping");
                    return Err(e);
                }
                Err(e) => error!(error = %e, "Error in polling loop"),
            }

            debug!(secs = self.poll_interval.as_secs(), "Sleeping until next poll");
            if !self.shutdown.sleep(self.poll_interval) {
                break;
            }
        }

        self.set_state(RelayState::ShuttingDown);
        info!("Polling loop stopped due to shutdown signal");
        Ok(())
    }
}
