//! Periodic `list-updates` scheduling and the per-ecosystem counts behind the
//! tab badges.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::OpError;
use crate::model::{Ecosystem, OperationRequest, Outcome};
use crate::panel::PanelController;

/// A running check occupies its panel (`PanelState::CheckingUpdates`), so
/// checks never overlap each other or a user operation on the same tool.
#[derive(Debug, Default)]
pub struct UpdateChecker {
    interval: Option<Duration>,
    counts: HashMap<Ecosystem, usize>,
    initial_checked: HashSet<Ecosystem>,
    stale: HashSet<Ecosystem>,
}

impl UpdateChecker {
    /// `None` disables the periodic check; startup checks still run.
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// One timer tick: a check for every idle panel. Busy panels are skipped
    /// until the next tick.
    pub fn poll<'a>(&mut self, panels: impl IntoIterator<Item = &'a mut PanelController>) -> Vec<OperationRequest> {
        panels.into_iter().filter_map(|panel| self.check(panel)).collect()
    }

    /// Marks an ecosystem's count as outdated after an install, remove or
    /// update.
    pub fn mark_stale(&mut self, ecosystem: Ecosystem) {
        self.stale.insert(ecosystem);
    }

    /// The check that follows a refresh: the panel's first successful one,
    /// or the one after a change made the count stale.
    pub fn poll_panel(&mut self, panel: &mut PanelController) -> Option<OperationRequest> {
        let ecosystem = panel.ecosystem();
        if !panel.has_loaded() {
            return None;
        }
        let first = self.initial_checked.insert(ecosystem);
        let stale = self.stale.remove(&ecosystem);
        if !(first || stale) {
            return None;
        }
        self.check(panel)
    }

    fn check(&mut self, panel: &mut PanelController) -> Option<OperationRequest> {
        match panel.check_updates() {
            Ok(request) => Some(request),
            Err(busy) => {
                tracing::debug!(ecosystem = %busy.ecosystem, running = %busy.running, "update check skipped: panel busy");
                None
            }
        }
    }

    /// Releases the panel. A failed check keeps the previous count.
    pub fn record(&mut self, panel: &mut PanelController, result: Result<Outcome, OpError>) {
        panel.finish_update_check();
        let ecosystem = panel.ecosystem();
        match result {
            Ok(Outcome::Records(records)) => {
                tracing::info!(%ecosystem, count = records.len(), "update check finished");
                self.counts.insert(ecosystem, records.len());
            }
            Ok(other) => tracing::warn!(%ecosystem, ?other, "unexpected update check outcome"),
            Err(e) => tracing::warn!(%ecosystem, error = %e, "update check failed"),
        }
    }

    pub fn count(&self, ecosystem: Ecosystem) -> usize {
        self.counts.get(&ecosystem).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}
