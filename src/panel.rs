//! Per-ecosystem panel state: the installed list, search results, and which
//! request is currently running.

use std::collections::HashSet;
use std::fmt;

use crate::error::{OpError, PanelBusy};
use crate::model::{Action, Ecosystem, OperationRequest, Outcome, PackageRecord, SearchFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Idle,
    Refreshing,
    /// A background `list-updates` holds the ecosystem's tool.
    CheckingUpdates,
    OperationInFlight(Action),
}

/// Last thing the panel has to tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Cancelled,
    Error(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Success(message) | Notice::Error(message) => f.write_str(message),
            Notice::Cancelled => f.write_str("Operation cancelled"),
        }
    }
}

impl Notice {
    fn from_error(error: &OpError) -> Self {
        if error.is_cancellation() {
            Notice::Cancelled
        } else {
            Notice::Error(error.to_string())
        }
    }
}

#[derive(Debug)]
pub struct PanelController {
    ecosystem: Ecosystem,
    state: PanelState,
    records: Vec<PackageRecord>,
    search_results: Option<Vec<PackageRecord>>,
    searching: bool,
    details: Option<String>,
    notice: Option<Notice>,
    error: Option<String>,
    loaded: bool,
}

impl PanelController {
    pub fn new(ecosystem: Ecosystem) -> Self {
        Self {
            ecosystem,
            state: PanelState::Idle,
            records: Vec::new(),
            search_results: None,
            searching: false,
            details: None,
            notice: None,
            error: None,
            loaded: false,
        }
    }

    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state != PanelState::Idle
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Records from the most recent successful refresh.
    pub fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    pub fn search_results(&self) -> Option<&[PackageRecord]> {
        self.search_results.as_deref()
    }

    /// Search results when a search is showing, otherwise the installed list.
    pub fn visible_records(&self) -> &[PackageRecord] {
        self.search_results().unwrap_or(&self.records)
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Why the last refresh failed, if it did.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether at least one refresh has succeeded.
    pub fn has_loaded(&self) -> bool {
        self.loaded
    }

    pub fn clear_search(&mut self) {
        self.search_results = None;
    }

    pub fn clear_details(&mut self) {
        self.details = None;
    }

    /// Shows a rejection or other message that did not come from a request.
    pub fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    fn busy(&self) -> PanelBusy {
        let running = match self.state {
            PanelState::OperationInFlight(action) => action,
            PanelState::CheckingUpdates => Action::ListUpdates,
            _ => Action::List,
        };
        PanelBusy {
            ecosystem: self.ecosystem,
            running,
        }
    }

    fn ensure_idle(&self) -> Result<(), PanelBusy> {
        if self.is_busy() {
            Err(self.busy())
        } else {
            Ok(())
        }
    }

    pub fn refresh(&mut self) -> Result<OperationRequest, PanelBusy> {
        self.ensure_idle()?;
        self.state = PanelState::Refreshing;
        Ok(OperationRequest::list(self.ecosystem))
    }

    /// Claims the panel for an update check so no mutation can start on the
    /// same tool until [`finish_update_check`](Self::finish_update_check).
    pub fn check_updates(&mut self) -> Result<OperationRequest, PanelBusy> {
        self.ensure_idle()?;
        self.state = PanelState::CheckingUpdates;
        Ok(OperationRequest::list_updates(self.ecosystem))
    }

    pub fn finish_update_check(&mut self) {
        if self.state == PanelState::CheckingUpdates {
            self.state = PanelState::Idle;
        }
    }

    pub fn install(&mut self, target: &str) -> Result<OperationRequest, PanelBusy> {
        self.begin(Action::Install, target)
    }

    pub fn remove(&mut self, target: &str) -> Result<OperationRequest, PanelBusy> {
        self.begin(Action::Remove, target)
    }

    /// An empty target updates everything.
    pub fn update(&mut self, target: &str) -> Result<OperationRequest, PanelBusy> {
        self.begin(Action::Update, target)
    }

    pub fn info(&mut self, target: &str) -> Result<OperationRequest, PanelBusy> {
        self.begin(Action::Info, target)
    }

    fn begin(&mut self, action: Action, target: &str) -> Result<OperationRequest, PanelBusy> {
        self.ensure_idle()?;
        self.state = PanelState::OperationInFlight(action);
        tracing::debug!(ecosystem = %self.ecosystem, %action, target, "operation started");
        Ok(OperationRequest::new(self.ecosystem, action, target.trim()))
    }

    /// Searches run beside other work but one at a time.
    pub fn search(&mut self, query: &str, filter: SearchFilter) -> Result<OperationRequest, PanelBusy> {
        if self.searching {
            return Err(PanelBusy {
                ecosystem: self.ecosystem,
                running: Action::Search,
            });
        }
        self.searching = true;
        Ok(OperationRequest::search(self.ecosystem, query.trim(), filter))
    }

    /// Applies a finished request. Returns the follow-up refresh after a
    /// mutation.
    pub fn complete(
        &mut self,
        request: &OperationRequest,
        result: Result<Outcome, OpError>,
    ) -> Option<OperationRequest> {
        match request.action {
            Action::List => {
                match result {
                    Ok(Outcome::Records(records)) => {
                        tracing::info!(ecosystem = %self.ecosystem, count = records.len(), "panel refreshed");
                        self.records = records;
                        self.error = None;
                        self.loaded = true;
                    }
                    Ok(other) => tracing::warn!(ecosystem = %self.ecosystem, ?other, "unexpected list outcome"),
                    Err(e) => {
                        tracing::warn!(ecosystem = %self.ecosystem, error = %e, "refresh failed");
                        self.error = Some(e.to_string());
                        self.notice = Some(Notice::from_error(&e));
                    }
                }
                self.state = PanelState::Idle;
                None
            }
            Action::Search => {
                self.searching = false;
                match result {
                    Ok(Outcome::Records(mut results)) => {
                        let installed: HashSet<&str> = self.records.iter().map(|r| r.name.as_str()).collect();
                        for record in &mut results {
                            record.installed |= installed.contains(record.name.as_str());
                        }
                        self.search_results = Some(results);
                    }
                    Ok(other) => tracing::warn!(ecosystem = %self.ecosystem, ?other, "unexpected search outcome"),
                    Err(e) => self.notice = Some(Notice::from_error(&e)),
                }
                None
            }
            Action::Info => {
                match result {
                    Ok(Outcome::Details(text)) => self.details = Some(text),
                    Ok(other) => tracing::warn!(ecosystem = %self.ecosystem, ?other, "unexpected info outcome"),
                    Err(e) => self.notice = Some(Notice::from_error(&e)),
                }
                self.state = PanelState::Idle;
                None
            }
            Action::Install | Action::Remove | Action::Update => {
                self.notice = Some(match &result {
                    Ok(Outcome::Completed(message)) => Notice::Success(message.clone()),
                    Ok(_) => Notice::Success(format!("{} finished", request.action)),
                    Err(e) => Notice::from_error(e),
                });
                if let Err(e) = &result {
                    tracing::warn!(ecosystem = %self.ecosystem, action = %request.action, error = %e, "operation failed");
                }
                self.search_results = None;
                self.state = PanelState::Refreshing;
                Some(OperationRequest::list(self.ecosystem))
            }
            Action::ListUpdates => {
                self.finish_update_check();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    /// Keeps an in-memory package set and fails on demand.
    struct StubBackend {
        installed: Mutex<Vec<String>>,
        fail_with: Option<OpError>,
    }

    impl StubBackend {
        fn new(installed: &[&str]) -> Self {
            Self {
                installed: Mutex::new(installed.iter().map(|s| s.to_string()).collect()),
                fail_with: None,
            }
        }

        fn failing(error: OpError) -> Self {
            Self {
                fail_with: Some(error),
                ..Self::new(&[])
            }
        }
    }

    impl Backend for StubBackend {
        fn ecosystem(&self) -> Ecosystem {
            Ecosystem::System
        }

        fn perform(&self, request: OperationRequest) -> BoxFuture<'static, Result<Outcome, OpError>> {
            let result = match (&self.fail_with, request.action) {
                (Some(error), _) => Err(error.clone()),
                (None, Action::List) => Ok(Outcome::Records(
                    self.installed
                        .lock()
                        .unwrap()
                        .iter()
                        .map(|name| PackageRecord::new(Ecosystem::System, name.as_str(), true))
                        .collect(),
                )),
                (None, Action::Install) => {
                    self.installed.lock().unwrap().push(request.target.clone());
                    Ok(Outcome::Completed(format!("Successfully installed {}", request.target)))
                }
                (None, Action::Search) => Ok(Outcome::Records(vec![
                    PackageRecord::new(Ecosystem::System, "vim", false),
                    PackageRecord::new(Ecosystem::System, "vim-minimal", false),
                ])),
                (None, action) => Ok(Outcome::Completed(action.to_string())),
            };
            Box::pin(async move { result })
        }
    }

    async fn run(panel: &mut PanelController, backend: &StubBackend, request: OperationRequest) -> Option<OperationRequest> {
        let result = backend.perform(request.clone()).await;
        panel.complete(&request, result)
    }

    #[tokio::test]
    async fn install_then_refresh_shows_package_installed() {
        let backend = StubBackend::new(&["bash"]);
        let mut panel = PanelController::new(Ecosystem::System);

        let request = panel.install("htop").unwrap();
        assert!(request.requires_privilege);
        assert_eq!(panel.state(), PanelState::OperationInFlight(Action::Install));

        let follow_up = run(&mut panel, &backend, request).await.expect("refresh after install");
        assert_eq!(follow_up.action, Action::List);
        assert_eq!(panel.state(), PanelState::Refreshing);
        assert_eq!(panel.notice(), Some(&Notice::Success("Successfully installed htop".into())));

        assert!(run(&mut panel, &backend, follow_up).await.is_none());
        assert_eq!(panel.state(), PanelState::Idle);
        let htop = panel.records().iter().find(|r| r.name == "htop").expect("htop listed");
        assert!(htop.installed);
    }

    #[test]
    fn in_flight_operation_rejects_another_request() {
        let mut panel = PanelController::new(Ecosystem::Sandboxed);
        panel.remove("org.gimp.GIMP").unwrap();

        let busy = panel.install("org.kde.krita").unwrap_err();
        assert_eq!(busy.running, Action::Remove);
        assert_eq!(busy.ecosystem, Ecosystem::Sandboxed);
        assert!(panel.refresh().is_err());
        assert!(panel.info("org.kde.krita").is_err());
    }

    #[test]
    fn refreshing_rejects_mutations() {
        let mut panel = PanelController::new(Ecosystem::System);
        panel.refresh().unwrap();
        assert_eq!(panel.update("").unwrap_err().running, Action::List);
    }

    #[test]
    fn update_check_holds_the_panel_until_finished() {
        let mut panel = PanelController::new(Ecosystem::System);
        let request = panel.check_updates().unwrap();
        assert_eq!(request, OperationRequest::list_updates(Ecosystem::System));
        assert_eq!(panel.state(), PanelState::CheckingUpdates);

        assert_eq!(panel.update("").unwrap_err().running, Action::ListUpdates);
        assert!(panel.install("htop").is_err());
        assert!(panel.refresh().is_err());
        assert!(panel.check_updates().is_err());

        panel.finish_update_check();
        assert_eq!(panel.state(), PanelState::Idle);
        assert!(panel.update("").is_ok());
        panel.finish_update_check();
        assert_eq!(panel.state(), PanelState::OperationInFlight(Action::Update));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_records() {
        let mut panel = PanelController::new(Ecosystem::System);
        let good = StubBackend::new(&["bash", "vim"]);
        let request = panel.refresh().unwrap();
        run(&mut panel, &good, request).await;
        assert_eq!(panel.records().len(), 2);

        let bad = StubBackend::failing(OpError::NonZeroExit {
            code: Some(1),
            output: "Error: Failed to download metadata".into(),
        });
        let request = panel.refresh().unwrap();
        run(&mut panel, &bad, request).await;

        assert_eq!(panel.records().len(), 2);
        assert_eq!(panel.state(), PanelState::Idle);
        assert_eq!(panel.error(), Some("Error: Failed to download metadata"));
        assert!(panel.has_loaded());
    }

    #[tokio::test]
    async fn failed_mutation_still_refreshes() {
        let mut panel = PanelController::new(Ecosystem::System);
        let backend = StubBackend::failing(OpError::NonZeroExit {
            code: Some(1),
            output: "Error: Unable to find a match: nosuch".into(),
        });
        let request = panel.remove("nosuch").unwrap();
        let follow_up = run(&mut panel, &backend, request).await;
        assert!(follow_up.is_some());
        assert_eq!(
            panel.notice(),
            Some(&Notice::Error("Error: Unable to find a match: nosuch".into()))
        );
    }

    #[tokio::test]
    async fn cancelled_prompt_is_a_neutral_notice() {
        let mut panel = PanelController::new(Ecosystem::System);
        let backend = StubBackend::failing(OpError::PrivilegeCancelled);
        let request = panel.update("").unwrap();
        run(&mut panel, &backend, request).await;
        assert_eq!(panel.notice(), Some(&Notice::Cancelled));
        assert_eq!(panel.notice().unwrap().to_string(), "Operation cancelled");
    }

    #[tokio::test]
    async fn search_results_are_annotated_and_leave_records_alone() {
        let backend = StubBackend::new(&["vim"]);
        let mut panel = PanelController::new(Ecosystem::System);
        let request = panel.refresh().unwrap();
        run(&mut panel, &backend, request).await;

        let request = panel.search("vim", SearchFilter::All).unwrap();
        assert!(panel.search("vi", SearchFilter::All).is_err());
        run(&mut panel, &backend, request).await;

        let results = panel.search_results().unwrap();
        assert!(results[0].installed);
        assert!(!results[1].installed);
        assert_eq!(panel.records().len(), 1);
        assert!(!panel.is_searching());
        assert_eq!(panel.visible_records().len(), 2);

        panel.clear_search();
        assert_eq!(panel.visible_records().len(), 1);
    }

    #[test]
    fn info_fills_details_and_returns_to_idle() {
        let mut panel = PanelController::new(Ecosystem::Portable);
        let request = panel.info("Tool.AppImage").unwrap();
        panel.complete(&request, Ok(Outcome::Details("Size : 1 KB".into())));
        assert_eq!(panel.details(), Some("Size : 1 KB"));
        assert!(!panel.is_busy());
    }
}
