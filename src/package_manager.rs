//! System packages through dnf.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::backend::{require_target, run_tool, success_message, Backend};
use crate::config::Config;
use crate::error::OpError;
use crate::model::{Action, Ecosystem, OperationRequest, Outcome, PackageRecord, SearchFilter};
use crate::parser::{parse_dnf_info_summaries, DnfListMode, DnfListParser, OutputParser};
use crate::runner::{Executor, Invocation};

const DNF: &str = "dnf";
/// `dnf check-update` exits 100 when updates are available.
const CHECK_UPDATE_AVAILABLE: i32 = 100;
/// Descriptions are fetched for this many search results.
const SUMMARY_LOOKUP_LIMIT: usize = 50;

#[derive(Clone)]
pub struct DnfBackend {
    executor: Arc<dyn Executor>,
    list_parser: DnfListParser,
    installed_parser: DnfListParser,
    updates_parser: DnfListParser,
    update_verb: String,
    query_timeout: Duration,
}

impl DnfBackend {
    pub fn new(executor: Arc<dyn Executor>, config: &Config) -> Self {
        let prefixes = config.parsers.dnf_header_prefixes.clone();
        Self {
            executor,
            list_parser: DnfListParser::new(prefixes.clone(), DnfListMode::Listing),
            installed_parser: DnfListParser::new(prefixes.clone(), DnfListMode::Installed),
            updates_parser: DnfListParser::new(prefixes, DnfListMode::Updates),
            update_verb: config.dnf_update_verb.clone(),
            query_timeout: config.query_timeout(),
        }
    }

    fn invocation(&self, request: &OperationRequest, args: Vec<String>) -> Invocation {
        Invocation::new(DNF, args)
            .privileged(request.requires_privilege)
            .timeout(request.timeout(self.query_timeout))
    }

    async fn handle(&self, request: OperationRequest) -> Result<Outcome, OpError> {
        match request.action {
            Action::List => {
                let invocation = self.invocation(&request, vec!["list".into(), "--installed".into()]);
                let output = run_tool(self.executor.as_ref(), invocation, &request, &[]).await?;
                Ok(Outcome::Records(self.installed_parser.parse(&output)))
            }
            Action::ListUpdates => {
                let invocation = self.invocation(&request, vec!["check-update".into(), "-q".into()]);
                let output =
                    run_tool(self.executor.as_ref(), invocation, &request, &[CHECK_UPDATE_AVAILABLE]).await?;
                Ok(Outcome::Records(self.updates_parser.parse(&output)))
            }
            Action::Search => {
                let invocation = self.invocation(&request, search_args(&request.target, request.filter));
                let output = run_tool(self.executor.as_ref(), invocation, &request, &[]).await?;
                let parser = match request.filter {
                    SearchFilter::Installed => &self.installed_parser,
                    SearchFilter::All | SearchFilter::Available => &self.list_parser,
                };
                let mut records = parser.parse(&output);
                self.attach_summaries(&request, &mut records).await;
                Ok(Outcome::Records(records))
            }
            Action::Info => {
                let target = require_target(&request)?;
                let invocation = self.invocation(&request, vec!["info".into(), target.to_string()]);
                let output = run_tool(self.executor.as_ref(), invocation, &request, &[]).await?;
                Ok(Outcome::Details(output))
            }
            Action::Install | Action::Remove => {
                let target = require_target(&request)?.to_string();
                let verb = if request.action == Action::Install { "install" } else { "remove" };
                let invocation = self.invocation(&request, vec![verb.into(), "-y".into(), target.clone()]);
                run_tool(self.executor.as_ref(), invocation, &request, &[]).await?;
                Ok(Outcome::Completed(success_message(request.action, &target)))
            }
            Action::Update => {
                let target = request.target.trim().to_string();
                let mut args = vec![self.update_verb.clone(), "-y".to_string()];
                if !target.is_empty() {
                    args.push(target.clone());
                }
                let invocation = self.invocation(&request, args);
                run_tool(self.executor.as_ref(), invocation, &request, &[]).await?;
                Ok(Outcome::Completed(success_message(Action::Update, &target)))
            }
        }
    }

    /// Fills descriptions from `dnf info`. A failed lookup only costs the
    /// descriptions, never the search results.
    async fn attach_summaries(&self, request: &OperationRequest, records: &mut [PackageRecord]) {
        if records.is_empty() {
            return;
        }
        let mut args = vec!["info".to_string()];
        args.extend(records.iter().take(SUMMARY_LOOKUP_LIMIT).map(|r| r.name.clone()));
        let invocation = Invocation::new(DNF, args).timeout(Some(self.query_timeout));

        match run_tool(self.executor.as_ref(), invocation, request, &[]).await {
            Ok(output) => {
                let summaries = parse_dnf_info_summaries(&output);
                for record in records.iter_mut() {
                    if let Some(summary) = summaries.get(&record.name) {
                        record.description = Some(summary.clone());
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "dnf: could not fetch package summaries"),
        }
    }
}

impl Backend for DnfBackend {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::System
    }

    fn perform(&self, request: OperationRequest) -> BoxFuture<'static, Result<Outcome, OpError>> {
        let backend = self.clone();
        Box::pin(async move { backend.handle(request).await })
    }
}

fn search_args(query: &str, filter: SearchFilter) -> Vec<String> {
    let mut args = vec!["list".to_string()];
    match filter {
        SearchFilter::All => {}
        SearchFilter::Installed => args.push("--installed".into()),
        SearchFilter::Available => args.push("--available".into()),
    }
    let query = query.trim();
    if !query.is_empty() {
        args.push(format!("*{query}*"));
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunError;
    use crate::runner::{MockExecutor, ProcessOutput};
    use futures::FutureExt;

    fn backend(executor: MockExecutor) -> DnfBackend {
        DnfBackend::new(Arc::new(executor), &Config::default())
    }

    fn reply(
        output: ProcessOutput,
    ) -> impl FnMut(Invocation) -> BoxFuture<'static, Result<ProcessOutput, RunError>> + Send + 'static {
        move |_| {
            let output = output.clone();
            async move { Ok(output) }.boxed()
        }
    }

    #[tokio::test]
    async fn install_runs_privileged_without_timeout() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .withf(|inv| inv.program == "dnf" && inv.args == ["install", "-y", "vim"] && inv.privileged && inv.timeout.is_none())
            .times(1)
            .returning(reply(ProcessOutput::success("Complete!\n")));

        let request = OperationRequest::new(Ecosystem::System, Action::Install, "vim");
        let outcome = backend(executor).perform(request).await.unwrap();
        assert_eq!(outcome, Outcome::Completed("Successfully installed vim".into()));
    }

    #[tokio::test]
    async fn list_is_unprivileged_and_bounded() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .withf(|inv| inv.args == ["list", "--installed"] && !inv.privileged && inv.timeout.is_some())
            .returning(reply(ProcessOutput::success("Installed Packages\nbash.x86_64 5.2 @anaconda\n")));

        let outcome = backend(executor).perform(OperationRequest::list(Ecosystem::System)).await.unwrap();
        let Outcome::Records(records) = outcome else {
            panic!("expected records");
        };
        assert_eq!(records.len(), 1);
        assert!(records[0].installed);
    }

    #[tokio::test]
    async fn dnf5_installed_list_without_at_prefix_is_installed() {
        let mut executor = MockExecutor::new();
        executor.expect_execute().returning(reply(ProcessOutput::success(
            "Updating and loading repositories:\nRepositories loaded.\nInstalled packages\n\
bash.x86_64 5.2.26-3.fc40 anaconda\nvim-enhanced.x86_64 2:9.1.393-1.fc40 updates\n",
        )));

        let Outcome::Records(records) = backend(executor).perform(OperationRequest::list(Ecosystem::System)).await.unwrap() else {
            panic!("expected records");
        };
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["bash", "vim-enhanced"]);
        assert!(records.iter().all(|r| r.installed));
    }

    #[tokio::test]
    async fn installed_filter_search_marks_results_installed() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .withf(|inv| inv.args == ["list", "--installed", "*vim*"])
            .returning(reply(ProcessOutput::success("vim-enhanced.x86_64 2:9.1.393-1.fc40 updates\n")));
        executor.expect_execute().returning(reply(ProcessOutput::success("")));

        let request = OperationRequest::search(Ecosystem::System, "vim", SearchFilter::Installed);
        let Outcome::Records(records) = backend(executor).perform(request).await.unwrap() else {
            panic!("expected records");
        };
        assert_eq!(records.len(), 1);
        assert!(records[0].installed);
    }

    #[tokio::test]
    async fn check_update_exit_100_is_success() {
        let mut executor = MockExecutor::new();
        executor.expect_execute().returning(reply(ProcessOutput {
            exit_code: Some(100),
            stdout: "\nfirefox.x86_64 131.0-1.fc40 updates\nkernel.x86_64 6.11.3-200.fc40 updates\n".into(),
            stderr: String::new(),
            cancelled: false,
        }));

        let outcome = backend(executor)
            .perform(OperationRequest::list_updates(Ecosystem::System))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Records(ref r) if r.len() == 2));
    }

    #[tokio::test]
    async fn failed_remove_surfaces_stderr_verbatim() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .returning(reply(ProcessOutput::failure(1, "Error: No packages marked for removal.")));

        let request = OperationRequest::new(Ecosystem::System, Action::Remove, "nosuch");
        let error = backend(executor).perform(request).await.unwrap_err();
        assert_eq!(error.to_string(), "Error: No packages marked for removal.");
    }

    #[tokio::test]
    async fn dismissed_prompt_is_cancelled() {
        let mut executor = MockExecutor::new();
        executor.expect_execute().returning(reply(ProcessOutput {
            cancelled: true,
            ..ProcessOutput::failure(126, "")
        }));

        let request = OperationRequest::new(Ecosystem::System, Action::Update, "");
        let error = backend(executor).perform(request).await.unwrap_err();
        assert_eq!(error, OpError::PrivilegeCancelled);
    }

    #[tokio::test]
    async fn update_all_uses_configured_verb() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .withf(|inv| inv.args == ["upgrade", "-y"] && inv.privileged)
            .returning(reply(ProcessOutput::success("")));

        let request = OperationRequest::new(Ecosystem::System, Action::Update, "");
        let outcome = backend(executor).perform(request).await.unwrap();
        assert_eq!(outcome, Outcome::Completed("Successfully updated all packages".into()));
    }

    #[tokio::test]
    async fn missing_tool_names_action_and_ecosystem() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .returning(|_| async { Err::<ProcessOutput, _>(RunError::ToolNotFound("dnf".into())) }.boxed());

        let request = OperationRequest::new(Ecosystem::System, Action::Install, "vim");
        let error = backend(executor).perform(request).await.unwrap_err();
        assert!(matches!(error, OpError::ToolNotFound { action: Action::Install, ecosystem: Ecosystem::System, .. }));
    }

    #[tokio::test]
    async fn search_fills_descriptions_from_info() {
        let mut executor = MockExecutor::new();
        executor
            .expect_execute()
            .withf(|inv| inv.args.first().map(String::as_str) == Some("list"))
            .returning(reply(ProcessOutput::success(
                "Available Packages\nhtop.x86_64 3.3.0 fedora\nbtop.x86_64 1.3.2 fedora\n",
            )));
        executor
            .expect_execute()
            .withf(|inv| inv.args == ["info", "htop", "btop"])
            .returning(reply(ProcessOutput::success("Name : htop\nSummary : Interactive process viewer\n")));

        let request = OperationRequest::search(Ecosystem::System, "top", SearchFilter::Available);
        let Outcome::Records(records) = backend(executor).perform(request).await.unwrap() else {
            panic!("expected records");
        };
        assert_eq!(records[0].description.as_deref(), Some("Interactive process viewer"));
        assert_eq!(records[1].description, None);
    }

    #[tokio::test]
    async fn install_without_target_is_rejected_before_running() {
        let executor = MockExecutor::new();
        let request = OperationRequest::new(Ecosystem::System, Action::Install, "  ");
        let error = backend(executor).perform(request).await.unwrap_err();
        assert!(matches!(error, OpError::MissingTarget { .. }));
    }

    #[test]
    fn search_args_follow_filter() {
        assert_eq!(search_args("vim", SearchFilter::All), ["list", "*vim*"]);
        assert_eq!(search_args("vim", SearchFilter::Installed), ["list", "--installed", "*vim*"]);
        assert_eq!(search_args(" ", SearchFilter::Available), ["list", "--available"]);
    }
}
