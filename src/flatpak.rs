//! Sandboxed applications through flatpak.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::backend::{require_target, run_tool, success_message, Backend};
use crate::config::Config;
use crate::error::OpError;
use crate::model::{Action, Ecosystem, OperationRequest, Outcome, PackageRecord, SearchFilter};
use crate::parser::{FlatpakColumnsParser, OutputParser};
use crate::runner::{Executor, Invocation};

const FLATPAK: &str = "flatpak";
const NO_REMOTE_HINT: &str = "Tip: Make sure Flathub is added as a remote:\n\
flatpak remote-add --if-not-exists flathub https://flathub.org/repo/flathub.flatpakrepo";

#[derive(Clone)]
pub struct FlatpakBackend {
    executor: Arc<dyn Executor>,
    installed_parser: FlatpakColumnsParser,
    remote_parser: FlatpakColumnsParser,
    updates_parser: FlatpakColumnsParser,
    remote: String,
    query_timeout: Duration,
}

impl FlatpakBackend {
    pub fn new(executor: Arc<dyn Executor>, config: &Config) -> Self {
        let columns = config.parsers.flatpak_columns.clone();
        Self {
            executor,
            installed_parser: FlatpakColumnsParser::new(columns.clone(), true),
            remote_parser: FlatpakColumnsParser::new(columns, false),
            updates_parser: FlatpakColumnsParser::new(vec!["application".into(), "version".into()], true),
            remote: config.flatpak_remote.clone(),
            query_timeout: config.query_timeout(),
        }
    }

    async fn run(&self, request: &OperationRequest, args: Vec<String>) -> Result<String, OpError> {
        let invocation = Invocation::new(FLATPAK, args).timeout(request.timeout(self.query_timeout));
        run_tool(self.executor.as_ref(), invocation, request, &[]).await
    }

    async fn list_installed(&self, request: &OperationRequest) -> Result<Vec<PackageRecord>, OpError> {
        let args = vec!["list".into(), "--app".into(), self.installed_parser.columns_arg()];
        let output = self.run(request, args).await?;
        Ok(self.installed_parser.parse(&output))
    }

    async fn handle(&self, request: OperationRequest) -> Result<Outcome, OpError> {
        match request.action {
            Action::List => Ok(Outcome::Records(self.list_installed(&request).await?)),
            Action::ListUpdates => {
                let args = vec![
                    "remote-ls".into(),
                    "--updates".into(),
                    "--app".into(),
                    self.updates_parser.columns_arg(),
                ];
                let output = self.run(&request, args).await?;
                Ok(Outcome::Records(self.updates_parser.parse(&output)))
            }
            Action::Search => {
                let query = request.target.trim().to_lowercase();
                if request.filter == SearchFilter::Installed || query.is_empty() {
                    let records = self.list_installed(&request).await?;
                    return Ok(Outcome::Records(filter_local(records, &query)));
                }
                let args = vec!["search".into(), query, self.remote_parser.columns_arg()];
                let output = self.run(&request, args).await?;
                Ok(Outcome::Records(self.remote_parser.parse(&output)))
            }
            Action::Info => {
                let target = require_target(&request)?;
                let output = self.run(&request, vec!["info".into(), target.to_string()]).await?;
                Ok(Outcome::Details(output))
            }
            Action::Install => {
                let target = require_target(&request)?.to_string();
                let args = vec![
                    "install".into(),
                    "-y".into(),
                    "--noninteractive".into(),
                    self.remote.clone(),
                    target.clone(),
                ];
                self.run(&request, args).await.map_err(with_remote_hint)?;
                Ok(Outcome::Completed(success_message(Action::Install, &target)))
            }
            Action::Remove => {
                let target = require_target(&request)?.to_string();
                let args = vec!["uninstall".into(), "-y".into(), "--noninteractive".into(), target.clone()];
                self.run(&request, args).await?;
                Ok(Outcome::Completed(success_message(Action::Remove, &target)))
            }
            Action::Update => {
                let target = request.target.trim().to_string();
                let mut args = vec!["update".to_string(), "-y".into(), "--noninteractive".into()];
                if !target.is_empty() {
                    args.push(target.clone());
                }
                self.run(&request, args).await?;
                Ok(Outcome::Completed(success_message(Action::Update, &target)))
            }
        }
    }
}

impl Backend for FlatpakBackend {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Sandboxed
    }

    fn perform(&self, request: OperationRequest) -> BoxFuture<'static, Result<Outcome, OpError>> {
        let backend = self.clone();
        Box::pin(async move { backend.handle(request).await })
    }
}

/// Case-insensitive match on ID, name and description.
fn filter_local(records: Vec<PackageRecord>, query: &str) -> Vec<PackageRecord> {
    if query.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| {
            r.name.to_lowercase().contains(query)
                || r.display_name.as_deref().is_some_and(|n| n.to_lowercase().contains(query))
                || r.description.as_deref().is_some_and(|d| d.to_lowercase().contains(query))
        })
        .collect()
}

fn with_remote_hint(error: OpError) -> OpError {
    match error {
        OpError::NonZeroExit { code, output }
            if output.contains("No remote chosen") || output.to_lowercase().contains("not installed") =>
        {
            OpError::NonZeroExit {
                code,
                output: format!("{output}\n\n{NO_REMOTE_HINT}"),
            }
        }
        other => other,
    }
}
