use std::sync::Arc;

use futures::future::BoxFuture;

use crate::appimage::AppImageBackend;
use crate::config::Config;
use crate::error::OpError;
use crate::flatpak::FlatpakBackend;
use crate::model::{Action, Ecosystem, OperationRequest, Outcome};
use crate::package_manager::DnfBackend;
use crate::runner::{Executor, Invocation};

/// Carries out operation requests for one ecosystem.
pub trait Backend: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;
    fn perform(&self, request: OperationRequest) -> BoxFuture<'static, Result<Outcome, OpError>>;
}

/// One backend per ecosystem.
#[derive(Clone)]
pub struct Backends {
    system: Arc<dyn Backend>,
    sandboxed: Arc<dyn Backend>,
    portable: Arc<dyn Backend>,
}

impl Backends {
    pub fn new(system: Arc<dyn Backend>, sandboxed: Arc<dyn Backend>, portable: Arc<dyn Backend>) -> Self {
        Self {
            system,
            sandboxed,
            portable,
        }
    }

    pub fn from_config(config: &Config, executor: Arc<dyn Executor>) -> Self {
        Self::new(
            Arc::new(DnfBackend::new(executor.clone(), config)),
            Arc::new(FlatpakBackend::new(executor.clone(), config)),
            Arc::new(AppImageBackend::from_config(config, executor)),
        )
    }

    pub fn get(&self, ecosystem: Ecosystem) -> Arc<dyn Backend> {
        match ecosystem {
            Ecosystem::System => self.system.clone(),
            Ecosystem::Sandboxed => self.sandboxed.clone(),
            Ecosystem::Portable => self.portable.clone(),
        }
    }

    pub fn perform(&self, request: OperationRequest) -> BoxFuture<'static, Result<Outcome, OpError>> {
        let backend = self.get(request.ecosystem);
        tracing::debug!(ecosystem = %backend.ecosystem(), action = %request.action, target = %request.target, "dispatching");
        backend.perform(request)
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

/// Runs an invocation for `request` and returns stdout, accepting the
/// additional exit codes in `extra_ok`.
pub(crate) async fn run_tool(
    executor: &dyn Executor,
    invocation: Invocation,
    request: &OperationRequest,
    extra_ok: &[i32],
) -> Result<String, OpError> {
    let command = invocation.command_line();
    let output = executor
        .execute(invocation)
        .await
        .map_err(|e| OpError::from_run(e, request.ecosystem, request.action))?;
    output.into_stdout(extra_ok).map_err(|e| {
        tracing::warn!(%command, error = %e, "command failed");
        e
    })
}

pub(crate) fn require_target(request: &OperationRequest) -> Result<&str, OpError> {
    let target = request.target.trim();
    if target.is_empty() {
        Err(OpError::MissingTarget {
            ecosystem: request.ecosystem,
            action: request.action,
        })
    } else {
        Ok(target)
    }
}

/// "Successfully installed vim", "Successfully removed org.gimp.GIMP", ...
pub(crate) fn success_message(action: Action, target: &str) -> String {
    let verb = match action {
        Action::Install => "installed",
        Action::Remove => "removed",
        Action::Update => "updated",
        other => other.as_str(),
    };
    if target.is_empty() {
        format!("Successfully {verb} all packages")
    } else {
        format!("Successfully {verb} {target}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(Ecosystem);

    impl Backend for Echo {
        fn ecosystem(&self) -> Ecosystem {
            self.0
        }

        fn perform(&self, request: OperationRequest) -> BoxFuture<'static, Result<Outcome, OpError>> {
            let ecosystem = self.0;
            Box::pin(async move { Ok(Outcome::Completed(format!("{ecosystem}:{}", request.action))) })
        }
    }

    #[tokio::test]
    async fn requests_reach_their_own_ecosystem() {
        let backends = Backends::new(
            Arc::new(Echo(Ecosystem::System)),
            Arc::new(Echo(Ecosystem::Sandboxed)),
            Arc::new(Echo(Ecosystem::Portable)),
        );
        let outcome = backends.perform(OperationRequest::list(Ecosystem::Sandboxed)).await.unwrap();
        assert_eq!(outcome, Outcome::Completed("flatpak:list".into()));
        let outcome = backends.perform(OperationRequest::list_updates(Ecosystem::Portable)).await.unwrap();
        assert_eq!(outcome, Outcome::Completed("appimage:list-updates".into()));
    }

    #[test]
    fn success_messages_name_the_target() {
        assert_eq!(success_message(Action::Remove, "org.gimp.GIMP"), "Successfully removed org.gimp.GIMP");
        assert_eq!(success_message(Action::Update, ""), "Successfully updated all packages");
    }

    #[test]
    fn blank_target_is_missing() {
        let request = OperationRequest::new(Ecosystem::Portable, Action::Remove, " ");
        assert_eq!(
            require_target(&request),
            Err(OpError::MissingTarget {
                ecosystem: Ecosystem::Portable,
                action: Action::Remove
            })
        );
    }
}
