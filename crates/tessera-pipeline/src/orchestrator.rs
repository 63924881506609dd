//! Workflow lifecycle entry point.
//!
//! [`OrchestratorContext`] holds the shared collaborators and is built once
//! at startup. [`WorkflowOrchestrator`] is a short-lived binding of that
//! context to at most one workflow id, created per request:
//!
//! ```text
//! ctx.orchestrator(None)       ──► run(definition, params, requester) ──► new id
//! ctx.orchestrator(Some(id))   ──► cancel / is_owned_by / get_detail
//! ```

use std::sync::Arc;

use tessera_config::{DatasetBackend, TesseraConfig};
use tessera_store::{RunLogDir, WorkflowFilter, WorkflowRepository};
use tessera_types::{
    DefinitionListItem, RunParameters, WorkflowDefinition, WorkflowDetail, WorkflowListItem,
    WorkflowRecord, WorkflowState,
};
use uuid::Uuid;

use crate::definition::{DefinitionResolver, DirectoryDefinitionResolver};
use crate::error::{PipelineError, Result};
use crate::executor::TaskExecutor;
use crate::jobs::{JobStatusSource, TesJobClient};
use crate::launch::{ExecutorSettings, WorkflowRun, result_bucket_for};
use crate::scheduler::{LocalTaskQueue, TaskQueue, run_unit};
use crate::template::resolve_input_mapping;

/// Identity of the caller starting a run.
#[derive(Debug, Clone)]
pub struct Requester {
    /// Display name; recorded as the workflow owner.
    pub username: String,
    /// Token subject; names the result bucket.
    pub subject: String,
    /// Bearer token forwarded to the execution backend.
    pub access_token: String,
}

/// Collaborators shared by every orchestrator binding.
pub struct OrchestratorContext {
    repo: Arc<dyn WorkflowRepository>,
    resolver: Arc<dyn DefinitionResolver>,
    queue: Arc<dyn TaskQueue>,
    executor: Arc<TaskExecutor>,
    jobs: Arc<dyn JobStatusSource>,
    datasets: Vec<DatasetBackend>,
    default_execution_url: String,
}

impl OrchestratorContext {
    pub fn new(
        repo: Arc<dyn WorkflowRepository>,
        resolver: Arc<dyn DefinitionResolver>,
        queue: Arc<dyn TaskQueue>,
        executor: Arc<TaskExecutor>,
        jobs: Arc<dyn JobStatusSource>,
        default_execution_url: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            resolver,
            queue,
            executor,
            jobs,
            datasets: Vec::new(),
            default_execution_url: default_execution_url.into(),
        }
    }

    /// Route runs over specific datasets to other backends.
    pub fn with_datasets(mut self, datasets: Vec<DatasetBackend>) -> Self {
        self.datasets = datasets;
        self
    }

    /// Wire the default collaborators from configuration.
    pub fn from_config(config: &TesseraConfig, repo: Arc<dyn WorkflowRepository>) -> Self {
        let pipeline = config.pipeline();
        let executor = TaskExecutor::new(
            ExecutorSettings::from_config(config),
            repo.clone(),
            RunLogDir::new(&config.log_dir()),
        );
        Self::new(
            repo,
            Arc::new(DirectoryDefinitionResolver::new(
                &config.workflow_definition_dir(),
            )),
            Arc::new(LocalTaskQueue::new(pipeline.max_concurrent_runs)),
            Arc::new(executor),
            Arc::new(TesJobClient::new(config.tes_url())),
            config.tes_url(),
        )
        .with_datasets(config.datasets.clone())
    }

    pub fn repository(&self) -> &Arc<dyn WorkflowRepository> {
        &self.repo
    }

    /// Bind to `workflow_id`, or to nothing when starting a new run.
    pub fn orchestrator(self: &Arc<Self>, workflow_id: Option<Uuid>) -> Result<WorkflowOrchestrator> {
        let was_run = match workflow_id {
            Some(id) => self.repo.get_one(&WorkflowFilter::by_id(id))?.is_some(),
            None => false,
        };
        Ok(WorkflowOrchestrator {
            ctx: self.clone(),
            workflow_id,
            was_run,
        })
    }

    /// Workflows owned by `owner`, newest first.
    pub fn list_for_owner(&self, owner: &str) -> Result<Vec<WorkflowListItem>> {
        Ok(self
            .repo
            .get_many(&WorkflowFilter::by_owner(owner))?
            .iter()
            .map(WorkflowListItem::from)
            .collect())
    }

    pub fn list_definitions(&self) -> Result<Vec<DefinitionListItem>> {
        self.resolver.list_items()
    }

    /// Look up a definition, e.g. to check authorization before running it.
    pub fn resolve_definition(&self, definition_id: Uuid) -> Result<WorkflowDefinition> {
        self.resolver
            .resolve(definition_id)?
            .ok_or_else(|| PipelineError::DefinitionNotFound(definition_id.to_string()))
    }

    /// Backend for a run over `dataset`: the first `[[datasets]]` entry that
    /// lists it, else the default backend.
    pub fn resolve_execution_url(&self, dataset: &str) -> &str {
        self.datasets
            .iter()
            .find(|b| b.datasets.iter().any(|d| d == dataset))
            .map_or(self.default_execution_url.as_str(), |b| b.execution_url.as_str())
    }
}

/// One request's view of one workflow.
pub struct WorkflowOrchestrator {
    ctx: Arc<OrchestratorContext>,
    workflow_id: Option<Uuid>,
    was_run: bool,
}

impl std::fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("workflow_id", &self.workflow_id)
            .field("was_run", &self.was_run)
            .finish()
    }
}

impl WorkflowOrchestrator {
    pub fn workflow_id(&self) -> Option<Uuid> {
        self.workflow_id
    }

    /// Start a run of `definition_id` in the background and return its id.
    ///
    /// The record is persisted in state UNKNOWN before the unit is queued, so
    /// the id is immediately visible to list and cancel requests.
    pub fn run(
        &mut self,
        definition_id: Uuid,
        params: RunParameters,
        requester: &Requester,
    ) -> Result<Uuid> {
        if self.was_run {
            let id = self.workflow_id.map(|id| id.to_string()).unwrap_or_default();
            return Err(PipelineError::AlreadyRun(id));
        }

        let definition = self.ctx.resolve_definition(definition_id)?;
        let input_mapping = resolve_input_mapping(&definition.input_mapping, &params.template_vars())?;

        let workflow_id = Uuid::new_v4();
        let execution_url = self.ctx.resolve_execution_url(&params.input_dir).to_string();
        let handle = self.ctx.queue.allocate_handle();

        let record = WorkflowRecord::new(workflow_id, handle.as_str(), requester.username.as_str());
        if let Err(e) = self.ctx.repo.insert(&record) {
            self.ctx.queue.release_handle(&handle);
            return Err(e.into());
        }

        let run = WorkflowRun {
            workflow_id,
            definition,
            params,
            input_mapping,
            username: requester.username.clone(),
            access_token: requester.access_token.clone(),
            result_bucket: result_bucket_for(&requester.subject),
            execution_url,
        };
        tracing::info!(
            workflow_id = %workflow_id,
            definition_id = %definition_id,
            owner = %requester.username,
            backend = %run.execution_url,
            "Submitting workflow run"
        );

        let executor = self.ctx.executor.clone();
        let unit = run_unit(move |token| async move {
            match executor.execute(&run, &token).await {
                Ok(code) => {
                    tracing::info!(workflow_id = %run.workflow_id, exit_code = code, "Workflow run finished")
                }
                Err(e) => {
                    tracing::error!(workflow_id = %run.workflow_id, error = %e, "Workflow run did not start")
                }
            }
        });

        if let Err(e) = self.ctx.queue.submit(&handle, unit) {
            self.ctx.queue.release_handle(&handle);
            let mut fail = |r: &mut WorkflowRecord| r.transition(WorkflowState::Failed);
            if let Err(store_err) = self.ctx.repo.modify(workflow_id, &mut fail) {
                tracing::warn!(workflow_id = %workflow_id, error = %store_err, "Failed to mark unsubmitted run");
            }
            return Err(e);
        }

        self.workflow_id = Some(workflow_id);
        self.was_run = true;
        Ok(workflow_id)
    }

    /// Request that the bound workflow stop. Finished workflows are left as they are.
    pub fn cancel(&self) -> Result<()> {
        let record = self.record()?.ok_or(PipelineError::NotRunYet)?;
        if record.state.is_terminal() {
            tracing::debug!(workflow_id = %record.id, state = %record.state, "Cancel ignored for finished workflow");
            return Ok(());
        }

        if self.ctx.queue.request_abort(&record.task_handle) {
            tracing::info!(workflow_id = %record.id, "Cancel requested");
            return Ok(());
        }

        // No live unit holds this handle, e.g. after a restart.
        tracing::warn!(
            workflow_id = %record.id,
            task_handle = %record.task_handle,
            "No running task for workflow, marking canceled"
        );
        let mut cancel = |r: &mut WorkflowRecord| r.transition(WorkflowState::Canceled);
        self.ctx.repo.modify(record.id, &mut cancel)?;
        Ok(())
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.record()?.is_some())
    }

    pub fn is_owned_by(&self, owner: &str) -> Result<bool> {
        let record = self.record()?.ok_or(PipelineError::NotRunYet)?;
        Ok(record.created_by == owner)
    }

    /// The record merged with live status of each sub-job.
    pub async fn get_detail(&self, token: &str) -> Result<WorkflowDetail> {
        let record = self.record()?.ok_or_else(|| {
            PipelineError::WorkflowNotFound(
                self.workflow_id.map(|id| id.to_string()).unwrap_or_default(),
            )
        })?;
        let jobs = self.ctx.jobs.get_detail_list(&record.job_ids, token).await;
        Ok(WorkflowDetail::from_record(&record, jobs))
    }

    fn record(&self) -> Result<Option<WorkflowRecord>> {
        match self.workflow_id {
            Some(id) => Ok(self.ctx.repo.get_one(&WorkflowFilter::by_id(id))?),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::test_support;
    use std::path::Path;
    use tessera_store::InMemoryWorkflowStore;
    use tessera_types::{JobDetail, JobListItem};

    struct NoDefinitions;

    impl DefinitionResolver for NoDefinitions {
        fn definitions(&self) -> Result<Vec<WorkflowDefinition>> {
            Ok(Vec::new())
        }
    }

    struct NoJobs;

    #[async_trait::async_trait]
    impl JobStatusSource for NoJobs {
        async fn get_detail(&self, _: &str, _: &str) -> Option<JobDetail> {
            None
        }
        async fn get_list_item(&self, _: &str, _: &str) -> Option<JobListItem> {
            None
        }
    }

    fn context(datasets: Vec<DatasetBackend>) -> OrchestratorContext {
        let repo: Arc<dyn WorkflowRepository> = Arc::new(InMemoryWorkflowStore::new());
        let settings = test_support::settings(Path::new("snakemake"), Path::new("/tmp/runs"));
        let executor = TaskExecutor::new(settings, repo.clone(), RunLogDir::new(Path::new("/tmp/logs")));
        OrchestratorContext::new(
            repo,
            Arc::new(NoDefinitions),
            Arc::new(LocalTaskQueue::new(1)),
            Arc::new(executor),
            Arc::new(NoJobs),
            "https://tes.default",
        )
        .with_datasets(datasets)
    }

    #[test]
    fn test_dataset_override_first_match_wins() {
        let ctx = context(vec![
            DatasetBackend {
                execution_url: "https://tes.a".to_string(),
                datasets: vec!["x".to_string(), "y".to_string()],
            },
            DatasetBackend {
                execution_url: "https://tes.b".to_string(),
                datasets: vec!["y".to_string()],
            },
        ]);
        assert_eq!(ctx.resolve_execution_url("x"), "https://tes.a");
        assert_eq!(ctx.resolve_execution_url("y"), "https://tes.a");
        assert_eq!(ctx.resolve_execution_url("z"), "https://tes.default");
    }

    #[test]
    fn test_unbound_orchestrator_has_no_workflow() {
        let ctx = Arc::new(context(Vec::new()));
        let orch = ctx.orchestrator(None).unwrap();
        assert!(!orch.exists().unwrap());
        assert!(matches!(orch.cancel(), Err(PipelineError::NotRunYet)));
        assert!(matches!(orch.is_owned_by("alice"), Err(PipelineError::NotRunYet)));
    }

    #[test]
    fn test_unknown_definition() {
        let ctx = Arc::new(context(Vec::new()));
        let requester = Requester {
            username: "alice".to_string(),
            subject: "alice@example.org".to_string(),
            access_token: "tok".to_string(),
        };
        let err = ctx
            .orchestrator(None)
            .unwrap()
            .run(Uuid::new_v4(), RunParameters::new("a", "b"), &requester)
            .unwrap_err();
        assert!(matches!(err, PipelineError::DefinitionNotFound(_)));
        assert!(ctx.list_for_owner("alice").unwrap().is_empty());
    }
}
