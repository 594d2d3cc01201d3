//! Workflow and activity registration.
//!
//! Definitions are registered by name before the worker starts and
//! resolved by the replay driver when a `WorkflowExecutionStarted` event
//! names a workflow type.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use windlass_core::WindlassResult;
use windlass_workflow::WorkflowContext;

/// Boxed future returned by a workflow function.
pub type WorkflowResultFuture = Pin<Box<dyn Future<Output = WindlassResult<Vec<u8>>> + Send>>;

/// A registered workflow: takes the context handle and the start input,
/// returns the workflow result.
pub type WorkflowFunction =
    Arc<dyn Fn(WorkflowContext, Option<Vec<u8>>) -> WorkflowResultFuture + Send + Sync>;

/// A registered activity: takes the input payload, returns the result.
/// Execution happens on the activity worker, outside this crate; the
/// registry only resolves names for local activities and validation.
pub type ActivityFunction = Arc<dyn Fn(Option<Vec<u8>>) -> WindlassResult<Vec<u8>> + Send + Sync>;

/// Registration options.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    /// Register under this name instead of the one passed to `register_*`.
    pub name: Option<String>,
    /// Allow re-registering an existing name, last registration wins.
    pub disable_already_registered_check: bool,
    /// Also resolve by the short name (the part after the last `.` or
    /// `/`), for histories recorded by package-qualifying SDKs.
    pub enable_short_name: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("workflow type \"{0}\" is already registered")]
    WorkflowAlreadyRegistered(String),
    #[error("activity type \"{0}\" is already registered")]
    ActivityAlreadyRegistered(String),
}

#[derive(Default)]
struct RegistryInner {
    workflows: HashMap<String, WorkflowFunction>,
    workflow_aliases: HashMap<String, String>,
    activities: HashMap<String, ActivityFunction>,
    activity_aliases: HashMap<String, String>,
}

/// Name-keyed store of workflow and activity definitions.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<RegistryInner>,
}

fn short_name(name: &str) -> &str {
    name.rsplit(['.', '/']).next().unwrap_or(name)
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_workflow<F, Fut>(&self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(WorkflowContext, Option<Vec<u8>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WindlassResult<Vec<u8>>> + Send + 'static,
    {
        self.register_workflow_with_options(name, f, RegisterOptions::default())
    }

    pub fn register_workflow_with_options<F, Fut>(
        &self,
        name: &str,
        f: F,
        options: RegisterOptions,
    ) -> Result<(), RegistryError>
    where
        F: Fn(WorkflowContext, Option<Vec<u8>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WindlassResult<Vec<u8>>> + Send + 'static,
    {
        let registered_name = options.name.clone().unwrap_or_else(|| name.to_string());
        let function: WorkflowFunction = Arc::new(move |ctx, input| Box::pin(f(ctx, input)));

        let mut inner = self.inner.write().unwrap();
        if !options.disable_already_registered_check
            && inner.workflows.contains_key(&registered_name)
        {
            return Err(RegistryError::WorkflowAlreadyRegistered(registered_name));
        }
        if options.enable_short_name {
            inner
                .workflow_aliases
                .insert(short_name(&registered_name).to_string(), registered_name.clone());
        }
        inner.workflows.insert(registered_name, function);
        Ok(())
    }

    pub fn get_workflow(&self, name: &str) -> Option<WorkflowFunction> {
        let inner = self.inner.read().unwrap();
        if let Some(f) = inner.workflows.get(name) {
            return Some(f.clone());
        }
        inner
            .workflow_aliases
            .get(short_name(name))
            .and_then(|full| inner.workflows.get(full))
            .cloned()
    }

    pub fn register_activity<F>(&self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(Option<Vec<u8>>) -> WindlassResult<Vec<u8>> + Send + Sync + 'static,
    {
        self.register_activity_with_options(name, f, RegisterOptions::default())
    }

    pub fn register_activity_with_options<F>(
        &self,
        name: &str,
        f: F,
        options: RegisterOptions,
    ) -> Result<(), RegistryError>
    where
        F: Fn(Option<Vec<u8>>) -> WindlassResult<Vec<u8>> + Send + Sync + 'static,
    {
        let registered_name = options.name.clone().unwrap_or_else(|| name.to_string());
        let function: ActivityFunction = Arc::new(f);

        let mut inner = self.inner.write().unwrap();
        if !options.disable_already_registered_check
            && inner.activities.contains_key(&registered_name)
        {
            return Err(RegistryError::ActivityAlreadyRegistered(registered_name));
        }
        if options.enable_short_name {
            inner
                .activity_aliases
                .insert(short_name(&registered_name).to_string(), registered_name.clone());
        }
        inner.activities.insert(registered_name, function);
        Ok(())
    }

    pub fn get_activity(&self, name: &str) -> Option<ActivityFunction> {
        let inner = self.inner.read().unwrap();
        if let Some(f) = inner.activities.get(name) {
            return Some(f.clone());
        }
        inner
            .activity_aliases
            .get(short_name(name))
            .and_then(|full| inner.activities.get(full))
            .cloned()
    }

    pub fn registered_workflows(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().unwrap().workflows.keys().cloned().collect();
        names.sort();
        names
    }
}
