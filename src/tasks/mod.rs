//! Task registrar.
//!
//! Bindings register tasks by name with a configuration action. Nothing runs
//! at registration: the action is deferred until the task is realized, either
//! explicitly or because a lazy model value derived from the task is read.
//! Executing tasks is the host's business and happens after configuration.

pub mod naming;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::Identifier;
use crate::model::{LazyModelValue, ModelError, ModelValue, TaskRef};
use crate::sources::SourceDirectorySet;

pub use naming::{capitalize, task_name};

/// Error raised by the task registrar.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum TaskError {
    #[error("task `{name}` is already registered in `{project}`")]
    #[diagnostic(
        code(quay::tasks::duplicate_task),
        help("task names come from `task_name(verb, source_set, noun)`; check for two plugins using the same verb and noun")
    )]
    DuplicateTask { project: String, name: String },

    #[error("task `{name}` is not registered in `{project}`")]
    #[diagnostic(code(quay::tasks::unknown_task))]
    UnknownTask { project: String, name: String },

    #[error("`{name}` is not a valid task name")]
    #[diagnostic(code(quay::tasks::invalid_name))]
    InvalidName { name: String },

    #[error("configuring task `{project}:{name}` failed: {message}")]
    #[diagnostic(code(quay::tasks::configuration_failed))]
    Configuration {
        project: String,
        name: String,
        message: String,
    },
}

type TaskAction = Box<dyn FnOnce(&mut TaskSpec) -> anyhow::Result<()> + Send>;

/// The configured state of a task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    name: String,
    task_type: String,
    description: Option<String>,
    sources: Vec<SourceDirectorySet>,
    inputs: Vec<LazyModelValue<ModelValue>>,
    output_dir: Option<PathBuf>,
    output_file: Option<PathBuf>,
    properties: BTreeMap<String, ModelValue>,
}

impl TaskSpec {
    fn new(name: &str, task_type: &str) -> Self {
        TaskSpec {
            name: name.to_string(),
            task_type: task_type.to_string(),
            description: None,
            sources: Vec::new(),
            inputs: Vec::new(),
            output_dir: None,
            output_file: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Add a source directory set the task reads.
    pub fn source(&mut self, sources: SourceDirectorySet) {
        self.sources.push(sources);
    }

    pub fn sources(&self) -> &[SourceDirectorySet] {
        &self.sources
    }

    /// Add an input produced elsewhere.
    pub fn input<T>(&mut self, value: &LazyModelValue<T>)
    where
        T: Into<ModelValue> + Clone + Send + Sync + 'static,
    {
        self.inputs.push(value.map(Into::into));
    }

    pub fn inputs(&self) -> &[LazyModelValue<ModelValue>] {
        &self.inputs
    }

    /// Resolve every lazy input.
    pub fn resolved_inputs(&self) -> Result<Vec<ModelValue>, ModelError> {
        self.inputs.iter().map(LazyModelValue::get).collect()
    }

    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.output_dir = Some(dir.into());
    }

    pub fn output_dir(&self) -> Option<&PathBuf> {
        self.output_dir.as_ref()
    }

    pub fn set_output_file(&mut self, file: impl Into<PathBuf>) {
        self.output_file = Some(file.into());
    }

    pub fn output_file(&self) -> Option<&PathBuf> {
        self.output_file.as_ref()
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<ModelValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&ModelValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, ModelValue> {
        &self.properties
    }
}

enum TaskState {
    Pending(Vec<TaskAction>),
    Realized(TaskSpec),
    Failed(String),
}

struct TaskSlot {
    project: String,
    name: String,
    task_type: String,
    state: Mutex<TaskState>,
}

impl TaskSlot {
    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failure(&self, message: String) -> TaskError {
        TaskError::Configuration {
            project: self.project.clone(),
            name: self.name.clone(),
            message,
        }
    }
}

/// Deferred handle to a registered task.
#[derive(Clone)]
pub struct TaskHandle {
    slot: Arc<TaskSlot>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    pub fn task_type(&self) -> &str {
        &self.slot.task_type
    }

    pub fn project(&self) -> &str {
        &self.slot.project
    }

    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            project: self.slot.project.clone(),
            name: self.slot.name.clone(),
        }
    }

    pub fn is_realized(&self) -> bool {
        matches!(*self.slot.lock(), TaskState::Realized(_))
    }

    /// Add a configuration action.
    ///
    /// Runs immediately if the task is already realized.
    pub fn configure<F>(&self, action: F) -> Result<(), TaskError>
    where
        F: FnOnce(&mut TaskSpec) -> anyhow::Result<()> + Send + 'static,
    {
        let mut state = self.slot.lock();
        match &mut *state {
            TaskState::Pending(actions) => {
                actions.push(Box::new(action));
                Ok(())
            }
            TaskState::Realized(spec) => {
                action(spec).map_err(|e| self.slot.failure(format!("{:#}", e)))
            }
            TaskState::Failed(message) => Err(self.slot.failure(message.clone())),
        }
    }

    /// Run the pending configuration actions and return the configured task.
    pub fn realize(&self) -> Result<TaskSpec, TaskError> {
        self.with_spec(TaskSpec::clone)
    }

    /// Realize the task and inspect its configuration.
    pub fn with_spec<R>(&self, f: impl FnOnce(&TaskSpec) -> R) -> Result<R, TaskError> {
        let mut state = self.slot.lock();

        if let TaskState::Pending(actions) = &mut *state {
            let actions = std::mem::take(actions);
            let mut spec = TaskSpec::new(&self.slot.name, &self.slot.task_type);

            tracing::debug!("realizing task {}:{}", self.slot.project, self.slot.name);

            for action in actions {
                if let Err(e) = action(&mut spec) {
                    let message = format!("{:#}", e);
                    *state = TaskState::Failed(message.clone());
                    return Err(self.slot.failure(message));
                }
            }
            *state = TaskState::Realized(spec);
        }

        match &*state {
            TaskState::Realized(spec) => Ok(f(spec)),
            TaskState::Failed(message) => Err(self.slot.failure(message.clone())),
            TaskState::Pending(_) => Err(self.slot.failure("task was not realized".to_string())),
        }
    }

    /// A lazy value computed from the configured task.
    ///
    /// Reading the value realizes the task.
    pub fn map<T, F>(&self, f: F) -> LazyModelValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&TaskSpec) -> T + Send + Sync + 'static,
    {
        self.try_map(move |spec| Ok(f(spec)))
    }

    /// Like [`map`](Self::map), with a fallible transform.
    pub fn try_map<T, F>(&self, f: F) -> LazyModelValue<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&TaskSpec) -> Result<T, ModelError> + Send + Sync + 'static,
    {
        let handle = self.clone();
        let description = format!("{}:{}.map", self.slot.project, self.slot.name);
        let value_name = description.clone();

        LazyModelValue::from_producer(description, move || {
            handle
                .with_spec(|spec| f(spec))
                .map_err(|e| ModelError::Producer {
                    value: value_name.clone(),
                    source: e.into(),
                })?
        })
    }

    /// The task's output directory, once configured.
    pub fn output_dir(&self) -> LazyModelValue<PathBuf> {
        let task = self.slot.name.clone();
        self.try_map(move |spec| {
            spec.output_dir().cloned().ok_or_else(|| ModelError::Producer {
                value: format!("{}.outputDir", task),
                source: anyhow::anyhow!("task has no output directory"),
            })
        })
    }

    /// The task's output file, once configured.
    pub fn output_file(&self) -> LazyModelValue<PathBuf> {
        let task = self.slot.name.clone();
        self.try_map(move |spec| {
            spec.output_file().cloned().ok_or_else(|| ModelError::Producer {
                value: format!("{}.outputFile", task),
                source: anyhow::anyhow!("task has no output file"),
            })
        })
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("project", &self.slot.project)
            .field("name", &self.slot.name)
            .field("type", &self.slot.task_type)
            .field("realized", &self.is_realized())
            .finish()
    }
}

/// Per-project table of registered tasks.
pub struct TaskRegistrar {
    project: String,
    tasks: RwLock<BTreeMap<String, TaskHandle>>,
}

impl TaskRegistrar {
    pub fn new(project: impl Into<String>) -> Self {
        TaskRegistrar {
            project: project.into(),
            tasks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a task with a deferred configuration action.
    pub fn register<F>(
        &self,
        name: impl Into<String>,
        task_type: &str,
        action: F,
    ) -> Result<TaskHandle, TaskError>
    where
        F: FnOnce(&mut TaskSpec) -> anyhow::Result<()> + Send + 'static,
    {
        let name = name.into();
        if !Identifier::is_valid_str(&name) {
            return Err(TaskError::InvalidName { name });
        }

        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if tasks.contains_key(&name) {
            return Err(TaskError::DuplicateTask {
                project: self.project.clone(),
                name,
            });
        }

        let handle = TaskHandle {
            slot: Arc::new(TaskSlot {
                project: self.project.clone(),
                name: name.clone(),
                task_type: task_type.to_string(),
                state: Mutex::new(TaskState::Pending(vec![Box::new(action)])),
            }),
        };

        tracing::debug!("registered task {}:{} ({})", self.project, name, task_type);
        tasks.insert(name, handle.clone());
        Ok(handle)
    }

    /// Look up a registered task.
    pub fn named(&self, name: &str) -> Result<TaskHandle, TaskError> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| TaskError::UnknownTask {
                project: self.project.clone(),
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Realize every task, sorted by name.
    pub fn realize_all(&self) -> Result<Vec<TaskSpec>, TaskError> {
        let handles: Vec<TaskHandle> = self
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        handles.iter().map(TaskHandle::realize).collect()
    }
}

impl fmt::Debug for TaskRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistrar")
            .field("project", &self.project)
            .field("tasks", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_registration_is_deferred() {
        let registrar = TaskRegistrar::new(":app");
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let handle = registrar
            .register("compileMainJava", "JavaCompile", move |task| {
                counter.fetch_add(1, Ordering::SeqCst);
                task.set_output_dir("build/classes/java/main");
                Ok(())
            })
            .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!handle.is_realized());

        let spec = handle.realize().unwrap();
        handle.realize().unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(spec.output_dir(), Some(&PathBuf::from("build/classes/java/main")));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let registrar = TaskRegistrar::new(":app");
        registrar.register("jar", "Jar", |_| Ok(())).unwrap();

        let err = registrar.register("jar", "Jar", |_| Ok(())).unwrap_err();
        assert!(matches!(err, TaskError::DuplicateTask { .. }));
        assert_eq!(registrar.len(), 1);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let registrar = TaskRegistrar::new(":app");
        let err = registrar.register("compile main", "JavaCompile", |_| Ok(())).unwrap_err();
        assert!(matches!(err, TaskError::InvalidName { .. }));
    }

    #[test]
    fn test_map_realizes_on_read() {
        let registrar = TaskRegistrar::new(":app");
        let handle = registrar
            .register("checkstyleMain", "Checkstyle", |task| {
                task.set_output_dir("build/reports/checkstyle/main");
                Ok(())
            })
            .unwrap();

        let reports = handle.output_dir();
        assert!(!handle.is_realized());

        assert_eq!(reports.get().unwrap(), PathBuf::from("build/reports/checkstyle/main"));
        assert!(handle.is_realized());
    }

    #[test]
    fn test_missing_output_fails_read() {
        let registrar = TaskRegistrar::new(":app");
        let handle = registrar.register("jar", "Jar", |_| Ok(())).unwrap();

        assert!(matches!(
            handle.output_file().get(),
            Err(ModelError::Producer { .. })
        ));
    }

    #[test]
    fn test_failed_configuration_is_sticky() {
        let registrar = TaskRegistrar::new(":app");
        let handle = registrar
            .register("generateMainSources", "AntlrTask", |_| {
                anyhow::bail!("grammar directory missing")
            })
            .unwrap();

        let first = handle.realize().unwrap_err();
        assert!(first.to_string().contains("grammar directory missing"));
        assert!(handle.realize().is_err());
        assert!(handle.configure(|_| Ok(())).is_err());
    }

    #[test]
    fn test_failed_task_keeps_cause_in_value_error() {
        let registrar = TaskRegistrar::new(":app");
        let handle = registrar
            .register("generateMainSources", "AntlrTask", |_| {
                anyhow::bail!("grammar directory missing")
            })
            .unwrap();

        let err = handle.output_dir().get().unwrap_err();
        assert!(matches!(err, ModelError::Producer { .. }));
        assert!(std::error::Error::source(&err).is_some());

        let rendered = format!("{:#}", anyhow::Error::from(err));
        assert!(rendered.contains("computing `:app:generateMainSources.map` failed"));
        assert!(rendered.contains("grammar directory missing"));
    }

    #[test]
    fn test_configure_after_realize_runs_immediately() {
        let registrar = TaskRegistrar::new(":app");
        let handle = registrar.register("jar", "Jar", |_| Ok(())).unwrap();
        handle.realize().unwrap();

        handle
            .configure(|task| {
                task.set_property("reproducible", true);
                Ok(())
            })
            .unwrap();

        let spec = handle.realize().unwrap();
        assert_eq!(spec.property("reproducible"), Some(&ModelValue::Bool(true)));
    }

    #[test]
    fn test_realize_all_sorted() {
        let registrar = TaskRegistrar::new(":app");
        registrar.register("jar", "Jar", |_| Ok(())).unwrap();
        registrar.register("compileMainJava", "JavaCompile", |_| Ok(())).unwrap();

        let names: Vec<_> = registrar
            .realize_all()
            .unwrap()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["compileMainJava", "jar"]);
    }
}
