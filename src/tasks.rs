//! Deferred execution under a captured identity.
//!
//! Tasks are queued on a channel and run by one background worker. The
//! identity is captured at registration and every command runs through the
//! protected API as that identity, never as the worker. Completion is reported
//! only through the task's key space: `{key}_status` carries the outcome, and
//! `{key}` is set to `true` last.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::config::PollConfig;
use crate::constants::STATUS_SUFFIX;
use crate::engine::Engine;
use crate::error::{err, Error, Result};
use crate::gate::Operation;
use crate::keyspace::KeySpaces;
use crate::protected;
use crate::scope::validate_name;
use crate::subject::Identity;
use crate::view::PropertiesPatch;

/// What a task does, against a view of the task's database
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RenameView { view: String, new_name: String },
    UpdateProperties { view: String, patch: PropertiesPatch, partial: bool },
    DropView { view: String },
}

/// Where a task reports completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionKey {
    pub keyspace: String,
    pub key: String,
}

impl CompletionKey {
    pub fn new(keyspace: impl Into<String>, key: impl Into<String>) -> Self {
        CompletionKey {
            keyspace: keyspace.into(),
            key: key.into(),
        }
    }

    pub fn status_key(&self) -> String {
        format!("{}{}", self.key, STATUS_SUFFIX)
    }
}

/// A unit of deferred work: identity and payload, nothing implicit
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub identity: Identity,
    pub database: String,
    pub command: Command,
    pub completion: CompletionKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: String,
    pub name: String,
}

/// What a caller observes after polling a completion key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Finished { success: bool },
    TimedOut,
}

pub struct Scheduler {
    engine: Engine,
    tx: Option<Sender<Task>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the worker thread
    pub fn start(engine: Engine) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Task>();
        let worker_engine = engine.clone();
        let handle = thread::Builder::new()
            .name("viewgate-tasks".into())
            .spawn(move || worker_loop(worker_engine, rx))
            .map_err(err)?;
        Ok(Scheduler {
            engine,
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue `command` to run later as `identity`.
    ///
    /// Registration itself requires `ReadWrite` on `database`; without it the
    /// call fails with `Forbidden` and nothing is queued.
    pub fn register(
        &self,
        identity: &Identity,
        name: &str,
        database: &str,
        command: Command,
        completion: CompletionKey,
    ) -> Result<TaskHandle> {
        validate_name("database", database)?;
        if !self.engine.catalog().database_exists(database)? {
            return Err(Error::NotFound(format!("database '{}'", database)));
        }
        self.engine.gate().authorize(
            identity,
            &Operation::RegisterTask {
                database: database.to_string(),
            },
        )?;
        let task = Task {
            id: task_id()?,
            name: name.to_string(),
            identity: identity.clone(),
            database: database.to_string(),
            command,
            completion,
        };
        let handle = TaskHandle {
            id: task.id.clone(),
            name: task.name.clone(),
        };
        self.tx
            .as_ref()
            .ok_or_else(|| Error::Conflict("Scheduler closed".into()))?
            .send(task)
            .map_err(|_| Error::Conflict("Scheduler closed".into()))?;
        tracing::debug!(id = %handle.id, name, user = %identity, "task registered");
        Ok(handle)
    }
}

impl Drop for Scheduler {
    /// Close the queue, let the worker drain it, and wait for it
    fn drop(&mut self) {
        self.tx.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn task_id() -> Result<String> {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes).map_err(|e| Error::Storage(e.to_string()))?;
    Ok(format!(
        "task-{}",
        bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()
    ))
}

fn worker_loop(engine: Engine, rx: Receiver<Task>) {
    for task in rx {
        run(&engine, &task);
    }
}

/// Run one task and write its completion flags
fn run(engine: &Engine, task: &Task) {
    let span = tracing::info_span!("task", id = %task.id, name = %task.name, user = %task.identity);
    let _enter = span.enter();
    let outcome = execute(engine, task);
    match &outcome {
        Ok(()) => tracing::debug!("task succeeded"),
        Err(e) => tracing::warn!(error = %e, "task failed"),
    }
    let c = &task.completion;
    let ks = engine.keyspaces();
    // The flag is only set once a status is recorded
    if let Err(e) = ks.set(&c.keyspace, &c.status_key(), outcome.is_ok()) {
        tracing::warn!(error = %e, "could not record task status");
        return;
    }
    if let Err(e) = ks.set(&c.keyspace, &c.key, true) {
        tracing::warn!(error = %e, "could not record task completion");
    }
}

/// Execute the command as the captured identity
pub(crate) fn execute(engine: &Engine, task: &Task) -> Result<()> {
    let who = &task.identity;
    let db = task.database.as_str();
    match &task.command {
        Command::RenameView { view, new_name } => {
            protected::rename_view(engine, who, db, view, new_name).map(|_| ())
        }
        Command::UpdateProperties { view, patch, partial } => {
            protected::update_view_properties(engine, who, db, view, patch, *partial).map(|_| ())
        }
        Command::DropView { view } => protected::drop_view(engine, who, db, view),
    }
}

/// Poll `completion` until its flag appears or the retries run out.
///
/// A timeout is not an error: it is reported as `Completion::TimedOut`,
/// distinct from a task that finished and failed.
pub fn await_completion(keyspaces: &KeySpaces, completion: &CompletionKey, poll: &PollConfig) -> Completion {
    for _ in 0..poll.retries {
        if keyspaces.flag(&completion.keyspace, &completion.key) {
            return Completion::Finished {
                success: keyspaces.flag(&completion.keyspace, &completion.status_key()),
            };
        }
        thread::sleep(poll.interval);
    }
    Completion::TimedOut
}
