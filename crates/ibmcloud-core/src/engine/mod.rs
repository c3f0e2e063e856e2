//! Lifecycle engine
//!
//! The Engine is responsible for:
//! - Ordering blocks by their references and `depends_on`
//! - Refreshing known objects before deciding what to change
//! - Calling resource adapters with per-operation deadlines
//! - Persisting state after every successful operation
//! - Deleting objects that left the configuration
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │ Configuration │─── blocks ───┐
//! └───────────────┘              │
//!                                ▼
//!                       ┌──────────────┐
//!                       │    Engine    │── waves (JoinSet + Semaphore)
//!                       └──────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//! ┌──────────────┐      ┌────────────────┐      ┌─────────────┐
//! │  StateStore  │      │ Resource /     │      │   Events    │
//! │ (get / put)  │      │ DataSource     │      │  (notify)   │
//! └──────────────┘      └────────────────┘      └─────────────┘
//! ```
//!
//! ## Per-block flow
//!
//! 1. Substitute references with attributes of already applied blocks
//! 2. Apply schema defaults and validate
//! 3. Read the prior object (gone means it will be created again)
//! 4. Diff desired against current: create, update, replace or leave alone
//! 5. On success, write the state record and emit an event

pub mod graph;

use crate::config::EngineConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::document::{BlockConfig, Configuration};
use crate::error::{Error, Result};
use crate::registry::ResourceRegistry;
use crate::resource_data::ResourceData;
use crate::schema::{Schema, is_unknown};
use crate::timeouts::Timeouts;
use crate::traits::{Mode, Resource, ResourceState, StateStore};
use graph::Known;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Events emitted by the Engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A create, update, replace, delete or read is about to start
    OperationStarted { address: String, action: String },

    ResourceCreated { address: String, id: String },

    ResourceUpdated {
        address: String,
        id: String,
        changed: Vec<String>,
    },

    /// Destroyed and created again because a force-new attribute changed
    ResourceReplaced { address: String, id: String },

    ResourceDeleted { address: String, id: String },

    /// Desired and current attributes already match
    ResourceUnchanged { address: String },

    /// A refresh found the remote object missing
    ResourceVanished { address: String },

    DataSourceRead { address: String, id: String },

    OperationFailed { address: String, error: String },

    /// Not attempted, e.g. because a dependency failed
    OperationSkipped { address: String, reason: String },

    /// Apply, refresh or destroy finished
    Completed { succeeded: bool },
}

/// What the engine intends to do with one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    Update(Vec<String>),
    Replace(Vec<String>),
    Delete,
    Read,
    NoOp,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update(_) => "update",
            Action::Replace(_) => "replace",
            Action::Delete => "delete",
            Action::Read => "read",
            Action::NoOp => "no-op",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    pub address: String,
    pub action: Action,
}

/// Result of [`Engine::plan`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub actions: Vec<PlannedAction>,
}

impl Plan {
    pub fn get(&self, address: &str) -> Option<&Action> {
        self.actions
            .iter()
            .find(|a| a.address == address)
            .map(|a| &a.action)
    }

    /// True if applying would change anything remote
    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|a| !matches!(a.action, Action::NoOp | Action::Read))
    }

    /// (to add, to change, to destroy); a replacement counts as add and destroy
    pub fn counts(&self) -> (usize, usize, usize) {
        self.actions
            .iter()
            .fold((0, 0, 0), |(add, change, destroy), a| match a.action {
                Action::Create => (add + 1, change, destroy),
                Action::Update(_) => (add, change + 1, destroy),
                Action::Replace(_) => (add + 1, change, destroy + 1),
                Action::Delete => (add, change, destroy + 1),
                Action::Read | Action::NoOp => (add, change, destroy),
            })
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for planned in &self.actions {
            match &planned.action {
                Action::NoOp => continue,
                Action::Update(keys) | Action::Replace(keys) => writeln!(
                    f,
                    "  {} {} ({})",
                    planned.action.label(),
                    planned.address,
                    keys.join(", ")
                )?,
                action => writeln!(f, "  {} {}", action.label(), planned.address)?,
            }
        }
        let (add, change, destroy) = self.counts();
        write!(
            f,
            "Plan: {} to add, {} to change, {} to destroy.",
            add, change, destroy
        )
    }
}

/// Outcome of [`Engine::apply`], [`Engine::refresh`] and [`Engine::destroy`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub replaced: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
    /// Data sources read, or managed objects refreshed
    pub read: Vec<String>,
    pub vanished: Vec<String>,
    /// (address, error message)
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} added, {} changed, {} replaced, {} destroyed, {} failed",
            self.created.len(),
            self.updated.len(),
            self.replaced.len(),
            self.deleted.len(),
            self.failed.len()
        )
    }

    fn record(&mut self, address: String, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created.push(address),
            Outcome::Updated => self.updated.push(address),
            Outcome::Replaced => self.replaced.push(address),
            Outcome::Unchanged => self.unchanged.push(address),
            Outcome::Read => self.read.push(address),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
    Replaced,
    Unchanged,
    Read,
}

/// Lifecycle engine
///
/// Cloning is cheap: clones share the registry, the state store, the event
/// channel and the cancellation flag.
///
/// ## Concurrency
///
/// Blocks within one dependency wave run concurrently, at most
/// `parallelism` at a time. A wave starts only after the previous one has
/// finished, so a block always sees the applied attributes of everything it
/// references.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<ResourceRegistry>,
    state: Arc<dyn StateStore>,
    config: EngineConfig,
    event_tx: mpsc::Sender<EngineEvent>,
    cancel: Arc<watch::Sender<bool>>,
}

impl Engine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        registry: Arc<ResourceRegistry>,
        state: Arc<dyn StateStore>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let (cancel, _) = watch::channel(false);

        let engine = Self {
            registry,
            state,
            config,
            event_tx: tx,
            cancel: Arc::new(cancel),
        };

        Ok((engine, rx))
    }

    /// Stop starting new operations and abort the ones in flight
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Check a configuration without calling any API
    ///
    /// Reports unknown types, schema violations of literal values, malformed
    /// timeouts and dependency problems. Values that reference other blocks
    /// are checked later, once they are known.
    pub fn validate(&self, config: &Configuration) -> Diagnostics {
        let mut diags = Diagnostics::new();

        for block in &config.blocks {
            let address = block.address();
            let (schema, defaults) = match self.block_schema(block) {
                Ok(found) => found,
                Err(e) => {
                    diags.push(Diagnostic::from(&e).with_attribute(address));
                    continue;
                }
            };

            let mut body = block.body.clone();
            schema.apply_defaults(&mut body);
            for mut diag in schema.validate(&body) {
                diag.attribute = Some(match diag.attribute {
                    Some(attr) => format!("{}.{}", address, attr),
                    None => address.clone(),
                });
                diags.push(diag);
            }

            if let Err(e) = block.timeouts(defaults) {
                diags.push(Diagnostic::from(&e).with_attribute(format!("{}.timeouts", address)));
            }
        }

        if let Err(e) = graph::dependency_waves(&config.blocks) {
            diags.push(Diagnostic::from(&e));
        }
        diags
    }

    /// Compute the actions `apply` would take, without changing anything
    pub async fn plan(&self, config: &Configuration) -> Result<Plan> {
        self.validate(config).into_result()?;
        let waves = graph::dependency_waves(&config.blocks)?;

        let mut known = Known::new();
        let mut plan = Plan::default();

        for wave in waves {
            for i in wave {
                let block = &config.blocks[i];
                let address = block.address();
                let prior = self.state.get(&address).await?;

                let action = match block.mode {
                    Mode::Data => {
                        if let Some(record) = prior {
                            known.insert(address.clone(), record.attributes);
                        }
                        Action::Read
                    }
                    Mode::Managed => {
                        let resource = self.registry.resource(&block.resource_type)?;
                        let schema = resource.schema();
                        let timeouts = block.timeouts(resource.timeouts())?;
                        let mut body = resolve_body(&block.body, &known);
                        schema.apply_defaults(&mut body);

                        let current = match prior {
                            Some(record) if self.config.refresh => self
                                .read_current(resource.as_ref(), &address, &record, timeouts.read)
                                .await?
                                .map(|attrs| (record.id, attrs)),
                            Some(record) => Some((record.id, record.attributes)),
                            None => None,
                        };

                        match current {
                            None => Action::Create,
                            Some((_, attrs)) => {
                                let action = classify(&schema, schema.diff(&body, &attrs));
                                if !matches!(action, Action::Replace(_)) {
                                    let mut projected = attrs;
                                    for (k, v) in body {
                                        if !has_unresolved(&v) {
                                            projected.insert(k, v);
                                        }
                                    }
                                    known.insert(address.clone(), projected);
                                }
                                action
                            }
                        }
                    }
                };
                debug!("Planned {} for {}", action.label(), address);
                plan.actions.push(PlannedAction { address, action });
            }
        }

        let declared: HashSet<String> = config.addresses().into_iter().collect();
        let mut orphans = HashMap::new();
        for address in self.state.list().await? {
            if declared.contains(&address) {
                continue;
            }
            if let Some(record) = self.state.get(&address).await? {
                if record.mode == Mode::Managed {
                    orphans.insert(address, record.dependencies);
                }
            }
        }
        for address in graph::reverse_order(&orphans) {
            plan.actions.push(PlannedAction {
                address,
                action: Action::Delete,
            });
        }

        Ok(plan)
    }

    /// Converge remote objects and state on the configuration
    ///
    /// Failures of individual blocks do not abort the run: they are reported
    /// in [`ApplyReport::failed`] and everything depending on them is skipped.
    ///
    /// - `Err(Error::Validation)`: the configuration is invalid, nothing was touched
    /// - `Err(Error::StateStore)`: state could not be written
    pub async fn apply(&self, config: &Configuration) -> Result<ApplyReport> {
        self.validate(config).into_result()?;
        let waves = graph::dependency_waves(&config.blocks)?;
        info!(
            "Applying {} blocks in {} waves",
            config.blocks.len(),
            waves.len()
        );

        let mut report = ApplyReport::default();
        let mut known = Known::new();
        let mut blocked: HashSet<String> = HashSet::new();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism));

        for wave in waves {
            let mut tasks = JoinSet::new();
            let mut in_flight = HashMap::new();

            for i in wave {
                let block = config.blocks[i].clone();
                let address = block.address();
                let deps: Vec<String> = graph::dependencies(&block).into_iter().collect();

                if self.is_cancelled() {
                    self.skip(&mut report, &mut blocked, address, "cancelled".to_string());
                    continue;
                }
                if let Some(dep) = deps.iter().find(|d| blocked.contains(*d)) {
                    let reason = format!("dependency {} was not applied", dep);
                    self.skip(&mut report, &mut blocked, address, reason);
                    continue;
                }

                let body = resolve_body(&block.body, &known);
                let engine = self.clone();
                let semaphore = semaphore.clone();
                let task_address = address.clone();
                let handle = tasks.spawn(async move {
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => engine.apply_block(&block, body, deps).await,
                        Err(_) => Err(Error::Other("operation pool closed".to_string())),
                    };
                    (task_address, result)
                });
                in_flight.insert(handle.id(), address);
            }

            while let Some(joined) = tasks.join_next_with_id().await {
                let (address, result) = match joined {
                    Ok((_, outcome)) => outcome,
                    Err(e) => {
                        let address = in_flight.remove(&e.id()).unwrap_or_default();
                        (address, Err(Error::Other(format!("apply task failed: {}", e))))
                    }
                };
                match result {
                    Ok((outcome, attributes)) => {
                        report.record(address.clone(), outcome);
                        known.insert(address, attributes);
                    }
                    Err(e) => {
                        error!("{} failed: {}", address, e);
                        self.emit_event(EngineEvent::OperationFailed {
                            address: address.clone(),
                            error: e.to_string(),
                        });
                        report.failed.push((address.clone(), e.to_string()));
                        blocked.insert(address);
                    }
                }
            }
        }

        let declared: HashSet<String> = config.addresses().into_iter().collect();
        let mut orphans = HashMap::new();
        for address in self.state.list().await? {
            if declared.contains(&address) {
                continue;
            }
            let Some(record) = self.state.get(&address).await? else {
                continue;
            };
            match record.mode {
                Mode::Data => self.state.remove(&address).await?,
                Mode::Managed => {
                    orphans.insert(address, record);
                }
            }
        }
        if !orphans.is_empty() {
            info!("Deleting {} objects no longer in configuration", orphans.len());
            self.delete_records(orphans, config, &mut report).await?;
        }

        self.finish(&report).await?;
        info!("Apply complete: {}", report.summary());
        Ok(report)
    }

    /// Read every managed object in state, forgetting the ones that are gone
    pub async fn refresh(&self, config: &Configuration) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for address in self.state.list().await? {
            let Some(record) = self.state.get(&address).await? else {
                continue;
            };
            if record.mode != Mode::Managed {
                continue;
            }
            if self.is_cancelled() {
                report.skipped.push(address);
                continue;
            }

            let result = async {
                let resource = self.registry.resource(&record.resource_type)?;
                let timeouts = match config.find(&address) {
                    Some(block) => block.timeouts(resource.timeouts())?,
                    None => resource.timeouts(),
                };
                self.read_current(resource.as_ref(), &address, &record, timeouts.read)
                    .await
            }
            .await;

            match result {
                Ok(Some(attributes)) => {
                    let refreshed = ResourceState::new(
                        Mode::Managed,
                        record.resource_type.clone(),
                        record.id.clone(),
                        attributes,
                    )
                    .with_dependencies(record.dependencies.clone());
                    self.state.put(&address, &refreshed).await?;
                    report.read.push(address);
                }
                Ok(None) => {
                    warn!("{} no longer exists, removing it from state", address);
                    self.state.remove(&address).await?;
                    self.emit_event(EngineEvent::ResourceVanished {
                        address: address.clone(),
                    });
                    report.vanished.push(address);
                }
                Err(e) => {
                    error!("Refreshing {} failed: {}", address, e);
                    self.emit_event(EngineEvent::OperationFailed {
                        address: address.clone(),
                        error: e.to_string(),
                    });
                    report.failed.push((address, e.to_string()));
                }
            }
        }

        self.finish(&report).await?;
        Ok(report)
    }

    /// Delete every managed object in state, dependents first
    pub async fn destroy(&self, config: &Configuration) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        let mut records = HashMap::new();

        for address in self.state.list().await? {
            let Some(record) = self.state.get(&address).await? else {
                continue;
            };
            match record.mode {
                Mode::Data => self.state.remove(&address).await?,
                Mode::Managed => {
                    records.insert(address, record);
                }
            }
        }

        info!("Destroying {} objects", records.len());
        self.delete_records(records, config, &mut report).await?;
        self.finish(&report).await?;
        Ok(report)
    }

    async fn finish(&self, report: &ApplyReport) -> Result<()> {
        self.state.flush().await?;
        self.emit_event(EngineEvent::Completed {
            succeeded: report.is_success(),
        });
        Ok(())
    }

    fn skip(
        &self,
        report: &mut ApplyReport,
        blocked: &mut HashSet<String>,
        address: String,
        reason: String,
    ) {
        warn!("Skipping {}: {}", address, reason);
        self.emit_event(EngineEvent::OperationSkipped {
            address: address.clone(),
            reason,
        });
        report.skipped.push(address.clone());
        blocked.insert(address);
    }

    fn block_schema(&self, block: &BlockConfig) -> Result<(Schema, Timeouts)> {
        match block.mode {
            Mode::Managed => {
                let resource = self.registry.resource(&block.resource_type)?;
                Ok((resource.schema(), resource.timeouts()))
            }
            Mode::Data => {
                let source = self.registry.data_source(&block.resource_type)?;
                Ok((source.schema(), Timeouts::default()))
            }
        }
    }

    async fn apply_block(
        &self,
        block: &BlockConfig,
        body: Map<String, Value>,
        deps: Vec<String>,
    ) -> Result<(Outcome, Map<String, Value>)> {
        match block.mode {
            Mode::Managed => self.apply_resource(block, body, deps).await,
            Mode::Data => self.read_data_source(block, body, deps).await,
        }
    }

    async fn apply_resource(
        &self,
        block: &BlockConfig,
        mut body: Map<String, Value>,
        deps: Vec<String>,
    ) -> Result<(Outcome, Map<String, Value>)> {
        let address = block.address();
        let resource = self.registry.resource(&block.resource_type)?;
        let schema = resource.schema();
        let timeouts = block.timeouts(resource.timeouts())?;

        schema.apply_defaults(&mut body);
        check_resolved(&address, &body)?;
        schema
            .validate(&body)
            .into_result()
            .map_err(|e| e.wrap(address.clone()))?;

        let current = match self.state.get(&address).await? {
            Some(record) if self.config.refresh => {
                match self
                    .read_current(resource.as_ref(), &address, &record, timeouts.read)
                    .await?
                {
                    Some(attrs) => Some((record.id, attrs)),
                    None => {
                        warn!("{} no longer exists, it will be created again", address);
                        self.state.remove(&address).await?;
                        self.emit_event(EngineEvent::ResourceVanished {
                            address: address.clone(),
                        });
                        None
                    }
                }
            }
            Some(record) => Some((record.id, record.attributes)),
            None => None,
        };

        let Some((id, attrs)) = current else {
            let (id, attributes) = self
                .create(resource.as_ref(), &address, body, &deps, timeouts.create)
                .await?;
            info!("{} created ({})", address, id);
            self.emit_event(EngineEvent::ResourceCreated { address, id });
            return Ok((Outcome::Created, attributes));
        };

        match classify(&schema, schema.diff(&body, &attrs)) {
            Action::Replace(keys) => {
                info!("{} must be replaced, {} changed", address, keys.join(", "));
                self.delete_object(resource.as_ref(), &address, &id, attrs, timeouts.delete)
                    .await?;
                self.state.remove(&address).await?;
                let (id, attributes) = self
                    .create(resource.as_ref(), &address, body, &deps, timeouts.create)
                    .await?;
                self.emit_event(EngineEvent::ResourceReplaced { address, id });
                Ok((Outcome::Replaced, attributes))
            }
            Action::Update(keys) => {
                info!("Updating {} ({})", address, keys.join(", "));
                self.emit_event(EngineEvent::OperationStarted {
                    address: address.clone(),
                    action: "update".to_string(),
                });
                let mut data = ResourceData::from_state(id, attrs).with_changes(body, keys.clone());
                self.run_operation(&address, "update", timeouts.update, resource.update(&mut data))
                    .await?;
                let id = data
                    .id()
                    .map(str::to_string)
                    .ok_or_else(|| Error::not_found(format!("{} disappeared during update", address)))?;
                let attributes = data.into_attributes();
                self.persist(&address, Mode::Managed, resource.type_name(), &id, &attributes, &deps)
                    .await?;
                self.emit_event(EngineEvent::ResourceUpdated {
                    address,
                    id,
                    changed: keys,
                });
                Ok((Outcome::Updated, attributes))
            }
            _ => {
                debug!("{} is up to date", address);
                self.persist(&address, Mode::Managed, resource.type_name(), &id, &attrs, &deps)
                    .await?;
                self.emit_event(EngineEvent::ResourceUnchanged { address });
                Ok((Outcome::Unchanged, attrs))
            }
        }
    }

    async fn read_data_source(
        &self,
        block: &BlockConfig,
        mut body: Map<String, Value>,
        deps: Vec<String>,
    ) -> Result<(Outcome, Map<String, Value>)> {
        let address = block.address();
        let source = self.registry.data_source(&block.resource_type)?;
        let schema = source.schema();
        let timeouts = block.timeouts(Timeouts::default())?;

        schema.apply_defaults(&mut body);
        check_resolved(&address, &body)?;
        schema
            .validate(&body)
            .into_result()
            .map_err(|e| e.wrap(address.clone()))?;

        self.emit_event(EngineEvent::OperationStarted {
            address: address.clone(),
            action: "read".to_string(),
        });
        let mut data = ResourceData::new(body);
        self.run_operation(&address, "read", timeouts.read, source.read(&mut data))
            .await?;
        let id = data
            .id()
            .map(str::to_string)
            .ok_or_else(|| Error::Other(format!("{} read did not set an ID", address)))?;

        let attributes = data.into_attributes();
        self.persist(&address, Mode::Data, source.type_name(), &id, &attributes, &deps)
            .await?;
        debug!("{} read ({})", address, id);
        self.emit_event(EngineEvent::DataSourceRead { address, id });
        Ok((Outcome::Read, attributes))
    }

    async fn create(
        &self,
        resource: &dyn Resource,
        address: &str,
        body: Map<String, Value>,
        deps: &[String],
        limit: Duration,
    ) -> Result<(String, Map<String, Value>)> {
        self.emit_event(EngineEvent::OperationStarted {
            address: address.to_string(),
            action: "create".to_string(),
        });

        let mut data = ResourceData::new(body);
        let result = self
            .run_operation(address, "create", limit, resource.create(&mut data))
            .await;

        if let Err(e) = result {
            // The object may exist remotely even though a later step failed
            if let Some(id) = data.id().map(str::to_string) {
                warn!("{} failed after {} was created, keeping it in state", address, id);
                let attributes = data.into_attributes();
                self.persist(address, Mode::Managed, resource.type_name(), &id, &attributes, deps)
                    .await?;
            }
            return Err(e);
        }

        let id = data
            .id()
            .map(str::to_string)
            .ok_or_else(|| Error::Other(format!("{} create did not set an ID", address)))?;
        let attributes = data.into_attributes();
        self.persist(address, Mode::Managed, resource.type_name(), &id, &attributes, deps)
            .await?;
        Ok((id, attributes))
    }

    async fn delete_object(
        &self,
        resource: &dyn Resource,
        address: &str,
        id: &str,
        attributes: Map<String, Value>,
        limit: Duration,
    ) -> Result<()> {
        self.emit_event(EngineEvent::OperationStarted {
            address: address.to_string(),
            action: "delete".to_string(),
        });
        let mut data = ResourceData::from_state(id, attributes);
        match self
            .run_operation(address, "delete", limit, resource.delete(&mut data))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("{} was already gone", address);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_records(
        &self,
        records: HashMap<String, ResourceState>,
        config: &Configuration,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let order: HashMap<String, Vec<String>> = records
            .iter()
            .map(|(address, record)| (address.clone(), record.dependencies.clone()))
            .collect();
        let mut kept: HashSet<String> = HashSet::new();

        for address in graph::reverse_order(&order) {
            let Some(record) = records.get(&address) else {
                continue;
            };
            if self.is_cancelled() {
                self.skip(report, &mut kept, address, "cancelled".to_string());
                continue;
            }
            if kept.contains(&address) {
                let reason = "an object depending on it could not be deleted".to_string();
                self.skip(report, &mut kept, address, reason);
                kept.extend(record.dependencies.iter().cloned());
                continue;
            }

            let result = async {
                let resource = self.registry.resource(&record.resource_type)?;
                let timeouts = match config.find(&address) {
                    Some(block) => block.timeouts(resource.timeouts())?,
                    None => resource.timeouts(),
                };
                self.delete_object(
                    resource.as_ref(),
                    &address,
                    &record.id,
                    record.attributes.clone(),
                    timeouts.delete,
                )
                .await
            }
            .await;

            match result {
                Ok(()) => {
                    self.state.remove(&address).await?;
                    info!("{} deleted ({})", address, record.id);
                    self.emit_event(EngineEvent::ResourceDeleted {
                        address: address.clone(),
                        id: record.id.clone(),
                    });
                    report.deleted.push(address);
                }
                Err(e) => {
                    error!("Deleting {} failed: {}", address, e);
                    self.emit_event(EngineEvent::OperationFailed {
                        address: address.clone(),
                        error: e.to_string(),
                    });
                    report.failed.push((address, e.to_string()));
                    kept.extend(record.dependencies.iter().cloned());
                }
            }
        }
        Ok(())
    }

    /// Read an existing object; `Ok(None)` when it is gone
    async fn read_current(
        &self,
        resource: &dyn Resource,
        address: &str,
        record: &ResourceState,
        limit: Duration,
    ) -> Result<Option<Map<String, Value>>> {
        let mut data = ResourceData::from_state(record.id.clone(), record.attributes.clone());
        match self
            .run_operation(address, "read", limit, resource.read(&mut data))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_found() => data.clear_id(),
            Err(e) => return Err(e),
        }

        if data.is_gone() {
            Ok(None)
        } else {
            Ok(Some(data.into_attributes()))
        }
    }

    async fn persist(
        &self,
        address: &str,
        mode: Mode,
        resource_type: &str,
        id: &str,
        attributes: &Map<String, Value>,
        deps: &[String],
    ) -> Result<()> {
        let record = ResourceState::new(mode, resource_type, id, attributes.clone())
            .with_dependencies(deps.to_vec());
        self.state.put(address, &record).await
    }

    /// Run one adapter call under its deadline, aborting on cancellation
    async fn run_operation<F>(&self, address: &str, op: &str, limit: Duration, fut: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let cancelled = wait_cancelled(self.cancel.subscribe());
        tokio::select! {
            result = tokio::time::timeout(limit, fut) => match result {
                Ok(result) => result.map_err(|e| e.wrap(format!("{} {}", op, address))),
                Err(_) => Err(Error::timeout(format!(
                    "{} {} did not finish within {}s",
                    op,
                    address,
                    limit.as_secs()
                ))),
            },
            _ = cancelled => Err(Error::Other(format!("{} {} cancelled", op, address))),
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn resolve_body(body: &Map<String, Value>, known: &Known) -> Map<String, Value> {
    body.iter()
        .map(|(k, v)| (k.clone(), graph::resolve(v, known)))
        .collect()
}

fn has_unresolved(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(has_unresolved),
        Value::Object(map) => map.values().any(has_unresolved),
        other => is_unknown(other),
    }
}

fn check_resolved(address: &str, body: &Map<String, Value>) -> Result<()> {
    match body.iter().find(|(_, v)| has_unresolved(v)) {
        Some((key, _)) => Err(Error::validation(format!(
            "{}.{} references a value that is not known",
            address, key
        ))),
        None => Ok(()),
    }
}

fn classify(schema: &Schema, changed: Vec<String>) -> Action {
    if changed.is_empty() {
        return Action::NoOp;
    }
    let replace = changed
        .iter()
        .any(|k| schema.get(k).is_some_and(|attr| attr.force_new));
    if replace {
        Action::Replace(changed)
    } else {
        Action::Update(changed)
    }
}
