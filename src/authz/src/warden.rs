//! The `Warden` facade: registration, loading and querying

use crate::config::WardenConfig;
use crate::error::{PolarError, Result};
use crate::host::Host;
use crate::loader::{LoadQueue, Source};
use crate::query::Query;
use crate::registry::{ClassRegistry, Constructor, TypeDescriptor};
use crate::roles::{RoleResolver, ROLES_PRELUDE, ROLES_SOURCE_NAME, ROLE_INHERITS};
use crate::value::{HostValue, PolarObject};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_core::{Engine, Term};

/// Authorization policy engine hosted by the application
///
/// `Warden` is `Send + Sync`: share it behind an `Arc` and query from any
/// thread. Registration is not synchronized with queries already running;
/// a query sees the classes and constants registered before it was opened.
pub struct Warden {
    engine: Arc<Engine>,
    registry: ClassRegistry,
    /// Handles for registered constants; every query starts from a clone
    root: Mutex<Host>,
    queue: Mutex<LoadQueue>,
    /// Held while a source loads and its inline queries run
    loading: Mutex<()>,
    /// Held for a whole queue flush so no query starts before it completes
    flushing: Mutex<()>,
    roles: RoleResolver,
    config: WardenConfig,
}

impl Warden {
    /// Engine with the default configuration
    pub fn new() -> Self {
        let config = WardenConfig::default();
        let engine = Arc::new(Engine::new());
        let registry = ClassRegistry::new();
        let root = Host::new(Arc::clone(&engine), registry.snapshot());
        let roles = RoleResolver::new();
        engine.register_native(ROLE_INHERITS, roles.native());
        Self {
            engine,
            registry,
            root: Mutex::new(root),
            queue: Mutex::new(LoadQueue::new()),
            loading: Mutex::new(()),
            flushing: Mutex::new(()),
            roles,
            config,
        }
    }

    pub fn with_config(config: WardenConfig) -> Result<Self> {
        config.validate()?;
        let mut warden = Self::new();
        warden.config = config;
        warden.load_prelude()?;
        Ok(warden)
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn role_resolver(&self) -> &RoleResolver {
        &self.roles
    }

    /// Register a class under `name`
    ///
    /// Fails with `DuplicateRegistration` when `name` is bound to a
    /// different type; registering the same type again rebinds it.
    pub fn register(
        &self,
        name: &str,
        descriptor: TypeDescriptor,
        constructor: Option<Constructor>,
    ) -> Result<()> {
        self.registry.register(name, descriptor, constructor)
    }

    /// Register `T` so policies can specialize on `name`
    pub fn register_class<T: PolarObject>(&self, name: &str) -> Result<()> {
        self.registry.register_type::<T>(name)
    }

    /// Register `T` with a constructor, enabling `Name{field: value}` literals
    pub fn register_class_with_constructor<T, F>(&self, name: &str, constructor: F) -> Result<()>
    where
        T: PolarObject,
        F: Fn(BTreeMap<String, HostValue>) -> Result<T> + Send + Sync + 'static,
    {
        self.registry.register_type_with_constructor(name, constructor)
    }

    /// Bind `name` to `value` for every query opened afterwards
    pub fn register_constant(&self, name: &str, value: impl Into<HostValue>) -> Result<()> {
        let value = value.into();
        if let HostValue::Variable(var) = &value {
            return Err(PolarError::Marshal(format!(
                "constant `{}` cannot be bound to variable `{}`",
                name, var
            )));
        }
        let term = self.root.lock().to_term(&value);
        debug!(constant = name, value = %term, "Registered constant");
        self.engine.register_constant(name, term);
        Ok(())
    }

    /// Queue a policy file for loading before the next query
    ///
    /// The file is read now; re-queuing the same path replaces the queued
    /// contents.
    pub fn enqueue_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let source = Source::from_file(path.as_ref(), &self.config.source_extension)?;
        let replaced = self.queue.lock().push(source);
        debug!(path = %path.as_ref().display(), replaced, "Queued policy file");
        Ok(())
    }

    /// Load policy text directly, then run its inline queries
    ///
    /// Sources without a name get a unique anonymous one. If an inline query
    /// has no solutions the source's rules stay loaded, its remaining inline
    /// queries are dropped, and `InlineQueryFailed` is returned.
    pub fn load_str(&self, text: &str, name: Option<&str>) -> Result<()> {
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("<anonymous-{}>", Uuid::new_v4()));
        let _loading = self.loading.lock();
        self.engine.load_str(text, &name)?;
        info!(source = %name, rules = self.engine.rule_count(), "Loaded policy source");

        if !self.config.inline_queries {
            self.engine.discard_inline_queries();
            return Ok(());
        }
        self.check_inline_queries(&name)
    }

    /// Load every queued file in the order first queued
    ///
    /// The queue is emptied even when a load fails; entries after the
    /// failing one are discarded. A caller that finds another flush in
    /// progress waits for it to finish.
    pub fn flush_queue(&self) -> Result<()> {
        let _flushing = self.flushing.lock();
        let sources = self.queue.lock().take();
        if sources.is_empty() {
            return Ok(());
        }
        info!(count = sources.len(), "Loading queued policy files");

        let mut remaining = sources.into_iter();
        while let Some(source) = remaining.next() {
            if let Err(err) = self.load_str(&source.text, Some(&source.name)) {
                let discarded: Vec<String> = remaining.by_ref().map(|s| s.name).collect();
                if !discarded.is_empty() {
                    warn!(failed = %source.name, ?discarded, "Discarding queued policy files after failed load");
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Drop loaded rules and queued files; registrations are kept
    pub fn clear(&self) -> Result<()> {
        self.queue.lock().clear();
        self.engine.clear_rules();
        self.roles.invalidate_cache();
        info!("Cleared loaded policies");
        self.load_prelude()
    }

    /// Open a query for a goal written in policy syntax
    pub fn query(&self, goal: &str) -> Result<Query> {
        self.flush_queue()?;
        let host = self.context();
        let inner = self.engine.new_query(goal)?;
        Ok(Query::new(inner, host))
    }

    /// Open a query for `name(args...)`
    pub fn query_rule(&self, name: &str, args: Vec<HostValue>) -> Result<Query> {
        self.flush_queue()?;
        let mut host = self.context();
        let args = args.iter().map(|arg| host.to_term(arg)).collect();
        let inner = self.engine.new_query_from_term(Term::call(name, args));
        Ok(Query::new(inner, host))
    }

    /// Whether `allow(actor, action, resource)` has at least one solution
    pub fn is_allowed(
        &self,
        actor: impl Into<HostValue>,
        action: impl Into<HostValue>,
        resource: impl Into<HostValue>,
    ) -> Result<bool> {
        let mut query =
            self.query_rule("allow", vec![actor.into(), action.into(), resource.into()])?;
        query.has_next()
    }

    /// Interactive loop: one goal per line
    ///
    /// Prints each binding set on its own line as soon as it is found, or
    /// `False` for a goal without solutions. Errors are printed and the loop
    /// continues.
    pub fn repl<R: BufRead, W: Write>(&self, input: R, mut output: W) -> Result<()> {
        self.flush_queue()?;
        let io_err = |source: std::io::Error| PolarError::Io {
            path: "<repl>".to_string(),
            source,
        };
        for line in input.lines() {
            let line = line.map_err(io_err)?;
            let goal = line.trim();
            if goal.is_empty() || goal.starts_with('#') {
                continue;
            }
            let results = match self.query(goal) {
                Ok(query) => query.results(),
                Err(err) => {
                    writeln!(output, "Error: {}", err).map_err(io_err)?;
                    continue;
                }
            };
            let mut found = false;
            for bindings in results {
                match bindings {
                    Ok(bindings) => {
                        found = true;
                        writeln!(output, "{}", bindings).map_err(io_err)?;
                        output.flush().map_err(io_err)?;
                    }
                    Err(err) => {
                        writeln!(output, "Error: {}", err).map_err(io_err)?;
                        found = true;
                    }
                }
            }
            if !found {
                writeln!(output, "False").map_err(io_err)?;
            }
        }
        output.flush().map_err(io_err)
    }

    /// Clone of the root context with the current class table
    fn context(&self) -> Host {
        let mut root = self.root.lock();
        root.set_classes(self.registry.snapshot());
        root.clone()
    }

    fn check_inline_queries(&self, source_name: &str) -> Result<()> {
        while let Some(inline) = self.engine.next_inline_query() {
            let goal = inline.goal().to_string();
            let mut query = Query::new(inline, self.context());
            let passed = match query.has_next() {
                Ok(passed) => passed,
                Err(err) => {
                    self.engine.discard_inline_queries();
                    return Err(err);
                }
            };
            if !passed {
                let dropped = self.engine.discard_inline_queries();
                warn!(source = source_name, query = %goal, dropped, "Inline query failed");
                return Err(PolarError::InlineQueryFailed {
                    source_name: source_name.to_string(),
                    query: goal,
                });
            }
        }
        Ok(())
    }

    fn load_prelude(&self) -> Result<()> {
        if self.config.enable_roles {
            self.load_str(ROLES_PRELUDE, Some(ROLES_SOURCE_NAME))?;
        }
        Ok(())
    }
}

impl Default for Warden {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Warden {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warden")
            .field("rules", &self.engine.rule_count())
            .field("queued", &self.queue.lock().len())
            .field("config", &self.config)
            .finish()
    }
}
