//! Engine entry points: loading sources and opening queries

use crate::error::Result;
use crate::kb::{KnowledgeBase, NativePredicate};
use crate::parser::{self, Line};
use crate::traits::Externals;
use crate::types::{InstanceId, Term};
use crate::vm::{Bindings, Machine};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Rule engine instance
///
/// Shared between threads behind an `Arc`. Queries evaluate against the
/// knowledge base as it was when they were opened; loads and registrations
/// made afterwards are not visible to them.
#[derive(Debug, Default)]
pub struct Engine {
    kb: RwLock<Arc<KnowledgeBase>>,
    inline_queries: Mutex<VecDeque<(String, Term)>>,
    instance_ids: AtomicU64,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a policy source
    ///
    /// The source is parsed completely before anything is added, so a parse
    /// error leaves the knowledge base untouched. Inline queries found in the
    /// source are queued for [`Engine::next_inline_query`].
    pub fn load_str(&self, src: &str, source_name: &str) -> Result<()> {
        let lines = parser::parse_lines(src, source_name)?;

        let mut rules = 0usize;
        let mut queries = Vec::new();
        {
            let mut guard = self.kb.write();
            let kb = Arc::make_mut(&mut *guard);
            for line in lines {
                match line {
                    Line::Rule(rule) => {
                        kb.add_rule(rule);
                        rules += 1;
                    }
                    Line::Query(goal) => queries.push((source_name.to_string(), goal)),
                }
            }
            kb.record_source(source_name);
        }

        debug!(
            source = source_name,
            rules,
            inline_queries = queries.len(),
            "Parsed policy source"
        );
        self.inline_queries.lock().extend(queries);
        Ok(())
    }

    /// Pop the next pending inline query
    pub fn next_inline_query(&self) -> Option<EngineQuery> {
        let (source, goal) = self.inline_queries.lock().pop_front()?;
        trace!(source = %source, goal = %goal, "Running inline query");
        Some(self.new_query_from_term(goal))
    }

    /// Drop every pending inline query without running it
    pub fn discard_inline_queries(&self) -> usize {
        let mut queue = self.inline_queries.lock();
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    /// Parse `src` as a goal and open a query for it
    pub fn new_query(&self, src: &str) -> Result<EngineQuery> {
        let goal = parser::parse_query(src)?;
        Ok(self.new_query_from_term(goal))
    }

    /// Open a query for an already-built goal term
    pub fn new_query_from_term(&self, goal: Term) -> EngineQuery {
        let kb = self.kb.read().clone();
        EngineQuery {
            goal: goal.clone(),
            machine: Machine::new(kb, goal),
        }
    }

    /// Bind `name` to a fixed value for every query opened afterwards
    pub fn register_constant(&self, name: &str, value: Term) {
        let mut kb = self.kb.write();
        Arc::make_mut(&mut *kb).register_constant(name, value);
    }

    /// Install a predicate implemented in Rust
    pub fn register_native(&self, name: &str, native: NativePredicate) {
        let mut kb = self.kb.write();
        Arc::make_mut(&mut *kb).register_native(name, native);
    }

    /// Drop all loaded rules and pending inline queries
    ///
    /// Constants and native predicates survive.
    pub fn clear_rules(&self) {
        {
            let mut kb = self.kb.write();
            Arc::make_mut(&mut *kb).clear_rules();
        }
        self.discard_inline_queries();
    }

    /// Fresh handle identity; never reused within this engine
    pub fn new_instance_id(&self) -> InstanceId {
        InstanceId(self.instance_ids.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn rule_count(&self) -> usize {
        self.kb.read().rule_count()
    }

    /// Names of the loaded sources, in load order
    pub fn sources(&self) -> Vec<String> {
        self.kb.read().sources().to_vec()
    }
}

/// Lazy cursor over the solutions of one goal
#[derive(Debug)]
pub struct EngineQuery {
    goal: Term,
    machine: Machine,
}

impl EngineQuery {
    /// The goal being solved
    pub fn goal(&self) -> &Term {
        &self.goal
    }

    /// Compute the next solution, or `None` once the goal is exhausted
    ///
    /// After an error the query is finished and returns `None` thereafter.
    pub fn next_result(&mut self, ext: &mut dyn Externals) -> Result<Option<Bindings>> {
        self.machine.next_result(ext)
    }
}
