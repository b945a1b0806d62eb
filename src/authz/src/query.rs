//! Query driver
//!
//! [`Query`] is an external iterator over the solutions of one goal. It pulls
//! from the engine only when asked, buffers at most one solution, and is not
//! restartable.

use crate::error::{PolarError, Result};
use crate::host::Host;
use crate::value::HostValue;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use warden_core::{EngineQuery, Term};

/// One solution: query variable name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingSet {
    values: BTreeMap<String, HostValue>,
}

impl BindingSet {
    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.values.get(name)
    }

    /// Convert the value bound to `name` into `T`
    ///
    /// Goes through JSON, so instances cannot be extracted this way; use
    /// [`HostValue::as_instance`] for those.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .get(name)
            .ok_or_else(|| PolarError::Marshal(format!("no binding for `{}`", name)))?;
        serde_json::from_value(value.to_json()?)
            .map_err(|e| PolarError::Marshal(format!("binding `{}`: {}", name, e)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HostValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, HostValue> {
        self.values
    }
}

impl fmt::Display for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.values.is_empty() {
            return f.write_str("True");
        }
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", name, value)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
enum QueryState {
    /// Nothing buffered; `has_next` will ask the engine
    Idle,
    Buffered(BindingSet),
    Exhausted,
    Errored,
}

/// Lazy, single-pass sequence of binding sets
///
/// The engine cursor and evaluation context are dropped as soon as the query
/// is exhausted or fails, releasing the application objects it referenced.
#[derive(Debug)]
pub struct Query {
    goal: Term,
    /// `None` once the query is finished
    context: Option<(EngineQuery, Host)>,
    state: QueryState,
    delivered: usize,
}

impl Query {
    pub(crate) fn new(inner: EngineQuery, host: Host) -> Self {
        debug!(goal = %inner.goal(), "Opened query");
        Self {
            goal: inner.goal().clone(),
            context: Some((inner, host)),
            state: QueryState::Idle,
            delivered: 0,
        }
    }

    pub fn goal(&self) -> &Term {
        &self.goal
    }

    /// Whether the evaluation context is still held
    pub fn is_active(&self) -> bool {
        self.context.is_some()
    }

    /// Whether another solution exists, computing it if necessary
    ///
    /// An engine error is returned once; the query is finished afterwards.
    pub fn has_next(&mut self) -> Result<bool> {
        match self.state {
            QueryState::Buffered(_) => return Ok(true),
            QueryState::Exhausted | QueryState::Errored => return Ok(false),
            QueryState::Idle => {}
        }

        match self.pull() {
            Ok(Some(bindings)) => {
                self.state = QueryState::Buffered(bindings);
                Ok(true)
            }
            Ok(None) => {
                debug!(goal = %self.goal, results = self.delivered, "Query exhausted");
                self.state = QueryState::Exhausted;
                self.context = None;
                Ok(false)
            }
            Err(err) => {
                self.state = QueryState::Errored;
                self.context = None;
                Err(err)
            }
        }
    }

    /// Take the solution found by the last affirmative `has_next`
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<BindingSet> {
        match std::mem::replace(&mut self.state, QueryState::Idle) {
            QueryState::Buffered(bindings) => {
                self.delivered += 1;
                debug!(goal = %self.goal, result = self.delivered, "Delivering result");
                Ok(bindings)
            }
            previous => {
                let reason = match previous {
                    QueryState::Exhausted => "query is exhausted",
                    QueryState::Errored => "query failed",
                    _ => "next() called without a successful has_next()",
                };
                self.state = previous;
                Err(PolarError::IllegalState(reason.to_string()))
            }
        }
    }

    /// Iterate the remaining solutions
    pub fn results(self) -> QueryResults {
        QueryResults { query: self }
    }

    fn pull(&mut self) -> Result<Option<BindingSet>> {
        let Some((inner, host)) = self.context.as_mut() else {
            return Ok(None);
        };
        let Some(bindings) = inner.next_result(host)? else {
            return Ok(None);
        };
        let mut values = BTreeMap::new();
        for (name, term) in bindings {
            values.insert(name, host.from_term(&term)?);
        }
        Ok(Some(BindingSet { values }))
    }
}

/// Iterator adapter returned by [`Query::results`]
#[derive(Debug)]
pub struct QueryResults {
    query: Query,
}

impl Iterator for QueryResults {
    type Item = Result<BindingSet>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.query.has_next() {
            Ok(true) => Some(self.query.next()),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
