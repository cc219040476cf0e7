//! Start-up configuration for a machine.

use crate::core::ContextReader;
use crate::effects::CancellationToken;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

pub const DEFAULT_SUCCESS_EVENT: &str = "SUCCESS";
pub const DEFAULT_FAILURE_EVENT: &str = "FAILURE";
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Options for [`start`](crate::interpreter::start), built fluently.
///
/// # Example
///
/// ```rust
/// use hierarch::effects::CancellationToken;
/// use hierarch::interpreter::StartOptions;
///
/// let token = CancellationToken::new();
/// let options = StartOptions::new()
///     .cancellation(token.clone())
///     .context(|name| (name == "retries").then(|| serde_json::json!(3)))
///     .history_limit(100);
///
/// assert_eq!(options.success_event_name(), "SUCCESS");
/// ```
#[derive(Clone)]
pub struct StartOptions {
    pub(crate) cancellation: Option<CancellationToken>,
    pub(crate) context: Option<Rc<ContextReader>>,
    pub(crate) success_event: String,
    pub(crate) failure_event: String,
    pub(crate) max_depth: usize,
    pub(crate) history_limit: Option<usize>,
}

impl StartOptions {
    pub fn new() -> Self {
        Self {
            cancellation: None,
            context: None,
            success_event: DEFAULT_SUCCESS_EVENT.to_string(),
            failure_event: DEFAULT_FAILURE_EVENT.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            history_limit: None,
        }
    }

    /// Tear the machine down when `token` fires.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Reader answering `read_context` calls and guard lookups.
    pub fn context<F>(mut self, reader: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + 'static,
    {
        self.context = Some(Rc::new(reader));
        self
    }

    /// Event injected when a node's effects all succeed.
    pub fn success_event(mut self, name: impl Into<String>) -> Self {
        self.success_event = name.into();
        self
    }

    /// Event injected when one of a node's effects fails.
    pub fn failure_event(mut self, name: impl Into<String>) -> Self {
        self.failure_event = name.into();
        self
    }

    /// Deepest allowed nesting. Entering past it is a configuration error.
    /// Also bounds how many always-targets may fire in a row at one level.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Keep at most `limit` records of transition history.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn success_event_name(&self) -> &str {
        &self.success_event
    }

    pub fn failure_event_name(&self) -> &str {
        &self.failure_event
    }
}

impl Default for StartOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartOptions")
            .field("cancellation", &self.cancellation)
            .field("context", &self.context.is_some())
            .field("success_event", &self.success_event)
            .field("failure_event", &self.failure_event)
            .field("max_depth", &self.max_depth)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}
