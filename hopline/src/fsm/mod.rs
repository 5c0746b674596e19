//! Event-driven state machine interpreter.
//!
//! An [`Fsm`] waits on the session for the earliest of its [`EventList`]
//! members and dispatches on `(event index, state)` through a transition
//! table. Each transition names the next state, an [`Action`] and an
//! optional timeout for subsequent waits. State `0` is the start state and
//! `-1` is terminal.
//!
//! # Example
//!
//! ```rust,ignore
//! let events: EventList = [prompt.clone(), Event::Timeout].into_iter().collect();
//! let transitions = vec![
//!     Transition::new(&prompt, &[0], -1, Action::invoke(ExpectedPrompt)),
//!     Transition::new(&Event::Timeout, &[0], -1, Action::fail(ErrorKind::CommandTimeout, "No prompt")),
//! ];
//! let fsm = Fsm::new("WAIT-4-PROMPT", events, transitions, Duration::from_secs(10));
//! let ok = fsm.run(&mut link.context()).await?;
//! ```

pub mod actions;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, trace, warn};

use crate::channel::{Event, EventList};
use crate::chain::{Controller, DeviceState};
use crate::error::{ChannelError, Error, ErrorKind, Result};

/// Terminal state.
pub const FINAL_STATE: i32 = -1;

/// Default transition budget of a run.
pub const DEFAULT_MAX_TRANSITIONS: usize = 20;

/// Mutable state of one FSM run.
///
/// Built by the caller for each run and inspected afterwards, e.g. to pick
/// up [`last_pattern`](Self::last_pattern) or [`msg`](Self::msg).
pub struct FsmContext<'a> {
    /// Live session of the chain.
    pub ctrl: &'a mut Controller,
    /// Discovery state of the hop being driven.
    pub device: &'a mut DeviceState,
    /// Current state.
    pub state: i32,
    /// Index of the last matched event.
    pub event: Option<usize>,
    /// The last matched event.
    pub pattern: Option<Event>,
    /// Diagnostic set by actions.
    pub msg: String,
    /// Set by actions to end the run successfully.
    pub finished: bool,
    /// Pattern saved for a follow-up machine.
    pub last_pattern: Option<Event>,
}

impl<'a> FsmContext<'a> {
    /// Create a fresh context in state `0`.
    pub fn new(ctrl: &'a mut Controller, device: &'a mut DeviceState) -> Self {
        Self {
            ctrl,
            device,
            state: 0,
            event: None,
            pattern: None,
            msg: String::new(),
            finished: false,
            last_pattern: None,
        }
    }

    /// Hostname of the hop, for errors and log lines.
    pub fn hostname(&self) -> &str {
        &self.device.hostname
    }

    /// Text preceding the last match.
    pub fn before(&self) -> &str {
        self.ctrl.before()
    }

    /// Text of the last match.
    pub fn after(&self) -> &str {
        self.ctrl.after()
    }

    /// Bind a session error to this hop.
    pub fn channel_error(&self, err: ChannelError) -> Error {
        Error::from_channel(err, &self.device.hostname)
    }
}

impl fmt::Debug for FsmContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsmContext")
            .field("host", &self.device.hostname)
            .field("state", &self.state)
            .field("event", &self.event)
            .field("finished", &self.finished)
            .field("msg", &self.msg)
            .finish()
    }
}

/// Side effect of a transition.
///
/// Returning `Ok(false)` aborts the run with `false`; an error propagates
/// out of the run.
#[async_trait]
pub trait FsmAction: Send + Sync {
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool>;

    /// Name used in log lines.
    fn name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Synchronous closure as an action.
pub struct FnAction<F>(F);

#[async_trait]
impl<F> FsmAction for FnAction<F>
where
    F: Fn(&mut FsmContext<'_>) -> bool + Send + Sync,
{
    async fn call(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        Ok((self.0)(ctx))
    }

    fn name(&self) -> &'static str {
        "fn"
    }
}

/// What a transition does besides changing state.
#[derive(Clone)]
pub enum Action {
    /// Nothing.
    NoOp,
    /// Run an action.
    Invoke(Arc<dyn FsmAction>),
    /// Fail the run with a typed error bound to the hop.
    Fail(ErrorKind, String),
}

impl Action {
    /// Wrap an action.
    pub fn invoke(action: impl FsmAction + 'static) -> Self {
        Action::Invoke(Arc::new(action))
    }

    /// A failure of the given kind.
    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        Action::Fail(kind, message.into())
    }

    /// Wrap a synchronous closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut FsmContext<'_>) -> bool + Send + Sync + 'static,
    {
        Action::Invoke(Arc::new(FnAction(f)))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoOp => write!(f, "NoOp"),
            Action::Invoke(action) => write!(f, "Invoke({})", action.name()),
            Action::Fail(kind, message) => write!(f, "Fail({kind:?}, {message:?})"),
        }
    }
}

/// One row of a transition list.
#[derive(Debug, Clone)]
pub struct Transition {
    event: Event,
    states: Vec<i32>,
    next: i32,
    action: Action,
    timeout: Option<Duration>,
}

impl Transition {
    /// On `event` in any of `states`, run `action` and move to `next`.
    pub fn new(event: &Event, states: &[i32], next: i32, action: Action) -> Self {
        Self {
            event: event.clone(),
            states: states.to_vec(),
            next,
            action,
            timeout: None,
        }
    }

    /// Timeout for the waits after this transition. Without it the
    /// previous timeout is kept.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// [`with_timeout`](Self::with_timeout) in whole seconds; `0` keeps the
    /// previous timeout.
    pub fn with_timeout_secs(self, secs: u64) -> Self {
        if secs == 0 {
            self
        } else {
            self.with_timeout(Duration::from_secs(secs))
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    next: i32,
    action: Action,
    timeout: Option<Duration>,
}

/// A compiled state machine.
#[derive(Debug)]
pub struct Fsm {
    name: String,
    events: EventList,
    table: HashMap<(usize, i32), Entry>,
    timeout: Duration,
    init_pattern: Option<Event>,
    max_transitions: usize,
}

impl Fsm {
    /// Compile a transition list against an event list.
    ///
    /// Transitions on events missing from the list are dropped with a
    /// warning. For duplicate `(event, state)` keys the later transition
    /// wins.
    pub fn new(
        name: impl Into<String>,
        events: EventList,
        transitions: Vec<Transition>,
        timeout: Duration,
    ) -> Self {
        let name = name.into();
        let mut table = HashMap::new();
        for transition in transitions {
            let Some(index) = events.position(&transition.event) else {
                warn!("[{}] transition for non-existing event: {}", name, transition.event);
                continue;
            };
            for state in transition.states {
                table.insert(
                    (index, state),
                    Entry {
                        next: transition.next,
                        action: transition.action.clone(),
                        timeout: transition.timeout,
                    },
                );
            }
        }

        Self {
            name,
            events,
            table,
            timeout,
            init_pattern: None,
            max_transitions: DEFAULT_MAX_TRANSITIONS,
        }
    }

    /// Treat `pattern` as already matched on the first iteration.
    pub fn with_init_pattern(mut self, pattern: Option<Event>) -> Self {
        self.init_pattern = pattern;
        self
    }

    /// Set the transition budget.
    pub fn with_max_transitions(mut self, max: usize) -> Self {
        self.max_transitions = max;
        self
    }

    /// Name used in log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event list.
    pub fn events(&self) -> &EventList {
        &self.events
    }

    /// Run the machine.
    ///
    /// Returns `Ok(true)` on reaching the terminal state or when an action
    /// finished the run, `Ok(false)` when an action aborted it or the
    /// transition budget ran out.
    pub async fn run(&self, ctx: &mut FsmContext<'_>) -> Result<bool> {
        let mut timeout = self.timeout;
        let mut init = self.init_pattern.as_ref().and_then(|pattern| {
            let index = self.events.position(pattern);
            if index.is_none() {
                warn!(
                    "{}: [{}] initial pattern not in event list: {}",
                    ctx.hostname(),
                    self.name,
                    pattern
                );
            }
            index
        });

        debug!("{}: [{}] start", ctx.hostname(), self.name);
        for _ in 0..self.max_transitions {
            let index = match init.take() {
                Some(index) => {
                    trace!("{}: [{}] initial pattern E={}", ctx.hostname(), self.name, index);
                    index
                }
                None => match ctx.ctrl.expect(self.events.as_slice(), timeout).await {
                    Ok(index) => index,
                    Err(ChannelError::Closed) => {
                        return Err(Error::connection(
                            ctx.hostname(),
                            "Session closed unexpectedly",
                        ));
                    }
                    Err(e) => return Err(ctx.channel_error(e)),
                },
            };
            ctx.event = Some(index);
            ctx.pattern = self.events.get(index).cloned();

            let Some(entry) = self.table.get(&(index, ctx.state)) else {
                warn!(
                    "{}: [{}] unknown transition: E={} S={}",
                    ctx.hostname(),
                    self.name,
                    index,
                    ctx.state
                );
                continue;
            };
            debug!(
                "{}: [{}] E={} S={} T={:?} A={:?}",
                ctx.hostname(),
                self.name,
                index,
                ctx.state,
                timeout,
                entry.action
            );

            match &entry.action {
                Action::NoOp => {}
                Action::Invoke(action) => {
                    if !action.call(ctx).await? {
                        error!("{}: [{}] {}", ctx.hostname(), self.name, ctx.msg);
                        return Ok(false);
                    }
                }
                Action::Fail(kind, message) => {
                    return Err(Error::new(*kind, ctx.hostname(), message.clone()));
                }
            }

            if let Some(next_timeout) = entry.timeout {
                timeout = next_timeout;
            }
            ctx.state = entry.next;

            if ctx.state == FINAL_STATE || ctx.finished {
                debug!(
                    "{}: [{}] stop at E={} S={}",
                    ctx.hostname(),
                    self.name,
                    index,
                    ctx.state
                );
                return Ok(true);
            }
        }

        error!("{}: [{}] looped, giving up", ctx.hostname(), self.name);
        Ok(false)
    }
}
