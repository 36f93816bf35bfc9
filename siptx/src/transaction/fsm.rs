use std::fmt;

use tokio::sync::watch;

/// The states of an INVITE client transaction.
///
/// `Accepted` is the RFC 6026 state entered on a 2xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// Created, `init` not called yet.
    #[default]
    Initial,
    Calling,
    Proceeding,
    Accepted,
    Completed,
    Terminated,
}

impl State {
    /// Returns `true` once no further transition is possible.
    #[inline]
    pub fn is_terminated(self) -> bool {
        matches!(self, State::Terminated)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Holds the current [`State`] and publishes every change to watchers.
///
/// `Terminated` is absorbing: once set, every later transition is refused.
#[derive(Debug)]
pub struct StateMachine {
    state: watch::Sender<State>,
}

impl StateMachine {
    pub fn new(state: State) -> Self {
        let (state, _) = watch::channel(state);

        Self { state }
    }

    #[inline]
    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Moves to `new`, returning `false` if the machine already terminated.
    pub fn set_state(&self, new: State) -> bool {
        let mut old = new;
        let changed = self.state.send_if_modified(|current| {
            old = *current;
            if current.is_terminated() || *current == new {
                return false;
            }
            *current = new;
            true
        });

        if changed {
            tracing::trace!("State Changed [{old} -> {new}]");
        }

        changed || (old == new && !old.is_terminated())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new(State::Initial)
    }
}
