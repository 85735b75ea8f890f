//! Driver state, the pending event loop and the action dispatcher.
//!
//! Everything here runs with the driver lock held. Work that must happen
//! outside the lock (spawning a deferred action, calling the owner back)
//! is parked in the core and collected by the handle on release.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::buffers::ReadBuffers;
use crate::cipher_store::CipherStore;
use crate::config::HandshakeConfig;
use crate::connection::{Connection, KeepAlive};
use crate::engine::{Action, ActionFuture, AsyncActions, ServerEngine, WriteNewSessionTicket};
use crate::error::{HandshakeError, Result};
use crate::level::Phase;
use crate::transport_params::ServerTransportParameters;

/// A deferred action and the runtime that will drive it.
pub(super) struct DeferredAction<E> {
    pub(super) future: ActionFuture<E>,
    pub(super) executor: Handle,
}

pub(super) struct HandshakeCore<E: ServerEngine> {
    pub(super) engine: E,
    pub(super) conn: Weak<Connection>,
    pub(super) config: HandshakeConfig,
    pub(super) executor: Option<Handle>,
    /// An owner callback is registered and not cancelled.
    pub(super) callback_registered: bool,
    pub(super) transport_params: Option<Arc<ServerTransportParameters>>,
    pub(super) read_buffers: ReadBuffers,
    pub(super) ciphers: CipherStore,
    pub(super) pending_tickets: VecDeque<WriteNewSessionTicket>,
    pub(super) phase: Phase,
    pub(super) handshake_done: bool,
    pub(super) error: Option<HandshakeError>,
    pub(super) wait_for_data: bool,
    /// Set while a transport entry point is on the stack.
    pub(super) in_handshake_stack: bool,
    in_process_pending_events: bool,
    pub(super) handshake_event_available: bool,
    /// Held while an engine action is outstanding.
    action_guard: Option<KeepAlive>,
    deferred: Option<DeferredAction<E>>,
    /// A notification was held back by `in_handshake_stack`.
    notify_on_exit: bool,
    /// The owner should be called back once the lock is released.
    notify_due: bool,
}

impl<E: ServerEngine> HandshakeCore<E> {
    pub(super) fn new(conn: &Arc<Connection>, engine: E, config: HandshakeConfig) -> Self {
        Self {
            engine,
            conn: Arc::downgrade(conn),
            read_buffers: ReadBuffers::new(config.max_crypto_buffer),
            config,
            executor: None,
            callback_registered: false,
            transport_params: None,
            ciphers: CipherStore::new(),
            pending_tickets: VecDeque::new(),
            phase: Phase::Handshake,
            handshake_done: false,
            error: None,
            wait_for_data: false,
            in_handshake_stack: false,
            in_process_pending_events: false,
            handshake_event_available: false,
            action_guard: None,
            deferred: None,
            notify_on_exit: false,
            notify_due: false,
        }
    }

    /// Surface the latched error, if any.
    pub(super) fn check_error(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Latch `err`. The first error wins and is never cleared.
    pub(super) fn on_error(&mut self, err: HandshakeError) {
        debug!(error = %err, code = %err.code(), "server handshake error");
        if self.error.is_none() {
            self.error = Some(err);
        }
        self.handshake_event_available = true;
    }

    pub(super) fn is_action_pending(&self) -> bool {
        self.action_guard.is_some()
    }

    pub(super) fn enter_handshake_stack(&mut self) {
        self.in_handshake_stack = true;
    }

    pub(super) fn leave_handshake_stack(&mut self) {
        self.in_handshake_stack = false;
        if std::mem::take(&mut self.notify_on_exit)
            && self.config.notify_after_entry
            && self.error.is_none()
        {
            self.notify_due = true;
        }
    }

    /// Submit a unit of engine work directly (used by `accept`).
    pub(super) fn submit(&mut self, work: impl FnOnce(&mut E) -> AsyncActions<E>) {
        if self.action_guard.is_some() {
            self.on_error(HandshakeError::ActionPending);
            return;
        }
        if self.error.is_some() {
            return;
        }
        match KeepAlive::acquire(&self.conn) {
            Some(guard) => self.action_guard = Some(guard),
            None => {
                self.on_error(HandshakeError::ConnectionReleased);
                return;
            }
        }
        let actions = work(&mut self.engine);
        self.start_actions(actions);
    }

    fn start_actions(&mut self, actions: AsyncActions<E>) {
        match actions {
            AsyncActions::Ready(actions) => self.process_actions(actions),
            AsyncActions::Pending(future) => {
                let executor = self.executor.clone().or_else(|| Handle::try_current().ok());
                match executor {
                    Some(executor) => {
                        trace!("engine action deferred");
                        self.deferred = Some(DeferredAction { future, executor });
                    }
                    None => {
                        self.action_guard = None;
                        self.on_error(HandshakeError::Internal(
                            "no runtime available to complete a deferred handshake action".into(),
                        ));
                    }
                }
            }
        }
    }

    /// Drive the engine until it waits on the network, on a deferred
    /// action, or has failed.
    pub(super) fn process_pending_events(&mut self) {
        if self.in_process_pending_events {
            return;
        }
        let Some(_keep_alive) = KeepAlive::acquire(&self.conn) else {
            self.on_error(HandshakeError::ConnectionReleased);
            return;
        };
        self.in_process_pending_events = true;

        while self.action_guard.is_none() && self.error.is_none() {
            self.action_guard = KeepAlive::acquire(&self.conn);
            if !self.wait_for_data {
                let level = self.engine.read_level();
                trace!(%level, buffered = self.read_buffers.len(level), "feeding engine");
                let actions = self.engine.process_socket_data(self.read_buffers.get_mut(level));
                self.start_actions(actions);
            } else if !self.process_pending_crypto_event() {
                self.action_guard = None;
                break;
            }
        }

        self.in_process_pending_events = false;
    }

    /// Hand the next queued ticket write to the engine. `false` if none.
    fn process_pending_crypto_event(&mut self) -> bool {
        let Some(ticket) = self.pending_tickets.pop_front() else {
            return false;
        };
        trace!(token_len = ticket.app_token.len(), "writing new session ticket");
        let actions = self.engine.write_new_session_ticket(ticket);
        self.start_actions(actions);
        true
    }

    /// Completion handler shared by inline and deferred actions.
    pub(super) fn process_actions(&mut self, actions: Vec<Action<E>>) {
        // Covers the gap between dropping the action guard and the next submission.
        let _keep_alive = KeepAlive::acquire(&self.conn);

        self.apply_actions(actions);

        self.action_guard = None;
        if self.handshake_event_available && self.callback_registered {
            if self.in_handshake_stack {
                self.notify_on_exit = true;
            } else {
                self.notify_due = true;
            }
        }
        self.handshake_event_available = false;
        self.process_pending_events();
    }

    pub(super) fn take_deferred(&mut self) -> Option<DeferredAction<E>> {
        self.deferred.take()
    }

    /// Whether the owner is owed a callback once the lock is released.
    pub(super) fn take_due_notification(&mut self) -> bool {
        std::mem::take(&mut self.notify_due)
    }
}
