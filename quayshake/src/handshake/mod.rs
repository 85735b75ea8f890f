//! The server handshake driver.
//!
//! [`ServerHandshake`] sits between the transport and a TLS 1.3
//! [`ServerEngine`]. It buffers inbound crypto data per encryption level,
//! feeds the engine at the level the engine reads, applies the actions the
//! engine hands back, installs ciphers as secrets arrive and tells the
//! owner through [`HandshakeCallback`] when something worth picking up has
//! happened.
//!
//! At most one unit of engine work is outstanding at a time. While it is,
//! the driver holds the [`Connection`] alive. Deferred work is resumed on
//! a tokio runtime; the owner callback always runs with the driver
//! unlocked, so the owner may call straight back into the driver.
//!
//! Errors latch: the first one sticks and every later entry point and
//! cipher getter returns it.

mod actions;
mod driver;

use std::cell::RefCell;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard, ReentrantMutex};
use quaytrust::{Aead, CipherSuite, PacketNumberCipher};
use tokio::runtime::Handle;
use tracing::trace;

use self::driver::{DeferredAction, HandshakeCore};
use crate::config::HandshakeConfig;
use crate::connection::Connection;
use crate::engine::{Action, AppTokenValidator, RejectAllTokens, ServerEngine, WriteNewSessionTicket};
use crate::error::{HandshakeError, Result};
use crate::level::{CipherKind, EncryptionLevel, Phase};
use crate::transport_params::{ClientTransportParameters, ServerTransportParameters};

/// Owner notification hook.
pub trait HandshakeCallback: Send + Sync {
    /// New output, a new cipher, a phase change or an error is ready.
    fn on_crypto_event_available(&self);
}

/// Gate every callback invocation passes through.
///
/// Held across the call, so [`ServerHandshake::cancel`] on another thread
/// waits for a running callback. Reentrant, so a callback may itself call
/// `cancel` or re-enter the driver. Never taken with the driver lock held.
struct Notifier(ReentrantMutex<RefCell<Option<Arc<dyn HandshakeCallback>>>>);

impl Notifier {
    fn new() -> Self {
        Self(ReentrantMutex::new(RefCell::new(None)))
    }

    fn set(&self, callback: Option<Arc<dyn HandshakeCallback>>) {
        *self.0.lock().borrow_mut() = callback;
    }

    fn notify(&self) {
        let gate = self.0.lock();
        let callback = gate.borrow().clone();
        if let Some(callback) = callback {
            callback.on_crypto_event_available();
        }
    }
}

/// Handle to a server handshake driver. Clones share one driver.
pub struct ServerHandshake<E: ServerEngine> {
    core: Arc<Mutex<HandshakeCore<E>>>,
    notifier: Arc<Notifier>,
}

impl<E: ServerEngine> Clone for ServerHandshake<E> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl<E: ServerEngine> ServerHandshake<E> {
    pub fn new(conn: &Arc<Connection>, engine: E, config: HandshakeConfig) -> Self {
        Self {
            core: Arc::new(Mutex::new(HandshakeCore::new(conn, engine, config))),
            notifier: Arc::new(Notifier::new()),
        }
    }

    /// Runtime that deferred engine work is resumed on. Without one the
    /// runtime current at submission time is used.
    pub fn set_executor(&self, executor: Handle) {
        self.core.lock().executor = Some(executor);
    }

    /// Register the owner callback and configure the engine. With no
    /// validator every application token is rejected.
    pub fn initialize(
        &self,
        callback: Arc<dyn HandshakeCallback>,
        validator: Option<Box<dyn AppTokenValidator>>,
    ) {
        let validator = validator.unwrap_or_else(|| Box::new(RejectAllTokens));
        {
            let mut core = self.core.lock();
            core.callback_registered = true;
            core.engine.initialize(validator);
        }
        self.notifier.set(Some(callback));
    }

    /// Start the handshake with the server's transport parameters.
    pub fn accept(&self, params: Arc<ServerTransportParameters>) -> Result<()> {
        self.with_entry(|core| {
            core.transport_params = Some(Arc::clone(&params));
            core.submit(move |engine| engine.accept(params));
            core.check_error()
        })
    }

    /// Feed crypto data received at `level`.
    pub fn do_handshake(&self, data: Bytes, level: EncryptionLevel) -> Result<()> {
        self.with_entry(|core| {
            core.wait_for_data = false;
            if let Err(err) = core.read_buffers.append(level, data) {
                core.on_error(err);
            }
            core.process_pending_events();
            core.check_error()
        })
    }

    /// Queue a NewSessionTicket carrying `app_token`.
    pub fn write_new_session_ticket(&self, app_token: Bytes) -> Result<()> {
        self.with_entry(|core| {
            core.check_error()?;
            core.pending_tickets.push_back(WriteNewSessionTicket { app_token });
            core.process_pending_events();
            core.check_error()
        })
    }

    /// Take the cipher installed for `kind`. Each cipher is handed out once.
    pub fn take_cipher(&self, kind: CipherKind) -> Result<Option<Box<dyn Aead>>> {
        let mut core = self.core.lock();
        core.check_error()?;
        Ok(core.ciphers.take_aead(kind))
    }

    /// Take the header cipher installed for `kind`.
    pub fn take_header_cipher(&self, kind: CipherKind) -> Result<Option<Box<dyn PacketNumberCipher>>> {
        let mut core = self.core.lock();
        core.check_error()?;
        Ok(core.ciphers.take_header_cipher(kind))
    }

    pub fn take_handshake_read_cipher(&self) -> Result<Option<Box<dyn Aead>>> {
        self.take_cipher(CipherKind::HandshakeRead)
    }

    pub fn take_handshake_read_header_cipher(&self) -> Result<Option<Box<dyn PacketNumberCipher>>> {
        self.take_header_cipher(CipherKind::HandshakeRead)
    }

    pub fn take_one_rtt_read_cipher(&self) -> Result<Option<Box<dyn Aead>>> {
        self.take_cipher(CipherKind::OneRttRead)
    }

    pub fn take_one_rtt_read_header_cipher(&self) -> Result<Option<Box<dyn PacketNumberCipher>>> {
        self.take_header_cipher(CipherKind::OneRttRead)
    }

    pub fn take_one_rtt_write_cipher(&self) -> Result<Option<Box<dyn Aead>>> {
        self.take_cipher(CipherKind::OneRttWrite)
    }

    pub fn take_one_rtt_write_header_cipher(&self) -> Result<Option<Box<dyn PacketNumberCipher>>> {
        self.take_header_cipher(CipherKind::OneRttWrite)
    }

    pub fn take_zero_rtt_read_cipher(&self) -> Result<Option<Box<dyn Aead>>> {
        self.take_cipher(CipherKind::ZeroRttRead)
    }

    pub fn take_zero_rtt_read_header_cipher(&self) -> Result<Option<Box<dyn PacketNumberCipher>>> {
        self.take_header_cipher(CipherKind::ZeroRttRead)
    }

    /// Stop notifying the owner. Outstanding work still completes, but
    /// outbound flights are dropped and no callback fires.
    ///
    /// A callback already running on another thread finishes before this
    /// returns; none starts afterwards.
    pub fn cancel(&self) {
        self.core.lock().callback_registered = false;
        self.notifier.set(None);
    }

    pub fn is_cancelled(&self) -> bool {
        !self.core.lock().callback_registered
    }

    pub fn phase(&self) -> Phase {
        self.core.lock().phase
    }

    pub fn is_handshake_done(&self) -> bool {
        self.core.lock().handshake_done
    }

    /// Whether a unit of engine work is outstanding.
    pub fn is_action_pending(&self) -> bool {
        self.core.lock().is_action_pending()
    }

    /// The client's transport parameters, once the engine has seen them.
    pub fn client_transport_params(&self) -> Option<ClientTransportParameters> {
        let core = self.core.lock();
        core.transport_params.as_ref()?.client_parameters()
    }

    /// Write handshake bytes to the crypto stream at `level`. Early data is
    /// never written by a server.
    pub fn write_data_to_stream(&self, level: EncryptionLevel, data: Bytes) -> Result<()> {
        self.core.lock().write_to_stream(level, data)
    }

    pub fn application_protocol(&self) -> Option<String> {
        self.core.lock().engine.application_protocol().map(str::to_owned)
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.core.lock().engine.cipher_suite()
    }

    /// The latched error, if any.
    pub fn error(&self) -> Option<HandshakeError> {
        self.core.lock().error.clone()
    }

    fn with_entry<R>(&self, f: impl FnOnce(&mut HandshakeCore<E>) -> R) -> R {
        let mut core = self.core.lock();
        core.enter_handshake_stack();
        let out = f(&mut *core);
        core.leave_handshake_stack();
        self.release(core);
        out
    }

    /// Unlock, then do whatever must not run under the lock.
    fn release(&self, mut core: MutexGuard<'_, HandshakeCore<E>>) {
        let deferred = core.take_deferred();
        let notify = core.take_due_notification();
        drop(core);

        if let Some(deferred) = deferred {
            self.spawn_completion(deferred);
        }
        if notify {
            self.notifier.notify();
        }
    }

    fn spawn_completion(&self, deferred: DeferredAction<E>) {
        let DeferredAction { future, executor } = deferred;
        let handshake = self.clone();
        executor.spawn(async move {
            let actions = future.await;
            handshake.complete(actions);
        });
    }

    fn complete(&self, actions: Vec<Action<E>>) {
        trace!(actions = actions.len(), "deferred engine action completed");
        let mut core = self.core.lock();
        core.process_actions(actions);
        self.release(core);
    }
}
