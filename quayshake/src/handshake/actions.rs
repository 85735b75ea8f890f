//! Side effects of completed engine actions.

use bytes::Bytes;
use tracing::{debug, trace};

use super::driver::HandshakeCore;
use crate::connection::KeepAlive;
use crate::engine::{Action, ContentType, EngineError, ServerEngine, WriteContent};
use crate::error::{HandshakeError, Result, TransportErrorCode, ALERT_INTERNAL_ERROR};
use crate::level::{CipherKind, EncryptionLevel, Phase};

impl<E: ServerEngine> HandshakeCore<E> {
    pub(super) fn apply_actions(&mut self, actions: Vec<Action<E>>) {
        for action in actions {
            trace!(?action, "applying engine action");
            self.apply_action(action);
        }
    }

    fn apply_action(&mut self, action: Action<E>) {
        match action {
            Action::DeliverAppData(_) => self.on_error(HandshakeError::Protocol {
                message: "unexpected data on crypto stream".into(),
                code: TransportErrorCode::PROTOCOL_VIOLATION,
            }),
            Action::WriteToSocket(contents) => self.write_to_socket(contents),
            Action::ReportEarlyHandshakeSuccess => self.set_phase(Phase::KeysDerived),
            Action::ReportHandshakeSuccess => {
                self.handshake_done = true;
                let previous = self.phase;
                self.set_phase(Phase::Established);
                // Straight from `Handshake`, the 1-RTT installs already raised the event.
                if previous != Phase::Handshake {
                    self.handshake_event_available = true;
                }
            }
            Action::ReportError(err) => self.on_engine_error(err),
            Action::WaitForData => self.wait_for_data = true,
            Action::MutateState(mutate) => mutate(&mut self.engine),
            Action::AttemptVersionFallback => {
                self.on_error(HandshakeError::Internal("unexpected version fallback".into()))
            }
            Action::EndOfData => self.on_error(HandshakeError::Protocol {
                message: "unexpected close notify received".into(),
                code: TransportErrorCode::INTERNAL_ERROR,
            }),
            Action::SecretAvailable(secret) => {
                if let Some(kind) = secret.kind.cipher_kind() {
                    self.install_cipher(kind, &secret.secret);
                }
                self.handshake_event_available = true;
            }
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "handshake phase changed");
        }
        self.phase = phase;
    }

    fn on_engine_error(&mut self, err: EngineError) {
        let message = if err.message.is_empty() {
            "error during handshake".to_string()
        } else {
            err.message
        };
        // Always in the CRYPTO_ERROR range: a missing alert becomes 0x150, never a bare 0x50.
        let alert = err.alert.unwrap_or(ALERT_INTERNAL_ERROR);
        self.on_error(HandshakeError::Protocol {
            message,
            code: TransportErrorCode::crypto_error(alert),
        });
    }

    fn write_to_socket(&mut self, contents: Vec<WriteContent>) {
        if !self.callback_registered {
            trace!(chunks = contents.len(), "cancelled, dropping outbound flight");
            return;
        }
        for content in contents {
            if content.content_type != ContentType::Handshake {
                continue;
            }
            if let Err(err) = self.write_to_stream(content.level, content.data) {
                self.on_error(err);
                return;
            }
        }
        self.handshake_event_available = true;
    }

    /// Append `data` to the connection's crypto stream at `level`.
    pub(super) fn write_to_stream(&self, level: EncryptionLevel, data: Bytes) -> Result<()> {
        if level == EncryptionLevel::EarlyData {
            return Err(HandshakeError::EarlyDataWrite);
        }
        let conn = KeepAlive::acquire(&self.conn).ok_or(HandshakeError::ConnectionReleased)?;
        let mut state = conn.connection().lock();
        let stream = state
            .crypto
            .stream_mut(level)
            .ok_or(HandshakeError::EarlyDataWrite)?;
        trace!(%level, len = data.len(), offset = stream.write_offset(), "crypto stream write");
        stream.write(data);
        Ok(())
    }

    fn install_cipher(&mut self, kind: CipherKind, secret: &[u8]) {
        let pair = match self.engine.build_ciphers(secret) {
            Ok(pair) => pair,
            Err(err) => {
                self.on_error(HandshakeError::Internal(format!(
                    "failed to derive {kind:?} ciphers: {err}"
                )));
                return;
            }
        };
        trace!(?kind, "installing cipher pair");
        // Handshake write keys belong to the connection, not the store.
        if let Some(pair) = self.ciphers.install(kind, pair) {
            match KeepAlive::acquire(&self.conn) {
                Some(conn) => conn.connection().lock().install_handshake_write(pair),
                None => {
                    self.on_error(HandshakeError::ConnectionReleased);
                    return;
                }
            }
        }
        self.handshake_event_available = true;
    }
}
