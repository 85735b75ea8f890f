//! Transport parameters exchanged inside the TLS handshake.
//!
//! Encoding and decoding belong to the engine; the driver only keeps the
//! server's parameters and exposes what the client advertised.

use bytes::Bytes;
use parking_lot::Mutex;

/// A single transport parameter as an (id, opaque value) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportParameter {
    pub id: u64,
    pub value: Bytes,
}

impl TransportParameter {
    pub fn new(id: u64, value: impl Into<Bytes>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

/// Parameters the client sent in its ClientHello.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientTransportParameters {
    pub parameters: Vec<TransportParameter>,
}

impl ClientTransportParameters {
    /// Value of the parameter with `id`, if the client sent one.
    pub fn get(&self, id: u64) -> Option<&Bytes> {
        self.parameters.iter().find(|p| p.id == id).map(|p| &p.value)
    }
}

/// The server side of the transport parameters extension.
///
/// Shared between the driver and the engine: the engine records the
/// client's parameters once it has parsed them.
#[derive(Debug, Default)]
pub struct ServerTransportParameters {
    server: Vec<TransportParameter>,
    client: Mutex<Option<ClientTransportParameters>>,
}

impl ServerTransportParameters {
    pub fn new(server: Vec<TransportParameter>) -> Self {
        Self {
            server,
            client: Mutex::new(None),
        }
    }

    /// The parameters this server advertises.
    pub fn server_parameters(&self) -> &[TransportParameter] {
        &self.server
    }

    /// Record what the client advertised.
    pub fn set_client_parameters(&self, params: ClientTransportParameters) {
        *self.client.lock() = Some(params);
    }

    /// What the client advertised, once the engine has parsed it.
    pub fn client_parameters(&self) -> Option<ClientTransportParameters> {
        self.client.lock().clone()
    }
}
