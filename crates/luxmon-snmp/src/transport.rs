//! Transport contract consumed by the walker, plus the SNMP2c client backend.
//!
//! The walker only ever sees this trait and the [`Pdu`] type; BER encoding,
//! UDP, retries and community auth live behind it in the `csnmp` client.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use csnmp::{ObjectValue, Snmp2cClient};

use crate::error::TransportError;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduValue};

/// One SNMP conversation with a single host.
///
/// `connect` is called once at the start of a query and `close` once at the
/// end, on every exit path past a successful connect. `bulk_walk` streams
/// every instance under `root` through the callback; the callback performs no
/// I/O of its own.
#[async_trait]
pub trait SnmpTransport: Send {
    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn bulk_walk(
        &mut self,
        root: &Oid,
        on_pdu: &mut (dyn for<'a> FnMut(&'a Pdu) + Send),
    ) -> Result<(), TransportError>;

    async fn close(&mut self);
}

/// SNMP2c transport over UDP, community-authenticated.
pub struct Snmp2cTransport {
    target: SocketAddr,
    community: Vec<u8>,
    timeout: Duration,
    max_repetitions: u32,
    client: Option<Snmp2cClient>,
}

impl Snmp2cTransport {
    pub fn new(target: SocketAddr, community: impl Into<Vec<u8>>) -> Self {
        Self {
            target,
            community: community.into(),
            timeout: Duration::from_secs(5),
            max_repetitions: 20,
            client: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_repetitions(mut self, max_repetitions: u32) -> Self {
        self.max_repetitions = max_repetitions;
        self
    }
}

#[async_trait]
impl SnmpTransport for Snmp2cTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let client = Snmp2cClient::new(
            self.target,
            self.community.clone(),
            None,
            Some(self.timeout),
        )
        .await
        .map_err(|err| TransportError::Client(err.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn bulk_walk(
        &mut self,
        root: &Oid,
        on_pdu: &mut (dyn for<'a> FnMut(&'a Pdu) + Send),
    ) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::NotConnected)?;

        let top: csnmp::ObjectIdentifier =
            root.to_string()
                .parse()
                .map_err(|err| TransportError::BadRoot {
                    root: root.to_string(),
                    reason: format!("{err:?}"),
                })?;

        let results = client
            .walk_bulk(top, 0, self.max_repetitions)
            .await
            .map_err(|err| TransportError::Client(err.to_string()))?;

        for (name, value) in results {
            let pdu = Pdu::new(name.to_string(), decode_value(value));
            on_pdu(&pdu);
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.client = None;
    }
}

fn decode_value(value: ObjectValue) -> PduValue {
    match value {
        ObjectValue::Integer(v) => PduValue::Integer(i64::from(v)),
        ObjectValue::String(bytes) => PduValue::OctetString(bytes),
        ObjectValue::ObjectId(oid) => PduValue::ObjectIdentifier(oid.to_string()),
        ObjectValue::IpAddress(addr) => PduValue::IpAddress(addr),
        ObjectValue::Counter32(v) => PduValue::Counter32(v),
        ObjectValue::Unsigned32(v) => PduValue::Gauge32(v),
        ObjectValue::TimeTicks(v) => PduValue::TimeTicks(v),
        ObjectValue::Opaque(bytes) => PduValue::Opaque(bytes),
        ObjectValue::Counter64(v) => PduValue::Counter64(v),
    }
}

#[cfg(any(test, feature = "testing"))]
pub use mock::MockTransport;

#[cfg(any(test, feature = "testing"))]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::error::TransportError;
    use crate::oid::Oid;
    use crate::pdu::Pdu;

    use super::SnmpTransport;

    /// Replays canned PDUs instead of talking to the network. Clones share
    /// their counters, so a test can hand independent transports to racing
    /// callers and still observe the total connect count.
    #[derive(Clone)]
    pub struct MockTransport {
        pdus: Vec<Pdu>,
        fail_walk_at: Option<usize>,
        connected: bool,
        walks: Arc<Mutex<Vec<Oid>>>,
        connects: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    impl MockTransport {
        pub fn new(pdus: Vec<Pdu>) -> Self {
            Self {
                pdus,
                fail_walk_at: None,
                connected: false,
                walks: Arc::new(Mutex::new(Vec::new())),
                connects: Arc::new(AtomicUsize::new(0)),
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Makes the n-th (0-based) `bulk_walk` call fail.
        pub fn fail_walk_at(mut self, n: usize) -> Self {
            self.fail_walk_at = Some(n);
            self
        }

        pub fn connect_count(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        pub fn close_count(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }

        pub fn walked_roots(&self) -> Vec<Oid> {
            match self.walks.lock() {
                Ok(walks) => walks.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            }
        }
    }

    #[async_trait]
    impl SnmpTransport for MockTransport {
        async fn connect(&mut self) -> Result<(), TransportError> {
            self.connected = true;
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn bulk_walk(
            &mut self,
            root: &Oid,
            on_pdu: &mut (dyn for<'a> FnMut(&'a Pdu) + Send),
        ) -> Result<(), TransportError> {
            if !self.connected {
                return Err(TransportError::NotConnected);
            }

            let walk_index = {
                let mut walks = match self.walks.lock() {
                    Ok(walks) => walks,
                    Err(poisoned) => poisoned.into_inner(),
                };
                walks.push(root.clone());
                walks.len() - 1
            };
            if self.fail_walk_at == Some(walk_index) {
                return Err(TransportError::Client("injected walk failure".into()));
            }

            for pdu in &self.pdus {
                let under_root = pdu
                    .name
                    .parse::<Oid>()
                    .map(|name| root.is_prefix_of(&name))
                    .unwrap_or(false);
                if under_root {
                    on_pdu(pdu);
                }
            }
            Ok(())
        }

        async fn close(&mut self) {
            self.connected = false;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
