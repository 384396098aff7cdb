//! Session authentication against one candidate device.
//!
//! `Authenticator` turns a candidate address plus operator credentials into a
//! [`DeviceSession`]: it asks the connector for a *fresh* client, runs the
//! identity handshake under an explicit deadline, and rejects any outcome
//! that leaves the identity unresolved.
//!
//! Two failure classes matter to the setup flow and are kept distinct:
//!
//! - [`AuthError::Connection`] – the exchange itself could not complete
//!   (I/O fault, refusal, deadline).  Transient by nature.
//! - [`AuthError::InvalidIdentity`] – the exchange completed but the device
//!   either reported a failed handshake or still carries the factory
//!   placeholder id.  Retrying without changing credentials will not help.
//!
//! The vendor transport is not trusted to enforce its own deadline, so every
//! handshake runs under `tokio::time::timeout`.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use vento_core::{
    ClientError, Credentials, DeviceAddress, DeviceClient, DeviceConnector, DeviceId, FanState,
};

/// Default deadline for one handshake or refresh exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for authentication attempts.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The network exchange with the device could not complete.
    #[error("cannot connect to device at {address}: {source}")]
    Connection {
        address: DeviceAddress,
        #[source]
        source: ClientError,
    },
    /// The handshake ran but the device did not report a usable identity.
    #[error("device at {address} did not report a usable identity")]
    InvalidIdentity { address: DeviceAddress },
}

/// A live, authenticated session with exactly one device.
///
/// The session is the single owner of the underlying client; whoever holds
/// it (the setup flow briefly, then the poller) is the only party driving
/// network calls on it.  Invariant: `device_id` is never the factory
/// placeholder — [`Authenticator::authenticate`] refuses to build a session
/// otherwise.
pub struct DeviceSession<C: DeviceClient> {
    client: C,
    device_id: DeviceId,
    display_name: String,
    address: DeviceAddress,
}

impl<C: DeviceClient> DeviceSession<C> {
    /// Assembles a session from an already-handshaken client.
    ///
    /// Normally called only by [`Authenticator::authenticate`].
    pub fn new(
        client: C,
        device_id: DeviceId,
        display_name: String,
        address: DeviceAddress,
    ) -> Self {
        Self {
            client,
            device_id,
            display_name,
            address,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Last state fetched by [`DeviceSession::refresh`].
    pub fn state(&self) -> FanState {
        self.client.state()
    }

    /// Re-runs the identity handshake on the existing session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange cannot complete.
    pub async fn handshake(&mut self) -> Result<bool, ClientError> {
        self.client.initialize().await
    }

    /// Fetches the current device state.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the exchange cannot complete.
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        self.client.refresh().await
    }
}

/// Authenticates candidate devices through a [`DeviceConnector`].
pub struct Authenticator<N: DeviceConnector> {
    connector: std::sync::Arc<N>,
    timeout: Duration,
}

impl<N: DeviceConnector> Authenticator<N> {
    pub fn new(connector: std::sync::Arc<N>) -> Self {
        Self {
            connector,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Opens a session to `address` and runs the identity handshake.
    ///
    /// On success the returned session carries the device-reported id and a
    /// display name of the form `"{credentials.name} {id}"`, so several fans
    /// configured in one system get distinct names.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Connection`] when the exchange cannot complete
    /// within the deadline and [`AuthError::InvalidIdentity`] when it
    /// completes without resolving a real identity.
    pub async fn authenticate(
        &self,
        address: &DeviceAddress,
        credentials: &Credentials,
    ) -> Result<DeviceSession<N::Client>, AuthError> {
        debug!(
            "authenticating device at {address} with device_id={}",
            credentials.device_id
        );

        // One fresh client per candidate; nothing is shared between attempts.
        let mut client = self.connector.connect(address, credentials);

        let init_ok = match tokio::time::timeout(self.timeout, client.initialize()).await {
            Err(_) => {
                warn!("handshake with {address} timed out after {:?}", self.timeout);
                return Err(AuthError::Connection {
                    address: address.clone(),
                    source: ClientError::Timeout(self.timeout),
                });
            }
            Ok(Err(source)) => {
                warn!("handshake with {address} failed: {source}");
                return Err(AuthError::Connection {
                    address: address.clone(),
                    source,
                });
            }
            Ok(Ok(confirmed)) => confirmed,
        };

        let resolved = client.device_id();
        if !init_ok || resolved.is_unassigned() {
            warn!("device at {address} completed the handshake without a usable identity");
            return Err(AuthError::InvalidIdentity {
                address: address.clone(),
            });
        }

        let display_name = format!("{} {}", credentials.name, resolved);
        info!("authenticated device {resolved} at {address} as \"{display_name}\"");
        Ok(DeviceSession::new(
            client,
            resolved,
            display_name,
            address.clone(),
        ))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::Arc;

    mock! {
        pub Client {}

        #[async_trait]
        impl DeviceClient for Client {
            async fn initialize(&mut self) -> Result<bool, ClientError>;
            async fn refresh(&mut self) -> Result<(), ClientError>;
            fn device_id(&self) -> DeviceId;
            fn host(&self) -> &str;
            fn port(&self) -> u16;
            fn state(&self) -> FanState;
        }
    }

    /// Connector whose `connect` runs a closure building a scripted client.
    struct ScriptedConnector<F>
    where
        F: Fn() -> MockClient + Send + Sync,
    {
        make: F,
    }

    impl<F> DeviceConnector for ScriptedConnector<F>
    where
        F: Fn() -> MockClient + Send + Sync,
    {
        type Client = MockClient;

        fn connect(&self, _address: &DeviceAddress, _credentials: &Credentials) -> MockClient {
            (self.make)()
        }

        fn discovery_query(&self) -> Vec<u8> {
            b"VENTO?".to_vec()
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            device_id: DeviceId::unassigned(),
            password: "1111".to_string(),
            name: "Vento Expert Fan".to_string(),
        }
    }

    fn address() -> DeviceAddress {
        DeviceAddress::new("10.0.0.5", 4000)
    }

    fn authenticator<F>(make: F) -> Authenticator<ScriptedConnector<F>>
    where
        F: Fn() -> MockClient + Send + Sync,
    {
        Authenticator::new(Arc::new(ScriptedConnector { make }))
    }

    #[tokio::test]
    async fn test_authenticate_resolves_identity_and_suffixes_display_name() {
        // Arrange
        let auth = authenticator(|| {
            let mut client = MockClient::new();
            client.expect_initialize().returning(|| Ok(true));
            client
                .expect_device_id()
                .returning(|| DeviceId::new("002D6E24E495"));
            client
        });

        // Act
        let session = auth
            .authenticate(&address(), &credentials())
            .await
            .expect("authentication must succeed");

        // Assert
        assert_eq!(session.device_id(), &DeviceId::new("002D6E24E495"));
        assert!(!session.device_id().is_unassigned());
        assert_eq!(session.display_name(), "Vento Expert Fan 002D6E24E495");
    }

    #[tokio::test]
    async fn test_authenticate_maps_client_fault_to_connection_error() {
        // Arrange
        let auth = authenticator(|| {
            let mut client = MockClient::new();
            client.expect_initialize().returning(|| {
                Err(ClientError::Network(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )))
            });
            client
        });

        // Act
        let result = auth.authenticate(&address(), &credentials()).await;

        // Assert
        assert!(matches!(result, Err(AuthError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_sentinel_identity_after_handshake() {
        // Handshake reports success but the device still carries the factory
        // placeholder id – that is a failed authentication, not a success.
        let auth = authenticator(|| {
            let mut client = MockClient::new();
            client.expect_initialize().returning(|| Ok(true));
            client.expect_device_id().returning(DeviceId::unassigned);
            client
        });

        let result = auth.authenticate(&address(), &credentials()).await;
        assert!(matches!(result, Err(AuthError::InvalidIdentity { .. })));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_unconfirmed_handshake() {
        // initialize() returning false covers "handshake ran but the device
        // did not confirm it".
        let auth = authenticator(|| {
            let mut client = MockClient::new();
            client.expect_initialize().returning(|| Ok(false));
            client
                .expect_device_id()
                .returning(|| DeviceId::new("002D6E24E495"));
            client
        });

        let result = auth.authenticate(&address(), &credentials()).await;
        assert!(matches!(result, Err(AuthError::InvalidIdentity { .. })));
    }

    // ── Timeout behaviour ─────────────────────────────────────────────────────

    /// A client whose handshake never completes, to exercise the deadline.
    struct HangingClient;

    #[async_trait]
    impl DeviceClient for HangingClient {
        async fn initialize(&mut self) -> Result<bool, ClientError> {
            std::future::pending().await
        }

        async fn refresh(&mut self) -> Result<(), ClientError> {
            Ok(())
        }

        fn device_id(&self) -> DeviceId {
            DeviceId::unassigned()
        }

        fn host(&self) -> &str {
            "10.0.0.5"
        }

        fn port(&self) -> u16 {
            4000
        }

        fn state(&self) -> FanState {
            FanState::default()
        }
    }

    struct HangingConnector;

    impl DeviceConnector for HangingConnector {
        type Client = HangingClient;

        fn connect(&self, _address: &DeviceAddress, _credentials: &Credentials) -> HangingClient {
            HangingClient
        }

        fn discovery_query(&self) -> Vec<u8> {
            Vec::new()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticate_enforces_its_own_deadline() {
        // Arrange – a transport with no timeout of its own
        let auth = Authenticator::new(Arc::new(HangingConnector))
            .with_timeout(Duration::from_millis(200));

        // Act – with the clock paused, the timeout fires as soon as the
        // runtime is otherwise idle
        let result = auth.authenticate(&address(), &credentials()).await;

        // Assert
        match result {
            Err(AuthError::Connection {
                source: ClientError::Timeout(t),
                ..
            }) => assert_eq!(t, Duration::from_millis(200)),
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }
}
