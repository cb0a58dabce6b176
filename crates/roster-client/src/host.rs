//! Lifecycle of one registered service.

use crate::client::RegistryClient;
use crate::endpoints::service_router;
use crate::providers::Providers;
use axum::Router;
use roster_common::{Error, Registration, Result, ResultExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A service serving its routes plus the registry endpoints, registered
/// with a registry for as long as it runs.
pub struct ServiceHost {
    registration: Registration,
    client: RegistryClient,
    providers: Arc<Providers>,
    local_addr: SocketAddr,
    cancel_token: CancellationToken,
    server: JoinHandle<std::io::Result<()>>,
}

impl ServiceHost {
    /// Starts serving `routes` on `listener`, then registers.
    ///
    /// Serving comes first: the registry pushes the sync patch to the update
    /// endpoint before it acknowledges the registration.
    pub async fn start(
        listener: TcpListener,
        registration: Registration,
        client: RegistryClient,
        routes: Router,
    ) -> Result<Self> {
        let local_addr = listener.local_addr()?;
        let providers = Arc::new(Providers::new());
        let app = routes.merge(service_router(Arc::clone(&providers)));

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        });

        info!(
            service = %registration.name,
            addr = %local_addr,
            "Service listening"
        );

        if let Err(e) = client.register(&registration).await {
            cancel_token.cancel();
            return Err(e.context(format!("Failed to register {}", registration.name)));
        }

        Ok(Self {
            registration,
            client,
            providers,
            local_addr,
            cancel_token,
            server,
        })
    }

    pub fn providers(&self) -> &Arc<Providers> {
        &self.providers
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Deregisters, then stops the server.
    ///
    /// The server is stopped even when deregistration fails; the
    /// deregistration error is returned afterwards.
    pub async fn shutdown(self) -> Result<()> {
        let deregistered = self
            .client
            .deregister(&self.registration.url)
            .await
            .context(format!("Failed to deregister {}", self.registration.name));
        if let Err(e) = &deregistered {
            warn!("{}", e);
        }

        self.cancel_token.cancel();
        match self.server.await {
            Ok(served) => served?,
            Err(e) => return Err(Error::Protocol(format!("Server task failed: {}", e))),
        }

        info!(service = %self.registration.name, "Service stopped");
        deregistered
    }
}
