//! Service connection lifecycle.
//!
//! A [`ServiceConnection`] owns the handle to the stream service for one
//! client. The handle is released exactly once:
//!
//! - explicitly, by [`ServiceConnection::release`] (what `StreamClient::close` calls), or
//! - on drop, if the owner went away without releasing it (early return,
//!   `?`, panic). The shutdown is then spawned onto the current Tokio
//!   runtime; without a runtime it can only be logged.
//!
//! After release every accessor returns [`ClientError::Closed`].

use crate::error::{ClientError, Result};
use crate::service::StreamService;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct ServiceConnection {
    service: Option<Arc<dyn StreamService>>,
    stream_name: String,
}

impl ServiceConnection {
    pub fn new(service: Arc<dyn StreamService>, stream_name: impl Into<String>) -> Self {
        Self {
            service: Some(service),
            stream_name: stream_name.into(),
        }
    }

    /// The live service handle.
    pub fn service(&self) -> Result<Arc<dyn StreamService>> {
        self.service.as_ref().map(Arc::clone).ok_or(ClientError::Closed)
    }

    pub fn is_released(&self) -> bool {
        self.service.is_none()
    }

    /// Shut the service connection down. Calling it again is a no-op.
    pub async fn release(&mut self) -> Result<()> {
        let Some(service) = self.service.take() else {
            return Ok(());
        };

        service.shutdown().await?;
        info!(stream = %self.stream_name, "Stream service connection released");
        Ok(())
    }
}

impl Drop for ServiceConnection {
    fn drop(&mut self) {
        let Some(service) = self.service.take() else {
            return;
        };

        let stream_name = std::mem::take(&mut self.stream_name);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    stream = %stream_name,
                    "Connection dropped without close, releasing in background"
                );
                handle.spawn(async move {
                    if let Err(e) = service.shutdown().await {
                        error!(
                            stream = %stream_name,
                            error = %e,
                            "Background connection release failed"
                        );
                    }
                });
            }
            Err(_) => {
                error!(
                    stream = %stream_name,
                    "Connection dropped outside a Tokio runtime, shutdown could not be issued"
                );
            }
        }
    }
}
