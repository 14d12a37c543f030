// ── Alarm source adapters ──
//
// Three ingestion styles behind one closed enum: polled REST vendors,
// the long-lived block-framed TCP stream, and the SNMP trap listener.
// The orchestrator only ever talks to `Adapter`.

pub mod polling;
pub mod reconcile;
pub mod stream;
pub mod trap;
pub mod vendor;

use std::sync::Arc;

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::error::CoreError;
use crate::model::SyncResult;
use crate::notify::AlarmNotifier;
use crate::store::AlarmStore;

pub use polling::PollingAdapter;
pub use reconcile::Outcome;
pub use stream::StreamAdapter;
pub use trap::TrapAdapter;
pub use vendor::VendorKind;

/// Shared collaborators handed to every adapter.
#[derive(Clone)]
pub struct AdapterContext {
    pub store: Arc<dyn AlarmStore>,
    pub notifier: Arc<dyn AlarmNotifier>,
    /// Copied into every new-alarm notice.
    pub recipients: Arc<[String]>,
}

impl AdapterContext {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        notifier: Arc<dyn AlarmNotifier>,
        recipients: impl Into<Arc<[String]>>,
    ) -> Self {
        Self {
            store,
            notifier,
            recipients: recipients.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AdapterKind {
    Polling,
    Stream,
    Trap,
}

/// Read-only summary for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterInfo {
    pub name: String,
    pub kind: AdapterKind,
    pub enabled: bool,
    pub target: String,
}

pub enum Adapter {
    Polling(PollingAdapter),
    Stream(StreamAdapter),
    Trap(TrapAdapter),
}

impl Adapter {
    pub fn name(&self) -> &str {
        match self {
            Self::Polling(a) => a.name(),
            Self::Stream(a) => a.name(),
            Self::Trap(a) => a.name(),
        }
    }

    pub fn kind(&self) -> AdapterKind {
        match self {
            Self::Polling(_) => AdapterKind::Polling,
            Self::Stream(_) => AdapterKind::Stream,
            Self::Trap(_) => AdapterKind::Trap,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Polling(a) => a.is_enabled(),
            Self::Stream(a) => a.is_enabled(),
            Self::Trap(a) => a.is_enabled(),
        }
    }

    /// Stream and trap adapters hold a connection or socket open between syncs.
    pub fn is_long_lived(&self) -> bool {
        !matches!(self, Self::Polling(_))
    }

    pub fn describe(&self) -> AdapterInfo {
        let target = match self {
            Self::Polling(a) => a.base_url().to_string(),
            Self::Stream(a) => a.target(),
            Self::Trap(a) => a.target(),
        };
        AdapterInfo {
            name: self.name().to_owned(),
            kind: self.kind(),
            enabled: self.is_enabled(),
            target,
        }
    }

    pub async fn test_connection(&self) -> Result<(), CoreError> {
        match self {
            Self::Polling(a) => a.test_connection().await,
            Self::Stream(a) => a.test_connection().await,
            Self::Trap(a) => a.test_connection().await,
        }
    }

    pub async fn sync(&self) -> SyncResult {
        match self {
            Self::Polling(a) => a.sync().await,
            Self::Stream(a) => a.sync(),
            Self::Trap(a) => a.sync().await,
        }
    }

    /// Bring up long-lived adapters. Polling adapters have nothing to start.
    pub async fn start(&self) -> Result<(), CoreError> {
        match self {
            Self::Polling(_) => Ok(()),
            Self::Stream(a) => {
                a.start();
                Ok(())
            }
            Self::Trap(a) => a.start().await,
        }
    }

    pub async fn stop(&self) {
        match self {
            Self::Polling(_) => {}
            Self::Stream(a) => a.stop().await,
            Self::Trap(a) => a.stop().await,
        }
    }
}

impl From<PollingAdapter> for Adapter {
    fn from(adapter: PollingAdapter) -> Self {
        Self::Polling(adapter)
    }
}

impl From<StreamAdapter> for Adapter {
    fn from(adapter: StreamAdapter) -> Self {
        Self::Stream(adapter)
    }
}

impl From<TrapAdapter> for Adapter {
    fn from(adapter: TrapAdapter) -> Self {
        Self::Trap(adapter)
    }
}
