// Network monitor backed by configuration, switchable at runtime
use crate::application::upload_ports::NetworkMonitor;
use crate::domain::video::NetworkTransport;
use std::sync::RwLock;

#[derive(Debug)]
pub struct ConfiguredNetworkMonitor {
    transport: RwLock<NetworkTransport>,
}

impl ConfiguredNetworkMonitor {
    pub fn new(transport: NetworkTransport) -> Self {
        Self {
            transport: RwLock::new(transport),
        }
    }

    pub fn set(&self, transport: NetworkTransport) {
        match self.transport.write() {
            Ok(mut current) => *current = transport,
            Err(poisoned) => *poisoned.into_inner() = transport,
        }
        tracing::info!("Network transport set to {:?}", transport);
    }
}

impl NetworkMonitor for ConfiguredNetworkMonitor {
    fn current_transport(&self) -> NetworkTransport {
        match self.transport.read() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_can_be_switched() {
        let monitor = ConfiguredNetworkMonitor::new(NetworkTransport::default());
        assert_eq!(monitor.current_transport(), NetworkTransport::Unmetered);
        monitor.set(NetworkTransport::Offline);
        assert_eq!(monitor.current_transport(), NetworkTransport::Offline);
    }
}
