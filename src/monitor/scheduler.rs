//! Lifecycle of the prober fleet.
//!
//! One task per configured site. Shutdown is a broadcast: probers stop
//! starting new probes, in-flight requests are cancelled, and the
//! scheduler joins every task before the store is closed behind it.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::alerts::AlertEngine;
use crate::config::SiteConfig;
use crate::storage::Store;

use super::prober::Prober;

pub struct Scheduler {
    stop_tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            stop_tx,
            handles: Vec::new(),
        }
    }

    /// Spawn one prober task per site.
    pub fn start(
        &mut self,
        sites: &[SiteConfig],
        store: Arc<dyn Store>,
        engine: Option<Arc<AlertEngine>>,
    ) -> anyhow::Result<()> {
        for site in sites {
            let prober = Prober::new(site, store.clone(), engine.clone())?;
            info!(
                "starting {} ({}) checking every {}",
                site.name, site.url, site.interval
            );
            self.handles.push(tokio::spawn(prober.run(self.stop_tx.subscribe())));
        }

        info!("monitoring {} sites", sites.len());
        Ok(())
    }

    pub fn prober_count(&self) -> usize {
        self.handles.len()
    }

    /// Signal every prober and wait for all of them to observe it.
    pub async fn shutdown(self) {
        info!("stopping probers");
        let _ = self.stop_tx.send(());

        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!("prober task ended abnormally: {e}");
            }
        }
        info!("all probers stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
