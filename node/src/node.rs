//! The XEL node: opens the chain and runs the periodic work around the
//! consensus engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use xel_store::{ChainStore, StoreError};
use xel_store_lmdb::integrity::{check_data_dir, check_integrity};
use xel_store_lmdb::LmdbEnvironment;
use xel_transactions::{NoWork, WorkRegistry};
use xel_types::{Clock, SystemClock};

use crate::chain_event::{ChainEvent, EventBus};
use crate::config::NodeConfig;
use crate::downloader::{Downloader, DownloaderConfig};
use crate::engine::{ConsensusEngine, EngineConfig, EngineContext};
use crate::error::NodeError;
use crate::forger::Forger;
use crate::metrics::NodeMetrics;
use crate::peer::PeerSet;
use crate::shutdown::ShutdownController;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
/// How often forging accounts check whether their hit has come up.
const FORGING_INTERVAL: Duration = Duration::from_secs(1);
/// How often a due trim of the derived tables is looked for.
const TRIM_INTERVAL: Duration = Duration::from_secs(10);

pub struct XelNode {
    pub config: NodeConfig,
    pub engine: Arc<ConsensusEngine>,
    pub peers: Arc<PeerSet>,
    pub events: Arc<EventBus>,
    pub metrics: Option<Arc<NodeMetrics>>,
    pub shutdown: Arc<ShutdownController>,
    /// Present when forging accounts are configured.
    pub forger: Option<Arc<Forger>>,
    downloader: Arc<Downloader>,
    task_handles: Vec<JoinHandle<()>>,
}

impl XelNode {
    /// Open the LMDB environment under `config.data_dir` and load the chain.
    /// A store that fails its integrity check is refused.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        check_data_dir(&config.data_dir).map_err(StoreError::Corruption)?;
        let env = LmdbEnvironment::open(&config.data_dir, config.map_size).map_err(StoreError::from)?;
        info!(data_dir = %config.data_dir.display(), "LMDB environment opened");
        let report = check_integrity(&env).map_err(StoreError::from)?;
        if !report.is_healthy() {
            error!(errors = ?report.errors, "LMDB integrity check failed");
            return Err(StoreError::Corruption(report.errors.join("; ")).into());
        }
        debug!(
            databases = report.databases_checked,
            entries = report.total_entries,
            height = ?report.chain_height,
            "LMDB integrity check passed"
        );
        Self::with_store(config, Arc::new(env), Arc::new(SystemClock), Arc::new(NoWork))
    }

    /// Build a node on an already opened store.
    pub fn with_store(
        config: NodeConfig,
        store: Arc<dyn ChainStore>,
        clock: Arc<dyn Clock>,
        work: Arc<dyn WorkRegistry>,
    ) -> Result<Self, NodeError> {
        let peers = Arc::new(PeerSet::new());
        let events = Arc::new(EventBus::new());

        let metrics = if config.enable_metrics {
            let metrics = Arc::new(NodeMetrics::new()?);
            let observer = Arc::clone(&metrics);
            events.subscribe(move |event: &ChainEvent<'_>| observer.observe(event));
            Some(metrics)
        } else {
            None
        };

        let engine = Arc::new(ConsensusEngine::open(
            config.chain_params(),
            EngineConfig::from(&config),
            EngineContext {
                store,
                peers: Arc::clone(&peers),
                clock,
                work,
                events: Arc::clone(&events),
            },
        )?);
        if let Some(metrics) = &metrics {
            metrics.chain_height.set(i64::from(engine.height()));
        }
        let downloader = Arc::new(Downloader::new(
            Arc::clone(&engine),
            DownloaderConfig::from(&config),
        )?);

        let forger = (!config.forging_secret_phrases.is_empty())
            .then(|| Arc::new(Forger::new(Arc::clone(&engine), &config.forging_secret_phrases)));

        Ok(Self {
            config,
            engine,
            peers,
            events,
            metrics,
            shutdown: Arc::new(ShutdownController::new()),
            forger,
            downloader,
            task_handles: Vec::new(),
        })
    }

    /// Spawn the background tasks. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        info!(
            network = ?self.config.network,
            height = self.engine.height(),
            forgers = self.config.forging_secret_phrases.len(),
            "XEL node starting"
        );

        let downloader = Arc::clone(&self.downloader);
        self.spawn_periodic(
            "download",
            Duration::from_secs(self.config.download_interval_secs.max(1)),
            move || match downloader.run_once() {
                Ok(report) if report.pushed > 0 || report.fork.is_some() => {
                    debug!(?report, "download pass finished");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "download pass failed"),
            },
        );

        let engine = Arc::clone(&self.engine);
        self.spawn_periodic(
            "mempool-sweep",
            Duration::from_secs(self.config.mempool_sweep_interval_secs.max(1)),
            move || {
                if let Err(fault) = engine.sweep_expired() {
                    error!(%fault, "expired transaction sweep failed");
                }
            },
        );

        if self.config.enable_transaction_rebroadcasting {
            let engine = Arc::clone(&self.engine);
            self.spawn_periodic(
                "rebroadcast",
                Duration::from_secs(self.config.rebroadcast_after_secs.max(1)),
                move || {
                    engine.rebroadcast();
                },
            );
        }

        if self.config.trim_derived_tables {
            let engine = Arc::clone(&self.engine);
            self.spawn_periodic("trim", TRIM_INTERVAL, move || match engine.run_pending_trim() {
                Ok(Some(height)) => info!(height, "derived tables trimmed"),
                Ok(None) => {}
                Err(e) => error!(error = %e, "trim failed"),
            });
        }

        if let Some(forger) = &self.forger {
            let forger = Arc::clone(forger);
            self.spawn_periodic("forging", FORGING_INTERVAL, move || {
                forger.forge_due();
            });
        }
    }

    /// Block until SIGINT/SIGTERM, then stop.
    pub async fn run_until_signal(&mut self) -> Result<(), NodeError> {
        self.shutdown.wait_for_signal().await;
        self.stop().await
    }

    pub async fn stop(&mut self) -> Result<(), NodeError> {
        if self.shutdown.shutdown() {
            info!("XEL node stopping");
        }

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all)
            .await
            .is_err()
        {
            warn!(timeout = ?SHUTDOWN_TIMEOUT, "background tasks did not stop in time");
        }
        info!(height = self.engine.height(), "XEL node stopped");
        Ok(())
    }

    /// Run `work` every `period` on the blocking pool until shutdown. A tick
    /// that arrives while the previous run is still busy is skipped.
    fn spawn_periodic<F>(&mut self, name: &'static str, period: Duration, work: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let mut shutdown_rx = self.shutdown.subscribe();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    received = shutdown_rx.recv() => {
                        if !matches!(received, Err(broadcast::error::RecvError::Lagged(_))) {
                            debug!(task = name, "background task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        let work = Arc::clone(&work);
                        if let Err(e) = tokio::task::spawn_blocking(move || work()).await {
                            error!(task = name, error = %e, "background task panicked");
                        }
                    }
                }
            }
        });
        self.task_handles.push(handle);
    }
}
