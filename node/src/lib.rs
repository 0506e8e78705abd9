//! XEL node: the consensus engine and everything that keeps it fed.
//!
//! [`ConsensusEngine`] is the single writer of the chain. It pushes and pops
//! blocks, resolves forks, rescans stored blocks and owns the mempool.
//! [`Downloader`] pulls blocks from heavier peers and [`XelNode`] runs the
//! periodic work (download, mempool sweep, rebroadcast, trim, forging).

pub mod chain;
pub mod chain_event;
pub mod config;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod fork;
pub mod forger;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod peer;
pub mod rescan;
pub mod shutdown;
pub mod tracing_spans;

pub use chain::{ChainState, StoreChain};
pub use chain_event::{ChainEvent, EventBus};
pub use config::NodeConfig;
pub use downloader::{DownloadReport, Downloader, DownloaderConfig};
pub use engine::{ConsensusEngine, EngineConfig, EngineContext};
pub use error::{BlockFault, NodeError, PeerError};
pub use forger::{Forger, MAX_FORGING_FAULTS};
pub use fork::ForkOutcome;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::XelNode;
pub use peer::{Peer, PeerSet};
pub use shutdown::ShutdownController;
