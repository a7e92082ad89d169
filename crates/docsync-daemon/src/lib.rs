pub mod daemon;
pub mod logging;
pub mod transport;

pub use daemon::{DaemonState, DaemonStatus, SessionMetrics, SyncDaemon, SyncSession};
pub use logging::init_logging;
pub use transport::{HttpTransport, LogTransport};
