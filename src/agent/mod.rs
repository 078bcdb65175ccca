// Agent side: counter sampling, rate smoothing and the reporting loop

pub mod channels;
pub mod endpoint;
pub mod history;
pub mod probe;
pub mod rate;
pub mod reporter;
pub mod sampling;
pub mod smoother;
pub mod transport;

pub use channels::{RateChannel, RateChannels, RateValues};
pub use endpoint::Endpoint;
pub use probe::SystemProbe;
pub use rate::{CounterSnapshot, RateSample, RateSampler};
pub use reporter::{Reporter, ReporterConfig, ReporterState};
pub use smoother::RateSmoother;
pub use transport::{Connector, Transport, WsConnector};
