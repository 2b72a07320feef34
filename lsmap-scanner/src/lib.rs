pub mod dispatch;
pub mod error;
pub mod harvest;
pub mod mapper;
pub mod output;
pub mod record;
pub mod resolver;

pub use dispatch::DedupSet;
pub use error::ScanError;
pub use harvest::{HarvestClient, HarvestConfig, HarvestStep};
pub use mapper::{Mapper, ProgressCallback, StatsSnapshot};
pub use output::{Line, OutputReceivers, OutputSink, Stream};
pub use record::{CandidateRecord, DiscoveryEdge, ResolvedAddress, TestDescriptor};
pub use resolver::{EndpointResolver, NameResolver, SystemResolver};
