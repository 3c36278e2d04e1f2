#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

mod correspondence;
pub use correspondence::find_nearest_targets;

mod error;
pub use error::{IcpError, KabschError};

mod icp;
pub use icp::{
    run_icp, run_icp_downsampled, IcpConfig, IcpResult, NoopSink, RenderSink, Snapshot,
};

mod kabsch;
pub use kabsch::fit_rigid_transform;
