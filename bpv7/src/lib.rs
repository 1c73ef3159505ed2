/*!
BPv7 bundle format library implementing the subset of RFC 9171 required by
the `tcpclv4` convergence layer: endpoint identifiers, the primary block,
canonical extension blocks, CRC protection and the bundle container itself.

Administrative records, fragmentation reassembly and bundle security
(BPSec, RFC 9172) are out of scope for this core; bundles carrying those
features decode, but their security blocks are preserved only as opaque
extension data.
*/

pub mod block;
pub mod block_flags;
pub mod block_type;
pub mod bundle;
pub mod bundle_flags;
pub mod bundle_id;
pub mod creation_timestamp;
pub mod crc;
pub mod dtn_time;
pub mod eid;
pub mod error;
pub mod primary_block;

pub use bundle::Bundle;
pub use bundle_id::BundleId;
pub use eid::Eid;
pub use error::Error;
