//! Object key layout inside the deployment bucket.
//!
//! ```text
//! {service}/{checksum}/dist.zip   immutable artifact
//! {service}/last-checksum         last built checksum
//! {service}/live-checksum         last successfully deployed checksum
//! ```

use crate::checksum::Checksum;
use crate::service::ServiceId;

pub const DIST_ZIP: &str = "dist.zip";
pub const LAST_CHECKSUM: &str = "last-checksum";
pub const LIVE_CHECKSUM: &str = "live-checksum";

pub fn artifact_key(service: &ServiceId, checksum: &Checksum) -> String {
    format!("{}/{}/{}", service, checksum, DIST_ZIP)
}

pub fn pointer_key(service: &ServiceId, name: &str) -> String {
    format!("{}/{}", service, name)
}
