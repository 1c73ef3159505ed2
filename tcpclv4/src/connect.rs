/*!
The outbound dial path: a thin, named entry point over
[`negotiate::Context::dial`] so the module layout mirrors the accept side
(`listen`) even though the contact-header and SESS_INIT exchange itself is
shared code between the two directions.
*/

use crate::negotiate;
use crate::transport;
use std::net::SocketAddr;

/// Dials `remote_addr`, performs the contact-header and SESS_INIT exchange,
/// and spawns the resulting session in the background. Returns once
/// negotiation succeeds and the session task has been spawned; registration
/// in the connection registry happens slightly later, from within that task.
pub async fn dial(ctx: negotiate::Context, remote_addr: SocketAddr) -> Result<(), transport::Error> {
    ctx.dial(remote_addr).await
}
