use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;

/// Playback status at `/Status`. Its signals are handled by [`crate::signals::SignalHub`].
pub struct Status {
    object: RemoteObject,
}

remote_interface!(Status, "Status", "/Status", ".status");

impl Status {
    pub async fn is_replaying(&self) -> Result<Reply, VdrError> {
        self.object.call("IsReplaying", vec![]).await
    }
}
