use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;

/// The base service object at `/vdr`.
pub struct Vdr {
    object: RemoteObject,
}

remote_interface!(Vdr, "Vdr", "/vdr", ".vdr");

impl Vdr {
    /// VDR's own startup status (`Start`, `Ready` or `Stop`).
    pub async fn status(&self) -> Result<Reply, VdrError> {
        self.object.call("Status", vec![]).await
    }
}
