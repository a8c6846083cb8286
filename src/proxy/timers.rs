use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::Value;

/// Timers at `/Timers`.
pub struct Timers {
    object: RemoteObject,
}

remote_interface!(Timers, "Timers", "/Timers", ".timer");

impl Timers {
    pub async fn list(&self) -> Result<Reply, VdrError> {
        self.object.call("List", vec![]).await
    }

    pub async fn list_detailed(&self) -> Result<Reply, VdrError> {
        self.object.call("ListDetailed", vec![]).await
    }

    pub async fn next(&self) -> Result<Reply, VdrError> {
        self.object.call("Next", vec![]).await
    }

    /// Create a timer from its `timers.conf` line.
    pub async fn new_timer(&self, timer: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("New", vec![Value::Str(timer.to_string())])
            .await
    }

    pub async fn delete(&self, id: i32) -> Result<Reply, VdrError> {
        self.object.call("Delete", vec![Value::Int32(id)]).await
    }
}
