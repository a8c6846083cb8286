use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::Value;

/// OSD skins at `/Skin`.
pub struct Skin {
    object: RemoteObject,
}

remote_interface!(Skin, "Skin", "/Skin", ".skin");

impl Skin {
    /// Show a message on the OSD.
    pub async fn queue_message(&self, message: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("QueueMessage", vec![Value::Str(message.to_string())])
            .await
    }

    pub async fn list_skins(&self) -> Result<Reply, VdrError> {
        self.object.call("ListSkins", vec![]).await
    }

    pub async fn current_skin(&self) -> Result<Reply, VdrError> {
        self.object.call("CurrentSkin", vec![]).await
    }

    pub async fn set_skin(&self, name: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("SetSkin", vec![Value::Str(name.to_string())])
            .await
    }
}
