use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::{infer, Value};

/// Current audio volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    pub level: i32,
    pub muted: bool,
}

/// Remote control at `/Remote`.
pub struct Remote {
    object: RemoteObject,
}

remote_interface!(Remote, "Remote", "/Remote", ".remote");

impl Remote {
    pub async fn enable(&self) -> Result<Reply, VdrError> {
        self.object.call("Enable", vec![]).await
    }

    pub async fn disable(&self) -> Result<Reply, VdrError> {
        self.object.call("Disable", vec![]).await
    }

    pub async fn status(&self) -> Result<Reply, VdrError> {
        self.object.call("Status", vec![]).await
    }

    /// Press a key, e.g. `"Menu"` or `"Ok"`.
    pub async fn hit_key(&self, key: &str) -> Result<Reply, VdrError> {
        self.object.call("HitKey", vec![Value::from(key)]).await
    }

    pub async fn hit_keys(&self, keys: Vec<String>) -> Result<Reply, VdrError> {
        self.object.call("HitKeys", vec![keys.into()]).await
    }

    /// Show a selection menu; the answer arrives as an `AskUserSelect` signal.
    pub async fn ask_user(
        &self,
        question: impl ToString,
        answers: Vec<String>,
    ) -> Result<Reply, VdrError> {
        self.object
            .call(
                "AskUser",
                vec![Value::Str(question.to_string()), answers.into()],
            )
            .await
    }

    pub async fn call_plugin(&self, plugin: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("CallPlugin", vec![Value::Str(plugin.to_string())])
            .await
    }

    /// Switch to a channel number, channel id or `"+"`/`"-"`.
    pub async fn switch_channel(&self, channel: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("SwitchChannel", vec![Value::Str(channel.to_string())])
            .await
    }

    pub async fn get_volume(&self) -> Result<Reply, VdrError> {
        self.object.call("GetVolume", vec![]).await
    }

    pub async fn volume(&self) -> Result<Volume, VdrError> {
        let reply = self.get_volume().await?;
        Ok(Volume {
            level: reply.get(0)?,
            muted: reply.get(1)?,
        })
    }

    /// Set an absolute volume (integer) or a relative/mute command (string
    /// such as `"+10"` or `"mute"`).
    pub async fn set_volume(&self, volume: impl Into<Value>) -> Result<Reply, VdrError> {
        let volume = infer(&volume.into())?;
        self.object.call("SetVolume", vec![volume.into()]).await
    }
}
