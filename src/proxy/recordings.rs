use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::{infer, Value};
use std::collections::BTreeMap;

/// A recording with its attributes (`Path`, `Name`, `Title`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub id: i32,
    pub attributes: BTreeMap<String, Value>,
}

impl Recording {
    /// Decode an `(ia(sv))` value.
    pub fn from_value(value: &Value) -> Result<Self, VdrError> {
        let bad = || VdrError::decode("Recordings", format!("bad recording {}", value));
        let fields = value.as_slice().ok_or_else(bad)?;
        let [id, data] = fields else {
            return Err(bad());
        };
        let id = id.as_i64().and_then(|id| i32::try_from(id).ok()).ok_or_else(bad)?;

        let mut attributes = BTreeMap::new();
        for pair in data.as_slice().ok_or_else(bad)? {
            if let Some([key, value]) = pair.as_slice() {
                if let Some(key) = key.as_str() {
                    attributes.insert(key.to_string(), value.unwrap_variant().clone());
                }
            }
        }
        Ok(Self { id, attributes })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("Name").and_then(Value::as_str)
    }

    pub fn path(&self) -> Option<&str> {
        self.get("Path").and_then(Value::as_str)
    }
}

/// Recordings at `/Recordings`.
pub struct Recordings {
    object: RemoteObject,
}

remote_interface!(Recordings, "Recordings", "/Recordings", ".recording");

impl Recordings {
    pub async fn update(&self) -> Result<Reply, VdrError> {
        self.object.call("Update", vec![]).await
    }

    /// Look up a recording by number or path.
    pub async fn get(&self, recording: impl Into<Value>) -> Result<Reply, VdrError> {
        let recording = infer(&recording.into())?;
        self.object.call("Get", vec![recording.into()]).await
    }

    pub async fn list(&self) -> Result<Reply, VdrError> {
        self.object.call("List", vec![]).await
    }

    pub async fn recordings(&self) -> Result<Vec<Recording>, VdrError> {
        let reply = self.list().await?;
        let items = reply
            .value(0)?
            .as_slice()
            .ok_or_else(|| VdrError::decode("Recordings.List", "expected an array"))?;
        items.iter().map(Recording::from_value).collect()
    }

    /// Replay a recording from `start` (a frame, an `hh:mm:ss.ff` string,
    /// or -1 to resume).
    pub async fn play(
        &self,
        recording: impl Into<Value>,
        start: impl Into<Value>,
    ) -> Result<Reply, VdrError> {
        let recording = infer(&recording.into())?;
        let start = infer(&start.into())?;
        self.object
            .call("Play", vec![recording.into(), start.into()])
            .await
    }
}
