use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::Value;

/// Channel list at `/Channels`.
pub struct Channels {
    object: RemoteObject,
}

remote_interface!(Channels, "Channels", "/Channels", ".channel");

impl Channels {
    /// Number of channels.
    pub async fn count(&self) -> Result<i32, VdrError> {
        self.object.call("Count", vec![]).await?.get(0)
    }

    pub async fn current(&self) -> Result<Reply, VdrError> {
        self.object.call("Current", vec![]).await
    }

    /// Channels `from..=to`; `to` defaults to the channel count.
    pub async fn get_from_to(&self, from: i32, to: Option<i32>) -> Result<Reply, VdrError> {
        let to = match to {
            Some(to) => to,
            None => self.count().await?,
        };
        self.object
            .call("GetFromTo", vec![Value::Int32(from), Value::Int32(to)])
            .await
    }

    /// The channel at a list index, bounds-checked against [`Channels::count`].
    pub async fn get(&self, index: i32) -> Result<Reply, VdrError> {
        let len = self.count().await?;
        if index < 0 || index >= len {
            return Err(VdrError::IndexOutOfRange { index, len });
        }
        self.get_from_to(index, Some(index)).await
    }

    /// Channels matching `option` (a number, channel id or name; empty for all).
    pub async fn list(&self, option: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("List", vec![Value::Str(option.to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::testing::bound;

    #[tokio::test]
    async fn test_count() {
        let (transport, channels) = bound::<Channels>().await;
        transport.set_reply("/Channels", "Count", vec![Value::Int32(12)]);
        assert_eq!(channels.count().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_get_from_to_defaults_to_count() {
        let (transport, channels) = bound::<Channels>().await;
        transport.set_reply("/Channels", "Count", vec![Value::Int32(7)]);
        channels.get_from_to(2, None).await.unwrap();

        let calls = transport.calls();
        let call = calls.last().unwrap();
        assert_eq!(call.method, "GetFromTo");
        assert_eq!(call.args, vec![Value::Int32(2), Value::Int32(7)]);
    }

    #[tokio::test]
    async fn test_get_out_of_range() {
        let (transport, channels) = bound::<Channels>().await;
        transport.set_reply("/Channels", "Count", vec![Value::Int32(3)]);
        assert!(matches!(
            channels.get(3).await,
            Err(VdrError::IndexOutOfRange { index: 3, len: 3 })
        ));
        assert!(matches!(
            channels.get(-1).await,
            Err(VdrError::IndexOutOfRange { .. })
        ));
        assert!(channels.get(2).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_stringifies_option() {
        let (transport, channels) = bound::<Channels>().await;
        channels.list(5).await.unwrap();
        assert_eq!(transport.calls()[0].args, vec![Value::from("5")]);
    }
}
