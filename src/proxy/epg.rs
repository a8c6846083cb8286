use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::{FromValue, Value};
use std::collections::BTreeMap;

/// One EPG event, decoded from its `a(sv)` key/value list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpgEntry {
    pub channel_id: Option<String>,
    pub event_id: Option<u32>,
    pub title: Option<String>,
    pub short_text: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub duration: Option<u64>,
    pub vps: Option<u64>,
    pub running_status: Option<i32>,
    pub parental_rating: Option<i32>,
    pub has_timer: Option<bool>,
    pub content_id: Option<Value>,
    pub content: Option<Value>,
}

impl EpgEntry {
    pub fn from_value(value: &Value) -> Result<Self, VdrError> {
        let pairs = value
            .as_slice()
            .ok_or_else(|| VdrError::decode("EPG entry", format!("expected a(sv), got {}", value)))?;

        let mut fields = BTreeMap::new();
        for pair in pairs {
            match pair.as_slice() {
                Some([key, value]) => {
                    if let Some(key) = key.as_str() {
                        fields.insert(key.to_string(), value.unwrap_variant().clone());
                    }
                }
                _ => return Err(VdrError::decode("EPG entry", format!("bad pair {}", pair))),
            }
        }

        fn take<T: FromValue>(fields: &BTreeMap<String, Value>, key: &str) -> Option<T> {
            fields.get(key).and_then(T::from_value)
        }

        Ok(Self {
            channel_id: take(&fields, "ChannelID"),
            event_id: take(&fields, "EventID"),
            title: take(&fields, "Title"),
            short_text: take(&fields, "ShortText"),
            description: take(&fields, "Description"),
            start_time: take(&fields, "StartTime"),
            end_time: take(&fields, "EndTime"),
            duration: take(&fields, "Duration"),
            vps: take(&fields, "Vps"),
            running_status: take(&fields, "RunningStatus"),
            parental_rating: take(&fields, "ParentalRating"),
            has_timer: take(&fields, "HasTimer"),
            content_id: fields.get("ContentID").cloned(),
            content: fields.get("Content").cloned(),
        })
    }
}

/// Electronic programme guide at `/EPG`.
pub struct Epg {
    object: RemoteObject,
}

remote_interface!(Epg, "EPG", "/EPG", ".epg");

impl Epg {
    /// Stop the EIT scanner for `timeout` seconds (VDR default 3600).
    pub async fn disable_scanner(&self, timeout: i32) -> Result<Reply, VdrError> {
        self.object
            .call("DisableScanner", vec![Value::Int32(timeout)])
            .await
    }

    pub async fn enable_scanner(&self) -> Result<Reply, VdrError> {
        self.object.call("EnableScanner", vec![]).await
    }

    pub async fn clear_epg(&self, channel: impl ToString, timeout: i32) -> Result<Reply, VdrError> {
        self.object
            .call(
                "ClearEPG",
                vec![Value::Str(channel.to_string()), Value::Int32(timeout)],
            )
            .await
    }

    /// Feed EPG data in `PUTE` format, one line per element.
    pub async fn put_entry(&self, lines: Vec<String>) -> Result<Reply, VdrError> {
        self.object.call("PutEntry", vec![lines.into()]).await
    }

    pub async fn put_file(&self, filename: &str) -> Result<Reply, VdrError> {
        self.object.call("PutFile", vec![Value::from(filename)]).await
    }

    pub async fn now(&self, channel: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("Now", vec![Value::Str(channel.to_string())])
            .await
    }

    pub async fn next(&self, channel: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("Next", vec![Value::Str(channel.to_string())])
            .await
    }

    /// Events at a unix timestamp.
    pub async fn at(&self, channel: impl ToString, time: u64) -> Result<Reply, VdrError> {
        self.object
            .call(
                "At",
                vec![Value::Str(channel.to_string()), Value::UInt64(time)],
            )
            .await
    }

    /// The running event on `channel`, if any.
    pub async fn now_entry(&self, channel: impl ToString) -> Result<Option<EpgEntry>, VdrError> {
        first_entry(&self.now(channel).await?)
    }

    /// The following event on `channel`, if any.
    pub async fn next_entry(&self, channel: impl ToString) -> Result<Option<EpgEntry>, VdrError> {
        first_entry(&self.next(channel).await?)
    }

    pub async fn at_entry(
        &self,
        channel: impl ToString,
        time: u64,
    ) -> Result<Option<EpgEntry>, VdrError> {
        first_entry(&self.at(channel, time).await?)
    }
}

/// Replies are `(code, message, aa(sv))`; the events are the third element.
fn first_entry(reply: &Reply) -> Result<Option<EpgEntry>, VdrError> {
    let events = reply.value(2)?;
    match events.as_slice() {
        Some(events) => events.first().map(EpgEntry::from_value).transpose(),
        None => Err(VdrError::decode(
            reply.method(),
            format!("expected a list of events, got {}", events),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::testing::bound;

    fn pair(key: &str, value: Value) -> Value {
        Value::Struct(vec![Value::from(key), Value::Variant(Box::new(value))])
    }

    fn event(title: &str) -> Value {
        Value::Array(vec![
            pair("ChannelID", Value::from("S19.2E-1-1019-10301")),
            pair("EventID", Value::UInt32(4711)),
            pair("Title", Value::from(title)),
            pair("StartTime", Value::UInt64(1_700_000_000)),
            pair("Duration", Value::UInt64(1800)),
            pair("HasTimer", Value::Bool(false)),
        ])
    }

    #[tokio::test]
    async fn test_now_entry_takes_first_event() {
        let (transport, epg) = bound::<Epg>().await;
        transport.set_reply(
            "/EPG",
            "Now",
            vec![
                Value::Int32(0),
                Value::from(""),
                Value::Array(vec![event("Tagesschau"), event("Wetter")]),
            ],
        );

        let entry = epg.now_entry("S19.2E-1-1019-10301").await.unwrap().unwrap();
        assert_eq!(entry.title.as_deref(), Some("Tagesschau"));
        assert_eq!(entry.event_id, Some(4711));
        assert_eq!(entry.duration, Some(1800));
        assert_eq!(entry.has_timer, Some(false));
        assert!(entry.description.is_none());
    }

    #[tokio::test]
    async fn test_next_entry_calls_next() {
        let (transport, epg) = bound::<Epg>().await;
        transport.set_reply(
            "/EPG",
            "Next",
            vec![Value::Int32(0), Value::from(""), Value::Array(vec![event("Sport")])],
        );
        let entry = epg.next_entry(1).await.unwrap().unwrap();
        assert_eq!(entry.title.as_deref(), Some("Sport"));
        assert_eq!(transport.calls()[0].method, "Next");
    }

    #[tokio::test]
    async fn test_no_events() {
        let (transport, epg) = bound::<Epg>().await;
        transport.set_reply(
            "/EPG",
            "At",
            vec![Value::Int32(0), Value::from(""), Value::Array(vec![])],
        );
        assert!(epg.at_entry(1, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_epg_coerces_arguments() {
        let (transport, epg) = bound::<Epg>().await;
        epg.clear_epg(5, 60).await.unwrap();
        assert_eq!(
            transport.calls()[0].args,
            vec![Value::from("5"), Value::Int32(60)]
        );
    }
}
