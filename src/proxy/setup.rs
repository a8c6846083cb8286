use super::{remote_interface, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::{infer, Value};

/// Response code of a successful `Setup.Get`.
pub const SETUP_OK: i32 = 900;

/// A setup option with its optional bounds.
///
/// An absent bound is `None`, which keeps "no minimum" apart from a minimum
/// that happens to be zero or the empty string.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupEntry {
    pub name: String,
    pub value: Value,
    pub min: Option<Value>,
    pub max: Option<Value>,
}

impl SetupEntry {
    /// Normalize a raw `(name, options)` pair.
    ///
    /// `options` is either a plain value or a struct of `(value)`,
    /// `(value, max)` or `(value, min, max)`.
    pub fn from_raw(name: impl Into<String>, options: &Value) -> Result<Self, VdrError> {
        let name = name.into();
        let (value, min, max) = match options.unwrap_variant() {
            Value::Struct(fields) => match fields.as_slice() {
                [value] => (value, None, None),
                [value, max] => (value, None, Some(max)),
                [value, min, max] => (value, Some(min), Some(max)),
                _ => {
                    return Err(VdrError::decode(
                        "Setup.List",
                        format!("{} has {} option fields", name, fields.len()),
                    ))
                }
            },
            value => (value, None, None),
        };
        let plain = |value: &Value| value.unwrap_variant().clone();
        Ok(Self {
            value: plain(value),
            min: min.map(plain),
            max: max.map(plain),
            name,
        })
    }
}

/// Setup options at `/Setup`.
pub struct Setup {
    object: RemoteObject,
}

remote_interface!(Setup, "Setup", "/Setup", ".setup");

impl Setup {
    pub async fn list(&self) -> Result<Reply, VdrError> {
        self.object.call("List", vec![]).await
    }

    pub async fn entries(&self) -> Result<Vec<SetupEntry>, VdrError> {
        let reply = self.list().await?;
        let items = reply
            .value(0)?
            .as_slice()
            .ok_or_else(|| VdrError::decode("Setup.List", "expected an array of options"))?;
        items
            .iter()
            .map(|item| match item.as_slice() {
                Some([name, options]) => {
                    let name = name
                        .as_str()
                        .ok_or_else(|| VdrError::decode("Setup.List", "option name is not a string"))?;
                    SetupEntry::from_raw(name, options)
                }
                _ => Err(VdrError::decode("Setup.List", format!("bad option {}", item))),
            })
            .collect()
    }

    /// Raw `(value, code, message)` reply; code 900 means success.
    pub async fn get(&self, option: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("Get", vec![Value::Str(option.to_string())])
            .await
    }

    /// The option's value, or [`VdrError::Remote`] if VDR refused.
    pub async fn get_value(&self, option: impl ToString) -> Result<Value, VdrError> {
        let reply = self.get(option).await?;
        let code: i32 = reply.get(1)?;
        if code == SETUP_OK {
            Ok(reply.value(0)?.unwrap_variant().clone())
        } else {
            Err(VdrError::Remote {
                code,
                message: reply.get(2)?,
            })
        }
    }

    pub async fn set(&self, option: impl ToString, value: impl Into<Value>) -> Result<Reply, VdrError> {
        let value = infer(&value.into())?;
        self.object
            .call("Set", vec![Value::Str(option.to_string()), value.into()])
            .await
    }

    /// Reset an option to its default.
    pub async fn del(&self, option: impl ToString) -> Result<Reply, VdrError> {
        self.object
            .call("Del", vec![Value::Str(option.to_string())])
            .await
    }
}
