use super::{field, remote_interface, struct_fields, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::Value;
use tracing::debug;

/// A DVB device as reported by `Devices.List`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub index: i32,
    pub number: i32,
    pub has_decoder: bool,
    pub is_primary: bool,
    pub name: String,
}

impl Device {
    fn from_value(value: &Value) -> Result<Self, VdrError> {
        const CONTEXT: &str = "Devices.List";
        let fields = struct_fields(value, CONTEXT, 5)?;
        Ok(Self {
            index: field(fields, 0, CONTEXT)?,
            number: field(fields, 1, CONTEXT)?,
            has_decoder: field(fields, 2, CONTEXT)?,
            is_primary: field(fields, 3, CONTEXT)?,
            name: field(fields, 4, CONTEXT)?,
        })
    }
}

/// Output devices at `/Devices`.
pub struct Devices {
    object: RemoteObject,
}

remote_interface!(Devices, "Devices", "/Devices", ".device");

impl Devices {
    pub async fn get_primary(&self) -> Result<Reply, VdrError> {
        self.object.call("GetPrimary", vec![]).await
    }

    /// Index of the null device; only present when dbus2vdr runs with `--nulldevice`.
    pub async fn null_device(&self) -> Result<i32, VdrError> {
        let index: i32 = self.object.call("GetNullDevice", vec![]).await?.get(0)?;
        if index > -1 {
            Ok(index)
        } else {
            Err(VdrError::NotFound(
                "nulldevice not found. start dbus2vdr with --nulldevice".to_string(),
            ))
        }
    }

    pub async fn request_primary(&self, index: i32) -> Result<Reply, VdrError> {
        self.object
            .call("RequestPrimary", vec![Value::Int32(index)])
            .await
    }

    /// Make the device called `name` the primary device.
    pub async fn request_primary_by_name(&self, name: &str) -> Result<Reply, VdrError> {
        let device = self
            .list()
            .await?
            .into_iter()
            .find(|device| device.name == name)
            .ok_or_else(|| VdrError::NotFound(format!("{} is not available", name)))?;
        debug!("Requesting device {} ({}) as primary", device.index, device.name);
        self.request_primary(device.index).await
    }

    pub async fn list(&self) -> Result<Vec<Device>, VdrError> {
        let reply = self.list_raw().await?;
        let items = reply
            .value(0)?
            .as_slice()
            .ok_or_else(|| VdrError::decode("Devices.List", "expected an array of devices"))?;
        items.iter().map(Device::from_value).collect()
    }

    /// Raw `List` reply.
    pub async fn list_raw(&self) -> Result<Reply, VdrError> {
        self.object.call("List", vec![]).await
    }
}
