use super::{field, remote_interface, struct_fields, RemoteObject, Reply};
use crate::error::VdrError;
use crate::value::Value;

/// A loaded VDR plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    pub name: String,
    pub version: String,
}

/// Plugin manager at `/Plugins`.
pub struct Plugins {
    object: RemoteObject,
}

remote_interface!(Plugins, "Plugins", "/Plugins", ".pluginmanager");

impl Plugins {
    pub async fn list(&self) -> Result<Vec<Plugin>, VdrError> {
        let reply = self.list_raw().await?;
        let items = reply
            .value(0)?
            .as_slice()
            .ok_or_else(|| VdrError::decode("Plugins.List", "expected an array of plugins"))?;
        items
            .iter()
            .map(|item| {
                let fields = struct_fields(item, "Plugins.List", 2)?;
                Ok(Plugin {
                    name: field(fields, 0, "Plugins.List")?,
                    version: field(fields, 1, "Plugins.List")?,
                })
            })
            .collect()
    }

    pub async fn list_raw(&self) -> Result<Reply, VdrError> {
        self.object.call("List", vec![]).await
    }

    /// Run an SVDRP command of a plugin.
    pub async fn svdrp_command(
        &self,
        plugin: &str,
        command: impl ToString,
        parameter: impl ToString,
    ) -> Result<Reply, VdrError> {
        self.plugin_object(plugin)
            .await?
            .call(
                "SVDRPCommand",
                vec![
                    Value::Str(command.to_string()),
                    Value::Str(parameter.to_string()),
                ],
            )
            .await
    }

    /// Call a plugin's service interface.
    pub async fn service(
        &self,
        plugin: &str,
        id: impl ToString,
        data: impl ToString,
    ) -> Result<Reply, VdrError> {
        self.plugin_object(plugin)
            .await?
            .call(
                "Service",
                vec![Value::Str(id.to_string()), Value::Str(data.to_string())],
            )
            .await
    }

    /// Each plugin lives at `/Plugins/<name>`, with dashes mapped to underscores.
    async fn plugin_object(&self, plugin: &str) -> Result<RemoteObject, VdrError> {
        let path = format!("{}/{}", self.object.object_path(), plugin.replace('-', "_"));
        RemoteObject::bind(
            self.object.transport().clone(),
            self.object.identity(),
            &path,
            ".plugin",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::testing::bound;

    #[tokio::test]
    async fn test_list_plugins() {
        let (transport, plugins) = bound::<Plugins>().await;
        transport.set_reply(
            "/Plugins",
            "List",
            vec![Value::Array(vec![
                Value::Struct(vec![Value::from("dbus2vdr"), Value::from("33")]),
                Value::Struct(vec![Value::from("epgsearch"), Value::from("2.4.1")]),
            ])],
        );

        let list = plugins.list().await.unwrap();
        assert_eq!(
            list[1],
            Plugin {
                name: "epgsearch".to_string(),
                version: "2.4.1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_svdrp_command_binds_plugin_path() {
        let (transport, plugins) = bound::<Plugins>().await;
        plugins.svdrp_command("live-plus", "LSTT", 1).await.unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.path, "/Plugins/live_plus");
        assert_eq!(call.interface, "de.tvdr.vdr.plugin");
        assert_eq!(call.args, vec![Value::from("LSTT"), Value::from("1")]);
    }

    #[tokio::test]
    async fn test_service_on_missing_plugin() {
        let (transport, plugins) = bound::<Plugins>().await;
        transport.fail_resolve("/Plugins/nope", true);
        assert!(matches!(
            plugins.service("nope", "id", "").await,
            Err(VdrError::Binding { .. })
        ));
    }
}
