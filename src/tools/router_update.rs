//! 路由器配置更新能力
//!
//! 状态文件结构：`{ "<router_id>": { "<interface>": { "<setting>": "<value>" } } }`。
//! 每次更新读-改-写整个文件，并返回变更前后的值。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::tools::{schema::schema_for_args, Capability};

/// router_update 参数
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RouterUpdateArgs {
    /// 路由器标识，如 "edge-r1"
    pub router_id: String,
    /// 接口名，如 "GigabitEthernet0/1"
    pub interface: String,
    /// 要修改的配置项，如 "mtu"、"admin_state"
    pub setting: String,
    /// 新值
    pub value: String,
}

pub struct RouterUpdateTool {
    state_file: PathBuf,
    lock: Mutex<()>,
}

impl RouterUpdateTool {
    pub fn new(state_file: impl AsRef<Path>) -> Self {
        Self {
            state_file: state_file.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Map<String, Value>, String> {
        match tokio::fs::read_to_string(&self.state_file).await {
            Ok(s) if s.trim().is_empty() => Ok(Map::new()),
            Ok(s) => serde_json::from_str(&s).map_err(|e| format!("Corrupt router state: {}", e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(format!("Failed to read router state: {}", e)),
        }
    }

    async fn store(&self, state: &Map<String, Value>) -> Result<(), String> {
        if let Some(parent) = self.state_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("Failed to create state dir: {}", e))?;
        }
        let json = serde_json::to_string_pretty(state).map_err(|e| e.to_string())?;
        tokio::fs::write(&self.state_file, json)
            .await
            .map_err(|e| format!("Failed to write router state: {}", e))
    }

    /// 应用一次更新，返回旧值
    async fn apply(&self, update: &RouterUpdateArgs) -> Result<Option<String>, String> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let router = state
            .entry(update.router_id.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let interface = router
            .as_object_mut()
            .ok_or_else(|| format!("Router {} has malformed state", update.router_id))?
            .entry(update.interface.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        let settings = interface
            .as_object_mut()
            .ok_or_else(|| format!("Interface {} has malformed state", update.interface))?;
        let previous = settings
            .insert(update.setting.clone(), Value::String(update.value.clone()))
            .and_then(|v| v.as_str().map(str::to_string));
        self.store(&state).await?;
        Ok(previous)
    }
}

#[async_trait]
impl Capability for RouterUpdateTool {
    fn name(&self) -> &str {
        "router_update"
    }

    fn description(&self) -> &str {
        "Update one configuration setting of a router interface. Args: {\"router_id\": \"...\", \"interface\": \"...\", \"setting\": \"...\", \"value\": \"...\"}"
    }

    fn input_schema(&self) -> Value {
        schema_for_args::<RouterUpdateArgs>()
    }

    async fn invoke(&self, args: Value) -> Result<String, String> {
        let update: RouterUpdateArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
        if update.router_id.trim().is_empty() || update.interface.trim().is_empty() {
            return Err("router_id and interface must not be empty".to_string());
        }
        let previous = self.apply(&update).await?;
        tracing::info!(
            router = %update.router_id,
            interface = %update.interface,
            setting = %update.setting,
            "router configuration updated"
        );
        Ok(match previous {
            Some(old) => format!(
                "{} {}: {} changed from {} to {}",
                update.router_id, update.interface, update.setting, old, update.value
            ),
            None => format!(
                "{} {}: {} set to {}",
                update.router_id, update.interface, update.setting, update.value
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: &str) -> Value {
        json!({
            "router_id": "edge-r1",
            "interface": "Gi0/1",
            "setting": "admin_state",
            "value": value
        })
    }

    #[tokio::test]
    async fn test_router_update_reports_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RouterUpdateTool::new(dir.path().join("routers.json"));

        let first = tool.invoke(args("down")).await.unwrap();
        assert_eq!(first, "edge-r1 Gi0/1: admin_state set to down");
        let second = tool.invoke(args("up")).await.unwrap();
        assert_eq!(second, "edge-r1 Gi0/1: admin_state changed from down to up");

        let state: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("routers.json")).unwrap())
                .unwrap();
        assert_eq!(state["edge-r1"]["Gi0/1"]["admin_state"], "up");
    }

    #[tokio::test]
    async fn test_router_update_rejects_empty_ids() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RouterUpdateTool::new(dir.path().join("routers.json"));
        let err = tool
            .invoke(json!({"router_id": " ", "interface": "Gi0/1", "setting": "mtu", "value": "1500"}))
            .await
            .unwrap_err();
        assert!(err.contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_router_update_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routers.json");
        std::fs::write(&path, "not json").unwrap();
        let tool = RouterUpdateTool::new(&path);
        let err = tool.invoke(args("up")).await.unwrap_err();
        assert!(err.contains("Corrupt"));
    }
}
