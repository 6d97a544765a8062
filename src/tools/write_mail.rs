//! 写邮件能力：把邮件草稿（收件人 / 主题 / 正文）以 JSON 写入发件箱目录
//!
//! 不负责发送；草稿文件由外部投递流程消费。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::{schema::schema_for_args, Capability};

/// write_mail 参数
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WriteMailArgs {
    /// 收件人地址
    pub to: String,
    /// 邮件主题
    pub subject: String,
    /// 邮件正文
    pub body: String,
    /// 抄送地址
    #[serde(default)]
    pub cc: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct MailDraft<'a> {
    #[serde(flatten)]
    mail: &'a WriteMailArgs,
    created_at: String,
}

pub struct WriteMailTool {
    outbox: PathBuf,
}

impl WriteMailTool {
    pub fn new(outbox: impl AsRef<Path>) -> Self {
        Self {
            outbox: outbox.as_ref().to_path_buf(),
        }
    }

    async fn save(&self, mail: &WriteMailArgs) -> Result<PathBuf, String> {
        if !mail.to.contains('@') {
            return Err(format!("Invalid recipient address: {}", mail.to));
        }
        tokio::fs::create_dir_all(&self.outbox)
            .await
            .map_err(|e| format!("Failed to create outbox: {}", e))?;

        let now = chrono::Utc::now();
        let file_name = format!(
            "{}-{}.json",
            now.format("%Y%m%dT%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let path = self.outbox.join(file_name);
        let draft = MailDraft {
            mail,
            created_at: now.to_rfc3339(),
        };
        let json = serde_json::to_string_pretty(&draft).map_err(|e| e.to_string())?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| format!("Failed to write draft: {}", e))?;
        Ok(path)
    }
}

#[async_trait]
impl Capability for WriteMailTool {
    fn name(&self) -> &str {
        "write_mail"
    }

    fn description(&self) -> &str {
        "Write an e-mail draft to the outbox. Args: {\"to\": \"...\", \"subject\": \"...\", \"body\": \"...\", \"cc\": [\"...\"]}"
    }

    fn input_schema(&self) -> Value {
        schema_for_args::<WriteMailArgs>()
    }

    async fn invoke(&self, args: Value) -> Result<String, String> {
        let mail: WriteMailArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
        let path = self.save(&mail).await?;
        tracing::info!(to = %mail.to, path = %path.display(), "mail draft written");
        Ok(format!(
            "Mail to {} with subject \"{}\" saved as {}",
            mail.to,
            mail.subject,
            path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::schema::validate;
    use serde_json::json;

    #[tokio::test]
    async fn test_write_mail_creates_draft() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteMailTool::new(dir.path().join("outbox"));
        let out = tool
            .invoke(json!({"to": "noc@example.com", "subject": "Link down", "body": "eth0 flapping"}))
            .await
            .unwrap();
        assert!(out.contains("noc@example.com"));

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("outbox")).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let content = std::fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
        let draft: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(draft["subject"], "Link down");
        assert!(draft["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_write_mail_rejects_bad_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteMailTool::new(dir.path());
        let err = tool
            .invoke(json!({"to": "nobody", "subject": "s", "body": "b"}))
            .await
            .unwrap_err();
        assert!(err.contains("nobody"));
    }

    #[test]
    fn test_schema_requires_body() {
        let tool = WriteMailTool::new("outbox");
        let schema = tool.input_schema();
        assert!(validate(&schema, &json!({"to": "a@b", "subject": "s"})).is_err());
        assert!(validate(&schema, &json!({"to": "a@b", "subject": "s", "body": "b"})).is_ok());
    }
}
