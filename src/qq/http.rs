use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::OneBotConfig;
use crate::error::{RelayError, Result};
use crate::qq::api::{GroupMemberInfo, LoginInfo, OneBotApi, VersionInfo};
use crate::qq::segment::RawSegment;

/// OneBot v11 HTTP API client.
pub struct OneBotHttpClient {
    base_url: String,
    access_token: Option<String>,
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
}

impl OneBotHttpClient {
    pub fn new(config: &OneBotConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| RelayError::Network(e.to_string()))?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, payload: Value) -> Result<T> {
        let url = format!("{}/{}", self.base_url, action);
        debug!("onebot call action={}", action);

        let mut request = self.client.post(&url).json(&payload);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Network(format!(
                "onebot {action} returned http {status}"
            )));
        }

        let envelope: ApiResponse = response.json().await?;
        if envelope.status == "failed" || envelope.retcode != 0 {
            // The transport worked; the server rejected the call. Retrying
            // will not change the answer.
            return Err(RelayError::UnknownEntity(format!(
                "onebot {action} failed: retcode={} message={}",
                envelope.retcode,
                envelope.message.unwrap_or_default()
            )));
        }

        serde_json::from_value(envelope.data)
            .map_err(|e| RelayError::Network(format!("onebot {action} bad payload: {e}")))
    }
}

#[derive(Debug, serde::Deserialize)]
struct SendResult {
    message_id: i64,
}

#[async_trait]
impl OneBotApi for OneBotHttpClient {
    async fn get_login_info(&self) -> Result<LoginInfo> {
        self.call("get_login_info", json!({})).await
    }

    async fn get_group_member_info(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<GroupMemberInfo> {
        self.call(
            "get_group_member_info",
            json!({ "group_id": group_id, "user_id": user_id, "no_cache": true }),
        )
        .await
    }

    async fn get_version_info(&self) -> Result<VersionInfo> {
        self.call("get_version_info", json!({})).await
    }

    async fn send_group_msg(&self, group_id: i64, message: &[RawSegment]) -> Result<i64> {
        let result: SendResult = self
            .call(
                "send_group_msg",
                json!({ "group_id": group_id, "message": message }),
            )
            .await?;
        Ok(result.message_id)
    }

    async fn delete_msg(&self, message_id: i64) -> Result<()> {
        let _: Value = self
            .call("delete_msg", json!({ "message_id": message_id }))
            .await?;
        Ok(())
    }

    async fn upload_group_file(&self, group_id: i64, file: &str, name: &str) -> Result<()> {
        let _: Value = self
            .call(
                "upload_group_file",
                json!({ "group_id": group_id, "file": file, "name": name, "folder": "" }),
            )
            .await?;
        Ok(())
    }
}
