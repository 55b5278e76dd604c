use core::time::Duration;

use anyhow::{Context as _, Result, bail};
use async_trait::async_trait;
use bot_core::{ApiClient, GroupModeration};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

/// The account the gateway is logged in as.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoginInfo {
    pub user_id: i64,
    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: String,
    retcode: i64,
    #[serde(default)]
    wording: Option<String>,
    #[serde(default)]
    data: Value,
}

/// The gateway's HTTP api: `POST <base>/<action>` with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpApi {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, access_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            access_token,
        })
    }

    /// Calls one api action and returns its `data`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status or a non-zero
    /// `retcode`.
    pub async fn call(&self, action: &str, params: Value) -> Result<Value> {
        let url = format!("{}/{action}", self.base_url);
        let mut request = self.client.post(&url).json(&params);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response: ApiResponse = request
            .send()
            .await
            .with_context(|| format!("calling {action}"))?
            .error_for_status()
            .with_context(|| format!("{action} returned an error status"))?
            .json()
            .await
            .with_context(|| format!("decoding {action} response"))?;
        debug!(action, status = %response.status, retcode = response.retcode, "Api response");
        if response.retcode != 0 {
            bail!(
                "{action} failed with retcode {}: {}",
                response.retcode,
                response.wording.as_deref().unwrap_or("no details")
            );
        }
        Ok(response.data)
    }

    /// # Errors
    ///
    /// See [`HttpApi::call`]; also fails if `data` is not a login info object.
    pub async fn get_login_info(&self) -> Result<LoginInfo> {
        let data = self.call("get_login_info", json!({})).await?;
        serde_json::from_value(data).context("decoding get_login_info data")
    }

    /// # Errors
    ///
    /// See [`HttpApi::call`].
    pub async fn set_friend_add_request(&self, flag: &str, approve: bool, remark: &str) -> Result<()> {
        self.call(
            "set_friend_add_request",
            json!({"flag": flag, "approve": approve, "remark": remark}),
        )
        .await
        .map(drop)
    }

    /// # Errors
    ///
    /// See [`HttpApi::call`].
    pub async fn set_group_add_request(
        &self,
        flag: &str,
        sub_type: &str,
        approve: bool,
        reason: &str,
    ) -> Result<()> {
        self.call(
            "set_group_add_request",
            json!({"flag": flag, "sub_type": sub_type, "approve": approve, "reason": reason}),
        )
        .await
        .map(drop)
    }
}

#[async_trait]
impl ApiClient for HttpApi {
    async fn send_private_msg(&self, user_id: i64, message: &str) -> Result<()> {
        self.call(
            "send_private_msg",
            json!({"user_id": user_id, "message": message}),
        )
        .await
        .map(drop)
    }

    async fn send_group_msg(&self, group_id: i64, message: &str) -> Result<()> {
        self.call(
            "send_group_msg",
            json!({"group_id": group_id, "message": message}),
        )
        .await
        .map(drop)
    }
}

#[async_trait]
impl GroupModeration for HttpApi {
    async fn set_group_ban(&self, group_id: i64, user_id: i64, duration: Duration) -> Result<()> {
        self.call(
            "set_group_ban",
            json!({"group_id": group_id, "user_id": user_id, "duration": duration.as_secs()}),
        )
        .await
        .map(drop)
    }

    async fn set_group_whole_ban(&self, group_id: i64, enable: bool) -> Result<()> {
        self.call(
            "set_group_whole_ban",
            json!({"group_id": group_id, "enable": enable}),
        )
        .await
        .map(drop)
    }

    async fn set_group_admin(&self, group_id: i64, user_id: i64, enable: bool) -> Result<()> {
        self.call(
            "set_group_admin",
            json!({"group_id": group_id, "user_id": user_id, "enable": enable}),
        )
        .await
        .map(drop)
    }

    async fn set_group_card(&self, group_id: i64, user_id: i64, card: &str) -> Result<()> {
        self.call(
            "set_group_card",
            json!({"group_id": group_id, "user_id": user_id, "card": card}),
        )
        .await
        .map(drop)
    }

    async fn set_group_name(&self, group_id: i64, name: &str) -> Result<()> {
        self.call(
            "set_group_name",
            json!({"group_id": group_id, "group_name": name}),
        )
        .await
        .map(drop)
    }

    async fn set_group_leave(&self, group_id: i64, dismiss: bool) -> Result<()> {
        self.call(
            "set_group_leave",
            json!({"group_id": group_id, "is_dismiss": dismiss}),
        )
        .await
        .map(drop)
    }

    async fn set_group_special_title(&self, group_id: i64, user_id: i64, title: &str) -> Result<()> {
        // -1: the title never expires
        self.call(
            "set_group_special_title",
            json!({"group_id": group_id, "user_id": user_id, "special_title": title, "duration": -1}),
        )
        .await
        .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_loses_trailing_slash() {
        let api = HttpApi::new("http://127.0.0.1:5700/", None).unwrap();
        assert_eq!(api.base_url, "http://127.0.0.1:5700");
    }

    #[test]
    fn response_defaults_tolerate_sparse_bodies() {
        let response: ApiResponse = serde_json::from_str(r#"{"retcode": 100}"#).unwrap();
        assert_eq!(response.retcode, 100);
        assert!(response.data.is_null());
        assert!(response.wording.is_none());
    }

    #[test]
    fn login_info_tolerates_missing_nickname() {
        let info: LoginInfo = serde_json::from_value(json!({"user_id": 42})).unwrap();
        assert_eq!(info.user_id, 42);
        assert!(info.nickname.is_empty());
    }

    #[tokio::test]
    async fn moderation_calls_surface_transport_errors() {
        // nothing listens on the discard port
        let api = HttpApi::new("http://127.0.0.1:9", None).unwrap();
        let err = api
            .set_group_ban(100, 7, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("calling set_group_ban"));
    }
}
