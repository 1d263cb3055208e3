/// OpenAI 批处理 API 客户端
///
/// 封装 Files / Batches 接口的 HTTP 调用
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::clients::batch_api::BatchApi;
use crate::config::Config;
use crate::error::{AppResult, RemoteApiError};
use crate::models::{BatchSnapshot, BATCH_ENDPOINT};

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchListObject {
    #[serde(default)]
    data: Vec<BatchSnapshot>,
}

/// OpenAI 批处理客户端
pub struct OpenAiBatchClient {
    http: reqwest::Client,
    api_key: String,
    api_base_url: String,
    completion_window: String,
}

impl OpenAiBatchClient {
    /// 根据配置创建客户端
    ///
    /// # 返回
    /// 缺少 API 密钥时返回配置错误
    pub fn new(config: &Config) -> AppResult<Self> {
        let api_key = config.require_api_key()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| RemoteApiError::request_failed("client", e))?;

        Ok(Self {
            http,
            api_key,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            completion_window: config.completion_window.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path)
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteApiError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| RemoteApiError::request_failed(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteApiError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, RemoteApiError> {
        let text = self
            .send(endpoint, request)
            .await?
            .text()
            .await
            .map_err(|e| RemoteApiError::request_failed(endpoint, e))?;
        serde_json::from_str(&text).map_err(|source| RemoteApiError::UnexpectedPayload {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

#[async_trait]
impl BatchApi for OpenAiBatchClient {
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<String, RemoteApiError> {
        debug!("上传文件 {} ({} 字节)", filename, bytes.len());
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/jsonl")
            .map_err(|e| RemoteApiError::request_failed("files", e))?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        let file: FileObject = self
            .send_json("files", self.http.post(self.endpoint("files")).multipart(form))
            .await?;
        Ok(file.id)
    }

    async fn create_batch(&self, input_file_id: &str) -> Result<BatchSnapshot, RemoteApiError> {
        let body = json!({
            "input_file_id": input_file_id,
            "endpoint": BATCH_ENDPOINT,
            "completion_window": self.completion_window,
        });
        self.send_json("batches", self.http.post(self.endpoint("batches")).json(&body))
            .await
    }

    async fn retrieve_batch(&self, job_id: &str) -> Result<BatchSnapshot, RemoteApiError> {
        let path = format!("batches/{}", job_id);
        self.send_json(&path, self.http.get(self.endpoint(&path)))
            .await
    }

    async fn download_file(&self, file_id: &str) -> Result<String, RemoteApiError> {
        let path = format!("files/{}/content", file_id);
        self.send(&path, self.http.get(self.endpoint(&path)))
            .await?
            .text()
            .await
            .map_err(|e| RemoteApiError::request_failed(path.as_str(), e))
    }

    async fn list_batches(&self, limit: u32) -> Result<Vec<BatchSnapshot>, RemoteApiError> {
        let request = self
            .http
            .get(self.endpoint("batches"))
            .query(&[("limit", limit)]);
        let list: BatchListObject = self.send_json("batches", request).await?;
        Ok(list.data)
    }
}
