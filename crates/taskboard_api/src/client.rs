use crate::config::ApiConfig;
use crate::error::{ApiError, Result};
use crate::models::{Item, ItemId, Status, UserProfile};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as HttpClient, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Authenticated HTTP client for the Taskboard REST API. Cheap to clone;
/// the underlying connection pool is shared.
#[derive(Clone)]
pub struct BoardClient {
    http: HttpClient,
    config: ApiConfig,
}

impl BoardClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = build_http_client(&config)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_with_body(Method::GET, path, Option::<&Value>::None)
            .await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with_body(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send_expect_empty(Method::DELETE, path, None::<&Value>)
            .await
    }

    pub async fn send_with_body<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url_for(path);
        let mut request = self.http.request(method, url);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        Self::parse_envelope(response).await
    }

    pub async fn send_expect_empty<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path);
        let mut request = self.http.request(method, url);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        Self::ensure_success(response).await
    }

    fn url_for(&self, path: &str) -> String {
        let mut base = self.config.api_root();
        let trimmed = path.trim_start_matches('/');
        base.push_str(trimmed);
        base
    }

    async fn parse_envelope<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            let envelope = response.json::<ApiEnvelope<T>>().await?;
            envelope.into_result()
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Authentication(format!(
                "Access denied ({}) - {}",
                status, body
            )))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(build_http_error(status, &body))
        }
    }

    async fn ensure_success(response: Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            let envelope = response.json::<ApiEnvelope<Value>>().await?;
            envelope.into_unit_result()
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::Authentication(format!(
                "Access denied ({}) - {}",
                status, body
            )))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(build_http_error(status, &body))
        }
    }

    /// Fetches the authenticated user's full item tree, children nested.
    pub async fn fetch_items(&self) -> Result<Vec<Item>> {
        self.get("todos").await
    }

    pub async fn fetch_profile(&self) -> Result<UserProfile> {
        self.get("auth/me").await
    }

    /// Creates an item from a multipart form, optionally scoped to a
    /// parent and optionally carrying an image. Returns the confirmed
    /// item with its server-assigned id.
    pub async fn create_item(&self, draft: &ItemDraft) -> Result<Item> {
        let mut form = Form::new().text("title", draft.title.clone());
        if let Some(description) = &draft.description {
            form = form.text("description", description.clone());
        }
        if let Some(start) = &draft.start_date {
            form = form.text("startDate", start.to_string());
        }
        if let Some(end) = &draft.end_date {
            form = form.text("endDate", end.to_string());
        }
        if let Some(parent_id) = draft.parent_id {
            form = form.text("parentId", i64::from(parent_id).to_string());
        }
        if let Some(image) = &draft.image {
            form = form.part("image", image_part(image)?);
        }

        let response = self
            .http
            .post(self.url_for("todos"))
            .multipart(form)
            .send()
            .await?;
        Self::parse_envelope(response).await
    }

    /// Patches descriptive fields and/or the planned timeline bounds.
    pub async fn update_item(&self, id: ItemId, patch: &FieldPatch) -> Result<Item> {
        let path = format!("todos/{}", id);
        self.patch(&path, patch).await
    }

    /// Replaces the item's image; an empty upload clears it.
    pub async fn update_item_image(&self, id: ItemId, upload: Option<&ImageUpload>) -> Result<Item> {
        let form = match upload {
            Some(image) => Form::new().part("image", image_part(image)?),
            None => Form::new().text("image", String::new()),
        };
        let response = self
            .http
            .patch(self.url_for(&format!("todos/{}/image", id)))
            .multipart(form)
            .send()
            .await?;
        Self::parse_envelope(response).await
    }

    /// Deletes an item; the server cascades to its children.
    pub async fn delete_item(&self, id: ItemId) -> Result<()> {
        let path = format!("todos/{}", id);
        self.delete(&path).await
    }

    /// Sets a single item's status.
    pub async fn set_status(&self, id: ItemId, status: Status) -> Result<Item> {
        let path = format!("todos/{}/status", id);
        let payload = StatusBody { status };
        self.patch(&path, &payload).await
    }

    /// Sends many items' target statuses in one request. If the primary
    /// route is unknown to the server, falls back once to the legacy
    /// route.
    pub async fn set_statuses(&self, updates: &[StatusUpdate]) -> Result<()> {
        let payload = BatchStatusRequest { updates };
        match self
            .send_expect_empty(Method::PATCH, "todos/status/batch", Some(&payload))
            .await
        {
            Err(err) if err.is_not_found() => {
                debug!("batch status route missing, retrying legacy route");
                self.send_expect_empty(Method::PATCH, "todos/batch-status", Some(&payload))
                    .await
            }
            other => other,
        }
    }
}

fn build_http_client(config: &ApiConfig) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        header_value(format!("Bearer {}", config.token))?,
    );
    headers.insert(USER_AGENT, header_value(config.user_agent.clone())?);

    HttpClient::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .map_err(|err| ApiError::Other(err.to_string()))
}

fn header_value(value: String) -> Result<HeaderValue> {
    HeaderValue::from_str(&value).map_err(|err| ApiError::Other(err.to_string()))
}

fn build_http_error(status: StatusCode, body: &str) -> ApiError {
    let message = extract_error_message(body).unwrap_or_else(|| body.to_string());
    ApiError::http(status, message)
}

fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(|m| m.as_str()).map(|s| s.to_string()))
}

fn image_part(image: &ImageUpload) -> Result<Part> {
    let mime = mime_guess::from_path(&image.file_name).first_or_octet_stream();
    Part::bytes(image.bytes.clone())
        .file_name(image.file_name.clone())
        .mime_str(mime.essence_str())
        .map_err(|err| ApiError::Other(err.to_string()))
}

/// Standard response wrapper. A reachable server answering
/// `success: false` is a rejection, not an offline condition.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    fn into_result(self) -> Result<T> {
        if !self.success {
            return Err(ApiError::Rejected(self.message.unwrap_or_default()));
        }
        self.data
            .ok_or_else(|| ApiError::Serialization("response envelope carried no data".to_string()))
    }

    fn into_unit_result(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(ApiError::Rejected(self.message.unwrap_or_default()))
        }
    }
}

/// Fields needed to create an item, mirroring the multipart form.
#[derive(Debug, Clone, Default)]
pub struct ItemDraft {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub parent_id: Option<ItemId>,
    pub image: Option<ImageUpload>,
}

impl ItemDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Raw bytes of an image upload plus the name used for mime sniffing.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Partial update of descriptive fields and timeline bounds. Absent
/// fields are left untouched server-side.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: Status,
}

/// One entry of a batch status request.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub id: ItemId,
    pub status: Status,
}

#[derive(Debug, Serialize)]
struct BatchStatusRequest<'a> {
    updates: &'a [StatusUpdate],
}

#[cfg(test)]
mod tests {
    use super::{BoardClient, StatusUpdate};
    use crate::config::ApiConfig;
    use crate::error::ApiError;
    use crate::models::{ItemId, Status};

    fn client_for(server: &mockito::ServerGuard) -> BoardClient {
        BoardClient::new(ApiConfig::new(server.url(), "test-token")).unwrap()
    }

    #[tokio::test]
    async fn fetch_items_unwraps_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/todos")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(
                r#"{"success":true,"data":[
                    {"id":1,"title":"Buy milk","status":"TODO","children":[
                        {"id":2,"title":"Find wallet","status":"DONE","parentId":1}
                    ]}
                ]}"#,
            )
            .create_async()
            .await;

        let items = client_for(&server).fetch_items().await.unwrap();
        mock.assert_async().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, ItemId::Confirmed(1));
        assert_eq!(items[0].children.len(), 1);
        assert_eq!(items[0].children[0].status, Status::Done);
    }

    #[tokio::test]
    async fn success_false_maps_to_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/todos")
            .with_status(200)
            .with_body(r#"{"success":false,"message":"title must not be empty"}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_items().await.unwrap_err();
        match err {
            ApiError::Rejected(message) => assert_eq!(message, "title must not be empty"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn single_item_envelope_without_data_maps_to_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PATCH", "/api/todos/3/status")
            .with_status(200)
            .with_body(r#"{"success":false,"message":"no such todo"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .set_status(ItemId::Confirmed(3), Status::Done)
            .await
            .unwrap_err();
        match err {
            ApiError::Rejected(message) => assert_eq!(message, "no such todo"),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/todos")
            .with_status(401)
            .with_body("token expired")
            .create_async()
            .await;

        let err = client_for(&server).fetch_items().await.unwrap_err();
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn batch_status_falls_back_to_legacy_route_on_404() {
        let mut server = mockito::Server::new_async().await;
        let primary = server
            .mock("PATCH", "/api/todos/status/batch")
            .with_status(404)
            .with_body(r#"{"message":"not found"}"#)
            .create_async()
            .await;
        let legacy = server
            .mock("PATCH", "/api/todos/batch-status")
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let updates = [StatusUpdate {
            id: ItemId::Confirmed(5),
            status: Status::Done,
        }];
        client_for(&server).set_statuses(&updates).await.unwrap();
        primary.assert_async().await;
        legacy.assert_async().await;
    }

    #[tokio::test]
    async fn delete_accepts_bare_success_envelope() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/api/todos/7")
            .with_status(200)
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        client_for(&server)
            .delete_item(ItemId::Confirmed(7))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn connection_failure_classifies_as_offline() {
        // Nothing listens on this port.
        let config = ApiConfig::new("http://127.0.0.1:9", "tok")
            .with_connect_timeout(std::time::Duration::from_millis(300))
            .with_timeout(std::time::Duration::from_millis(500));
        let client = BoardClient::new(config).unwrap();
        let err = client.fetch_items().await.unwrap_err();
        assert!(err.is_offline(), "unexpected classification: {err:?}");
    }
}
