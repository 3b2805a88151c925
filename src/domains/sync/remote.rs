use crate::domains::sync::types::{BatchWear, OutfitDraft, OutfitFeedback, ProfileUpdate, SyncOperation};
use crate::domains::wardrobe::types::{ClothingItem, NewClothing, UpdateClothing};
use crate::errors::{SyncError, SyncResult};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

/// Transport timeout for replayed mutations. Uploads configure their own.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote REST API for the wardrobe backend
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn create_clothing(&self, clothing: &NewClothing) -> SyncResult<Value>;

    async fn update_clothing(&self, id: &str, changes: &UpdateClothing) -> SyncResult<Value>;

    async fn delete_clothing(&self, id: &str) -> SyncResult<()>;

    async fn record_wear(&self, id: &str) -> SyncResult<()>;

    async fn batch_record_wear(&self, wear: &BatchWear) -> SyncResult<()>;

    async fn save_outfit(&self, outfit: &OutfitDraft) -> SyncResult<Value>;

    async fn submit_outfit_feedback(&self, feedback: &OutfitFeedback) -> SyncResult<()>;

    async fn update_profile(&self, profile: &ProfileUpdate) -> SyncResult<Value>;

    async fn list_clothes(&self) -> SyncResult<Vec<ClothingItem>>;

    /// Cheap reachability check
    async fn health_check(&self) -> bool;

    /// Replay a queued operation with the matching remote call.
    async fn dispatch(&self, operation: &SyncOperation) -> SyncResult<()> {
        match operation {
            SyncOperation::CreateClothing(clothing) => self.create_clothing(clothing).await.map(|_| ()),
            SyncOperation::UpdateClothing { id, changes } => self.update_clothing(id, changes).await.map(|_| ()),
            SyncOperation::DeleteClothing { id } => self.delete_clothing(id).await,
            SyncOperation::RecordWear { id } => self.record_wear(id).await,
            SyncOperation::BatchRecordWear(wear) => self.batch_record_wear(wear).await,
            SyncOperation::SaveOutfit(outfit) => self.save_outfit(outfit).await.map(|_| ()),
            SyncOperation::OutfitFeedback(feedback) => self.submit_outfit_feedback(feedback).await,
            SyncOperation::UpdateProfile(profile) => self.update_profile(profile).await.map(|_| ()),
        }
    }
}

/// reqwest-backed implementation of [`RemoteApi`]
pub struct ApiRemoteService {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl ApiRemoteService {
    pub fn new(base_url: &str, api_token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn clothing_url(&self, id: &str, suffix: &str) -> String {
        self.url(&format!("/api/clothes/{}{}", urlencoding::encode(id), suffix))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("Remote call failed with HTTP {}: {}", status.as_u16(), message);
            return Err(SyncError::HttpStatus { status: status.as_u16(), message });
        }
        Ok(response)
    }

    /// Parse a JSON body, treating an empty body as `null`.
    async fn json_body(response: Response) -> SyncResult<Value> {
        let bytes = response.bytes().await.map_err(|e| SyncError::Network(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Accepts either a bare array or `{ "clothes": [...] }`.
pub(crate) fn parse_clothes_listing(body: Value) -> SyncResult<Vec<ClothingItem>> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("clothes") {
            Some(Value::Array(items)) => items,
            _ => return Err(SyncError::Serialization("Listing response has no clothes array".to_string())),
        },
        _ => return Err(SyncError::Serialization("Unexpected listing response".to_string())),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ClothingItem>(item) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping unreadable remote clothing item: {}", e);
                None
            }
        })
        .collect())
}

#[async_trait]
impl RemoteApi for ApiRemoteService {
    async fn create_clothing(&self, clothing: &NewClothing) -> SyncResult<Value> {
        debug!("POST /api/clothes");
        let response = self.send(self.client.post(self.url("/api/clothes")).json(clothing)).await?;
        Self::json_body(response).await
    }

    async fn update_clothing(&self, id: &str, changes: &UpdateClothing) -> SyncResult<Value> {
        debug!("PUT /api/clothes/{}", id);
        let response = self.send(self.client.put(self.clothing_url(id, "")).json(changes)).await?;
        Self::json_body(response).await
    }

    async fn delete_clothing(&self, id: &str) -> SyncResult<()> {
        debug!("DELETE /api/clothes/{}", id);
        self.send(self.client.delete(self.clothing_url(id, ""))).await?;
        Ok(())
    }

    async fn record_wear(&self, id: &str) -> SyncResult<()> {
        self.send(self.client.post(self.clothing_url(id, "/wear")).json(&serde_json::json!({}))).await?;
        Ok(())
    }

    async fn batch_record_wear(&self, wear: &BatchWear) -> SyncResult<()> {
        self.send(self.client.post(self.url("/api/clothes/batch-wear")).json(wear)).await?;
        Ok(())
    }

    async fn save_outfit(&self, outfit: &OutfitDraft) -> SyncResult<Value> {
        let response = self.send(self.client.post(self.url("/api/outfits/save")).json(outfit)).await?;
        Self::json_body(response).await
    }

    async fn submit_outfit_feedback(&self, feedback: &OutfitFeedback) -> SyncResult<()> {
        self.send(self.client.post(self.url("/api/outfits/feedback")).json(feedback)).await?;
        Ok(())
    }

    async fn update_profile(&self, profile: &ProfileUpdate) -> SyncResult<Value> {
        let response = self.send(self.client.put(self.url("/api/auth/profile")).json(profile)).await?;
        Self::json_body(response).await
    }

    async fn list_clothes(&self) -> SyncResult<Vec<ClothingItem>> {
        let response = self.send(self.client.get(self.url("/api/clothes"))).await?;
        parse_clothes_listing(Self::json_body(response).await?)
    }

    async fn health_check(&self) -> bool {
        match self.client.get(self.url("/health")).timeout(CONNECT_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_sends_put_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/clothes/abc")
            .match_header("authorization", "Bearer secret")
            .match_body(mockito::Matcher::Json(json!({"favorite": true})))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let api = ApiRemoteService::new(&server.url(), Some("secret".to_string()));
        let body = api
            .update_clothing("abc", &UpdateClothing { favorite: Some(true), ..Default::default() })
            .await
            .unwrap();

        assert_eq!(body, json!({"ok": true}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dispatch_routes_wear_and_maps_status() {
        let mut server = mockito::Server::new_async().await;
        let wear = server.mock("POST", "/api/clothes/abc/wear").with_status(204).create_async().await;
        let batch = server
            .mock("POST", "/api/clothes/batch-wear")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let api = ApiRemoteService::new(&server.url(), None);
        api.dispatch(&SyncOperation::RecordWear { id: "abc".into() }).await.unwrap();

        let err = api
            .dispatch(&SyncOperation::BatchRecordWear(BatchWear { clothing_ids: vec!["abc".into()], worn_at: None }))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::HttpStatus { status: 500, ref message } if message == "boom"));
        assert!(err.is_remote());

        wear.assert_async().await;
        batch.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let api = ApiRemoteService::new("http://127.0.0.1:1", None);
        let err = api.delete_clothing("abc").await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert!(!api.health_check().await);
    }

    #[test]
    fn test_parse_clothes_listing_shapes() {
        let wrapped = json!({"clothes": [{"_id": "a", "category": "tops", "imageUrl": "/uploads/a.jpg"}]});
        let items = parse_clothes_listing(wrapped).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].record.id, "a");
        assert_eq!(items[0].image_url.as_deref(), Some("/uploads/a.jpg"));

        let bare = json!([{"id": "b", "category": "shoes"}, "bogus"]);
        assert_eq!(parse_clothes_listing(bare).unwrap().len(), 1);

        let sparse = json!({"clothes": [
            {"_id": "c", "category": "tops", "colors": null, "tags": null},
            {"_id": "d", "notes": "no category"}
        ]});
        let items = parse_clothes_listing(sparse).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].record.colors.is_empty());
        assert_eq!(items[1].record.category, "");

        assert!(parse_clothes_listing(json!({"items": []})).is_err());
    }
}
