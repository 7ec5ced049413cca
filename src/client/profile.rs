//! Profile reads and writes, including the photo sub-resource.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{ApiClient, ApiError, check_status};
use crate::store::UserProfile;

/// Field names the backend has been observed using for photo URLs in
/// upload responses.
const PHOTO_FIELDS: &[&str] = &[
    "photoUrl",
    "photoUri",
    "avatarUrl",
    "profilePhoto",
    "imageUrl",
    "photo",
    "url",
    "path",
];

impl ApiClient {
    /// Fetch the profile from the backend and persist it.
    ///
    /// A response that omits the photo does not mean there is none; the
    /// locally persisted reference is reused in that case.
    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let url = self.endpoint("users/profile");
        let response = self.send_authenticated(|http| http.get(&url)).await?;
        let mut profile: UserProfile = self.expect_data(response).await?;

        match profile.photo_url.take() {
            Some(photo) => {
                let absolute = self.absolutize(&photo);
                self.store().set_photo_url(&absolute).await?;
                profile.photo_url = Some(absolute);
            }
            None => {
                profile.photo_url = self.store().photo_url().await?;
            }
        }

        self.store().set_profile(&profile).await?;
        Ok(profile)
    }

    /// Update the user's name and persist the merged result locally.
    pub async fn update_profile(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<UserProfile, ApiError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Update<'a> {
            first_name: &'a str,
            last_name: &'a str,
        }

        let url = self.endpoint("users/profile");
        let response = self
            .send_authenticated(|http| {
                http.put(&url).json(&Update {
                    first_name,
                    last_name,
                })
            })
            .await?;
        check_status(response).await?;

        let mut profile = self.store().profile().await?.unwrap_or_default();
        profile.first_name = Some(first_name.to_string());
        profile.last_name = Some(last_name.to_string());
        self.store().set_profile(&profile).await?;
        Ok(profile)
    }

    /// Upload a profile photo and persist the URL the backend reports for
    /// it. Returns `None` when the response carries no recognizable URL.
    pub async fn upload_photo(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<String>, ApiError> {
        // Validate once up front so the rebuildable request closure cannot
        // fail.
        reqwest::multipart::Part::bytes(Vec::new())
            .mime_str(mime)
            .map_err(|_| ApiError::Invalid(format!("invalid mime type: {}", mime)))?;

        let url = self.endpoint("users/profile/photo");
        let file_name = file_name.to_string();
        let mime = mime.to_string();
        let response = self
            .send_authenticated(|http| {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(&mime)
                    .expect("mime validated above");
                http.post(&url)
                    .multipart(reqwest::multipart::Form::new().part("photo", part))
            })
            .await?;
        let response = check_status(response).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        match extract_photo_url(&body) {
            Some(photo) => {
                let absolute = self.absolutize(&photo);
                self.store().set_photo_url(&absolute).await?;
                Ok(Some(absolute))
            }
            None => {
                debug!("photo upload response did not include a URL");
                Ok(None)
            }
        }
    }

    /// Delete the profile photo on the backend and clear the local
    /// reference.
    pub async fn delete_photo(&self) -> Result<(), ApiError> {
        let url = self.endpoint("users/profile/photo");
        let response = self.send_authenticated(|http| http.delete(&url)).await?;
        check_status(response).await?;
        self.store().clear_photo_url().await?;
        Ok(())
    }
}

/// Scan the `data` object (or the body itself) for any of the known photo
/// URL field names.
fn extract_photo_url(body: &Value) -> Option<String> {
    let candidates = [body.get("data").unwrap_or(body), body];
    for object in candidates {
        for field in PHOTO_FIELDS {
            if let Some(value) = object.get(field).and_then(Value::as_str) {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}
