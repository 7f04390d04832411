//! Account-level calls: generic data tables, record deletion and updates,
//! password changes, combinators, the profile photo, public key and file
//! uploads.

use std::path::Path;

use serde_json::{Map, Value};

use crate::classify::{Body, Outcome};
use crate::decode::{decode_list, HatRecord};
use crate::error::{HatError, SERVER_ERROR_MESSAGE};
use crate::pipeline::{
    expect_array, expect_json, expect_message, expect_text, EndpointKind, HatClient, Reply,
};
use crate::types::ProfilePhoto;

const UNSUCCESSFUL_MESSAGE: &str = "The request was unsuccessful";

pub const PROFILE_NAMESPACE: &str = "rumpel";
pub const PROFILE_PHOTO_SCOPE: &str = "profile/photo";

fn photo_from_record(record: &Value) -> Result<ProfilePhoto, HatError> {
    record
        .get("data")
        .and_then(|data| ProfilePhoto::from_value(data).ok())
        .ok_or(HatError::ExpectedFieldNotFound("data"))
}

impl HatClient {
    /// Records of the table `namespace/scope`, as raw JSON.
    pub async fn get_table_values(
        &self,
        token: &str,
        user_domain: &str,
        namespace: &str,
        scope: &str,
        parameters: Map<String, Value>,
    ) -> Result<Reply<Vec<Value>>, HatError> {
        let request = self
            .endpoints()
            .build_table_values(token, user_domain, namespace, scope, parameters)?;
        self.call(request, EndpointKind::DataTable, expect_array).await
    }

    /// Records of the table `namespace/scope`, decoded as `T`. Elements that
    /// fail to decode are skipped.
    pub async fn get_table_records<T: HatRecord>(
        &self,
        token: &str,
        user_domain: &str,
        namespace: &str,
        scope: &str,
        parameters: Map<String, Value>,
    ) -> Result<Reply<Vec<T>>, HatError> {
        let reply = self
            .get_table_values(token, user_domain, namespace, scope, parameters)
            .await?;
        Ok(reply.map(|values| decode_list(&values)))
    }

    /// Write `value` (an object or an array of objects) to `namespace/scope`.
    pub async fn create_table_value(
        &self,
        token: &str,
        user_domain: &str,
        namespace: &str,
        scope: &str,
        value: Value,
    ) -> Result<Reply<Value>, HatError> {
        let request = self
            .endpoints()
            .build_create_table_value(token, user_domain, namespace, scope, value)?;
        self.call(request, EndpointKind::DataTable, expect_json).await
    }

    /// Delete `record_ids`. Any non-2xx status fails the call. On success
    /// the value is the token the call was made with and the bulletin is
    /// notified.
    pub async fn delete_records(
        &self,
        user_domain: &str,
        token: &str,
        record_ids: &[String],
    ) -> Result<Reply<String>, HatError> {
        let request = self
            .endpoints()
            .build_delete_records(token, user_domain, record_ids)?;
        match self.send(&request).await {
            Outcome::Failure { error, .. } => Err(error),
            Outcome::Success {
                is_success: false,
                status,
                ..
            } => Err(HatError::general(UNSUCCESSFUL_MESSAGE, status)),
            Outcome::Success {
                status,
                renewed_token,
                ..
            } => {
                if let Some(error) = EndpointKind::General.status_override(status) {
                    return Err(error);
                }
                if status.is_some_and(|code| !(200..300).contains(&code)) {
                    return Err(HatError::general(UNSUCCESSFUL_MESSAGE, status));
                }
                self.notify_update(user_domain);
                Ok(Reply {
                    value: token.to_string(),
                    renewed_token,
                })
            }
        }
    }

    /// Replace existing records. `records` is a JSON array of full records
    /// (`endpoint`, `recordId`, `data`). Notifies the bulletin on success.
    pub async fn update_records(
        &self,
        user_domain: &str,
        token: &str,
        records: Value,
    ) -> Result<Reply<Vec<Value>>, HatError> {
        let request = self.endpoints().build_update_records(token, user_domain, records)?;
        let reply = self.call(request, EndpointKind::General, expect_array).await?;
        self.notify_update(user_domain);
        Ok(reply)
    }

    /// Tell the bulletin that `user_domain` changed and wait for the
    /// exchange. The outcome is ignored.
    pub async fn trigger_update(&self, user_domain: &str) {
        match self.endpoints().build_bulletin(user_domain) {
            Ok(request) => {
                let _ = self.send(&request).await;
            }
            Err(error) => tracing::warn!(%error, "skipping bulletin notification"),
        }
    }

    pub fn public_key_url(&self, user_domain: &str) -> Result<String, HatError> {
        self.endpoints().public_key_url(user_domain)
    }

    /// The HAT's public key, PEM encoded.
    pub async fn get_public_key(&self, user_domain: &str) -> Result<Reply<String>, HatError> {
        let request = self.endpoints().build_public_key(user_domain)?;
        self.call(request, EndpointKind::General, expect_text).await
    }

    /// Change the account password. The value is the server's confirmation
    /// message.
    pub async fn change_password(
        &self,
        user_domain: &str,
        token: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<Reply<String>, HatError> {
        let request = self
            .endpoints()
            .build_change_password(token, user_domain, old_password, new_password)?;
        self.call(request, EndpointKind::General, expect_message).await
    }

    pub async fn create_combinator(
        &self,
        user_domain: &str,
        token: &str,
        name: &str,
        field: &str,
        lower: i64,
        upper: i64,
    ) -> Result<Reply<bool>, HatError> {
        let request = self
            .endpoints()
            .build_create_combinator(token, user_domain, name, field, lower, upper)?;
        self.call(request, EndpointKind::General, |_| Ok(true)).await
    }

    pub async fn get_combinator(
        &self,
        user_domain: &str,
        token: &str,
        name: &str,
    ) -> Result<Reply<Vec<Value>>, HatError> {
        let request = self.endpoints().build_get_combinator(token, user_domain, name)?;
        self.call(request, EndpointKind::General, expect_array).await
    }

    /// The most recent profile photo. An empty table is `NoValuesFound`.
    pub async fn get_profile_photo(
        &self,
        user_domain: &str,
        token: &str,
    ) -> Result<Reply<ProfilePhoto>, HatError> {
        let mut parameters = Map::new();
        parameters.insert("take".to_string(), Value::from(1));
        let reply = self
            .get_table_values(token, user_domain, PROFILE_NAMESPACE, PROFILE_PHOTO_SCOPE, parameters)
            .await?;
        let latest = reply.value.first().ok_or(HatError::NoValuesFound)?;
        Ok(Reply {
            value: photo_from_record(latest)?,
            renewed_token: reply.renewed_token,
        })
    }

    /// Store `photo` as a new profile photo record. The value is the photo
    /// as the HAT saved it.
    pub async fn set_profile_photo(
        &self,
        user_domain: &str,
        token: &str,
        photo: &ProfilePhoto,
    ) -> Result<Reply<ProfilePhoto>, HatError> {
        let reply = self
            .create_table_value(token, user_domain, PROFILE_NAMESPACE, PROFILE_PHOTO_SCOPE, photo.to_json())
            .await?;
        Ok(Reply {
            value: photo_from_record(&reply.value)?,
            renewed_token: reply.renewed_token,
        })
    }

    /// Upload the file at `path` to a presigned URL. Storage services usually
    /// answer with an empty body, so an empty 2xx response is a success.
    pub async fn upload_file(&self, path: &Path, presigned_url: &str) -> Result<Reply<Body>, HatError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            HatError::general(format!("cannot read `{}`: {e}", path.display()), None)
        })?;
        let request = self.endpoints().build_upload(presigned_url, bytes);
        match self.send(&request).await {
            Outcome::Failure { error, .. } => Err(error),
            Outcome::Success {
                status,
                body,
                renewed_token,
                ..
            } => match status {
                Some(code) if !(200..300).contains(&code) => {
                    Err(HatError::general(SERVER_ERROR_MESSAGE, status))
                }
                _ => Ok(Reply {
                    value: body,
                    renewed_token,
                }),
            },
        }
    }
}
