//! Request builders for every HAT endpoint the SDK speaks to.
//!
//! # Design
//! `Endpoints` borrows a `ClientConfig` and produces `HttpRequest` values
//! without touching the network. The services run these through the
//! pipeline; a host that executes its own I/O can use them directly and feed
//! the response to `classify` and `dispatch`.
//!
//! URLs are assembled with `url::Url`. The user domain must be a bare host
//! (optionally with a port); anything else is a `GeneralError`. Path segments
//! are percent-encoded.

use serde_json::{json, Map, Value};
use url::Url;

use crate::config::ClientConfig;
use crate::error::HatError;
use crate::http::{BodyEncoding, ContentType, HttpMethod, HttpRequest};

pub const SSE_HEADER: &str = "x-amz-server-side-encryption";
pub const SSE_VALUE: &str = "AES256";
pub const LOCATIONS_NAMESPACE: &str = "rumpel";
pub const LOCATIONS_SCOPE: &str = "locations/ios";

#[derive(Debug, Clone, Copy)]
pub struct Endpoints<'a> {
    config: &'a ClientConfig,
}

impl<'a> Endpoints<'a> {
    pub fn new(config: &'a ClientConfig) -> Self {
        Self { config }
    }

    /// `{base}/api/v2/data/{namespace}/{scope}`
    pub fn data_url(&self, user_domain: &str, namespace: &str, scope: &str) -> Result<String, HatError> {
        self.user_url(user_domain, &["api/v2/data", namespace, scope])
            .map(String::from)
    }

    pub fn build_table_values(
        &self,
        token: &str,
        user_domain: &str,
        namespace: &str,
        scope: &str,
        parameters: Map<String, Value>,
    ) -> Result<HttpRequest, HatError> {
        Ok(
            HttpRequest::new(HttpMethod::Get, self.data_url(user_domain, namespace, scope)?)
                .encoding(BodyEncoding::UrlEncoded)
                .parameters(parameters)
                .auth_token(token),
        )
    }

    pub fn build_create_table_value(
        &self,
        token: &str,
        user_domain: &str,
        namespace: &str,
        scope: &str,
        value: Value,
    ) -> Result<HttpRequest, HatError> {
        Ok(
            HttpRequest::new(HttpMethod::Post, self.data_url(user_domain, namespace, scope)?)
                .json_body(value)
                .auth_token(token),
        )
    }

    /// `DELETE {base}/api/v2/data?records=..&records=..`. At least one id is
    /// required.
    pub fn build_delete_records(
        &self,
        token: &str,
        user_domain: &str,
        record_ids: &[String],
    ) -> Result<HttpRequest, HatError> {
        if record_ids.is_empty() {
            return Err(HatError::general("no record ids to delete", None));
        }
        let mut url = self.user_url(user_domain, &["api/v2/data"])?;
        {
            let mut pairs = url.query_pairs_mut();
            for id in record_ids {
                pairs.append_pair("records", id);
            }
        }
        Ok(HttpRequest::new(HttpMethod::Delete, String::from(url)).auth_token(token))
    }

    /// `PUT {base}/api/v2/data` with the full records (endpoint, recordId,
    /// data) as a JSON array.
    pub fn build_update_records(
        &self,
        token: &str,
        user_domain: &str,
        records: Value,
    ) -> Result<HttpRequest, HatError> {
        let url = self.user_url(user_domain, &["api/v2/data"])?;
        Ok(HttpRequest::new(HttpMethod::Put, String::from(url))
            .json_body(records)
            .auth_token(token))
    }

    pub fn public_key_url(&self, user_domain: &str) -> Result<String, HatError> {
        self.user_url(user_domain, &["publickey"]).map(String::from)
    }

    pub fn build_public_key(&self, user_domain: &str) -> Result<HttpRequest, HatError> {
        Ok(HttpRequest::new(HttpMethod::Get, self.public_key_url(user_domain)?).content_type(ContentType::Text))
    }

    pub fn build_change_password(
        &self,
        token: &str,
        user_domain: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<HttpRequest, HatError> {
        let url = self.user_url(user_domain, &["control/v2/auth/password"])?;
        Ok(HttpRequest::new(HttpMethod::Post, String::from(url))
            .encoding(BodyEncoding::Json)
            .parameter("password", old_password)
            .parameter("newPassword", new_password)
            .auth_token(token))
    }

    pub fn combinator_url(&self, user_domain: &str, name: &str) -> Result<String, HatError> {
        self.user_url(user_domain, &["api/v2/combinator", name])
            .map(String::from)
    }

    /// A combinator over the location table filtering `field` between
    /// `lower` and `upper`.
    pub fn build_create_combinator(
        &self,
        token: &str,
        user_domain: &str,
        name: &str,
        field: &str,
        lower: i64,
        upper: i64,
    ) -> Result<HttpRequest, HatError> {
        let body = json!([{
            "endpoint": format!("{LOCATIONS_NAMESPACE}/{LOCATIONS_SCOPE}"),
            "filters": [{
                "field": field,
                "operator": {"operator": "between", "lower": lower, "upper": upper}
            }]
        }]);
        Ok(HttpRequest::new(HttpMethod::Post, self.combinator_url(user_domain, name)?)
            .json_body(body)
            .auth_token(token))
    }

    pub fn build_get_combinator(&self, token: &str, user_domain: &str, name: &str) -> Result<HttpRequest, HatError> {
        Ok(HttpRequest::new(HttpMethod::Get, self.combinator_url(user_domain, name)?)
            .encoding(BodyEncoding::Json)
            .auth_token(token))
    }

    /// `{dex}/api/dataplugs/{plug_id}/connect?hat={user_domain}`
    pub fn location_data_plug_url(&self, user_domain: &str, plug_id: &str) -> Result<String, HatError> {
        let mut url = self.parse(format!(
            "{}/api/dataplugs/{}/connect",
            self.config.dex_base(),
            plug_id
        ))?;
        url.query_pairs_mut().append_pair("hat", user_domain);
        Ok(url.into())
    }

    pub fn build_enable_location_data_plug(
        &self,
        user_domain: &str,
        plug_token: &str,
        plug_id: &str,
    ) -> Result<HttpRequest, HatError> {
        Ok(
            HttpRequest::new(HttpMethod::Get, self.location_data_plug_url(user_domain, plug_id)?)
                .header("accept", ContentType::Json.mime())
                .header("content-type", ContentType::Json.mime())
                .auth_token(plug_token),
        )
    }

    pub fn build_available_data(&self) -> HttpRequest {
        HttpRequest::new(
            HttpMethod::Get,
            format!("{}/stats/available-data", self.config.dex_base()),
        )
    }

    /// Upload of `bytes` to a presigned URL with server-side encryption.
    pub fn build_upload(&self, presigned_url: &str, bytes: Vec<u8>) -> HttpRequest {
        HttpRequest::new(HttpMethod::Post, presigned_url)
            .raw_body(bytes)
            .header(SSE_HEADER, SSE_VALUE)
    }

    pub fn build_bulletin(&self, user_domain: &str) -> Result<HttpRequest, HatError> {
        let mut url = self.parse(self.config.bulletin_url.clone())?;
        url.query_pairs_mut().append_pair("phata", user_domain);
        Ok(HttpRequest::new(HttpMethod::Get, String::from(url)).content_type(ContentType::Text))
    }

    /// `{scheme}://{user_domain}/{path..}` where every `/`-separated piece of
    /// `path` becomes one encoded segment.
    fn user_url(&self, user_domain: &str, path: &[&str]) -> Result<Url, HatError> {
        let invalid = || HatError::general(format!("invalid user domain `{user_domain}`"), None);
        let mut url = self.parse(self.config.base_url(user_domain))?;
        let bare_host = url.host_str().is_some_and(|host| !host.is_empty())
            && url.path() == "/"
            && url.query().is_none()
            && url.fragment().is_none()
            && url.username().is_empty()
            && url.password().is_none();
        if !bare_host {
            return Err(invalid());
        }
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .clear()
            .extend(
                path.iter()
                    .flat_map(|part| part.split('/'))
                    .filter(|segment| !segment.is_empty()),
            );
        Ok(url)
    }

    fn parse(&self, url: String) -> Result<Url, HatError> {
        Url::parse(&url).map_err(|e| HatError::general(format!("invalid url `{url}`: {e}"), None))
    }
}
