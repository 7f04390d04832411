//! Location data: the dex data plug that feeds it and the
//! `rumpel/locations/ios` table.

use serde_json::{Map, Value};

use crate::decode::decode_list;
use crate::endpoints::{LOCATIONS_NAMESPACE, LOCATIONS_SCOPE};
use crate::error::HatError;
use crate::pipeline::{expect_message, EndpointKind, HatClient, Reply};
use crate::types::{LocationData, LocationRecord};

impl HatClient {
    pub fn location_data_plug_url(&self, user_domain: &str, plug_id: &str) -> Result<String, HatError> {
        self.endpoints().location_data_plug_url(user_domain, plug_id)
    }

    /// Enable the location data plug. The value is the server's `message`.
    pub async fn enable_location_data_plug(
        &self,
        user_domain: &str,
        plug_token: &str,
        plug_id: &str,
    ) -> Result<Reply<String>, HatError> {
        let request = self
            .endpoints()
            .build_enable_location_data_plug(user_domain, plug_token, plug_id)?;
        self.call(request, EndpointKind::General, expect_message).await
    }

    /// Every stored location point. Points that do not decode are skipped; no
    /// points at all is `NoValuesFound`.
    pub async fn get_locations(
        &self,
        user_domain: &str,
        token: &str,
    ) -> Result<Reply<Vec<LocationRecord>>, HatError> {
        let reply = self
            .get_table_values(token, user_domain, LOCATIONS_NAMESPACE, LOCATIONS_SCOPE, Map::new())
            .await?;
        if reply.value.is_empty() {
            return Err(HatError::NoValuesFound);
        }
        Ok(reply.map(|values| decode_list(&values)))
    }

    /// Store a batch of points and return the records the HAT created.
    pub async fn push_locations(
        &self,
        user_domain: &str,
        token: &str,
        points: &[LocationData],
    ) -> Result<Reply<Vec<LocationRecord>>, HatError> {
        let body = serde_json::to_value(points)
            .map_err(|e| HatError::general(format!("cannot encode locations: {e}"), None))?;
        let reply = self
            .create_table_value(token, user_domain, LOCATIONS_NAMESPACE, LOCATIONS_SCOPE, body)
            .await?;
        Ok(reply.map(|created| match created {
            Value::Array(items) => decode_list(&items),
            single => decode_list(&[single]),
        }))
    }
}
