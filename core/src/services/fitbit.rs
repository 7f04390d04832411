//! Fitbit data synced into the HAT by the Fitbit data plug.
//!
//! Every scope is read with `take=1`, so each call returns the latest
//! record. Records are decoded strictly from their `data` object; records
//! that do not match are skipped.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::decode::decode_strict_list;
use crate::error::HatError;
use crate::pipeline::{expect_array, EndpointKind, HatClient, Reply};
use crate::types::{
    FitbitActivity, FitbitDailyActivity, FitbitLifetimeStats, FitbitProfile, FitbitSleep,
    FitbitWeight,
};

pub const FITBIT_NAMESPACE: &str = "fitbit";

/// Endpoint names listed for the `fitbit` namespace in the dex statistics.
fn fitbit_endpoints(items: Vec<Value>) -> Result<Vec<String>, HatError> {
    items
        .iter()
        .find(|item| item.get("namespace").and_then(Value::as_str) == Some(FITBIT_NAMESPACE))
        .and_then(|item| item.get("endpoints"))
        .and_then(Value::as_array)
        .map(|endpoints| {
            endpoints
                .iter()
                .filter_map(|e| e.get("endpoint").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .ok_or(HatError::NoValuesFound)
}

impl HatClient {
    /// Scopes the Fitbit plug can provide, discovered from the dex.
    pub async fn get_fitbit_endpoints(&self) -> Result<Reply<Vec<String>>, HatError> {
        let request = self.endpoints().build_available_data();
        self.call(request, EndpointKind::Lenient, |body| {
            expect_array(body).and_then(fitbit_endpoints)
        })
        .await
    }

    /// Latest record of `fitbit/{scope}`, decoded from its `data` object.
    pub async fn get_fitbit<T: DeserializeOwned>(
        &self,
        user_domain: &str,
        token: &str,
        scope: &str,
    ) -> Result<Reply<Vec<T>>, HatError> {
        let mut parameters = Map::new();
        parameters.insert("take".to_string(), json!("1"));
        let reply = self
            .get_table_values(token, user_domain, FITBIT_NAMESPACE, scope, parameters)
            .await?;
        if reply.value.is_empty() {
            return Err(HatError::NoValuesFound);
        }
        Ok(reply.map(|values| decode_strict_list(&values, "/data")))
    }

    pub async fn get_fitbit_sleep(&self, user_domain: &str, token: &str) -> Result<Reply<Vec<FitbitSleep>>, HatError> {
        self.get_fitbit(user_domain, token, "sleep").await
    }

    pub async fn get_fitbit_weight(&self, user_domain: &str, token: &str) -> Result<Reply<Vec<FitbitWeight>>, HatError> {
        self.get_fitbit(user_domain, token, "weight").await
    }

    pub async fn get_fitbit_profile(
        &self,
        user_domain: &str,
        token: &str,
    ) -> Result<Reply<Vec<FitbitProfile>>, HatError> {
        self.get_fitbit(user_domain, token, "profile").await
    }

    pub async fn get_fitbit_daily_activity(
        &self,
        user_domain: &str,
        token: &str,
    ) -> Result<Reply<Vec<FitbitDailyActivity>>, HatError> {
        self.get_fitbit(user_domain, token, "activity/day/summary").await
    }

    pub async fn get_fitbit_lifetime_stats(
        &self,
        user_domain: &str,
        token: &str,
    ) -> Result<Reply<Vec<FitbitLifetimeStats>>, HatError> {
        self.get_fitbit(user_domain, token, "lifetime/stats").await
    }

    pub async fn get_fitbit_activity(
        &self,
        user_domain: &str,
        token: &str,
    ) -> Result<Reply<Vec<FitbitActivity>>, HatError> {
        self.get_fitbit(user_domain, token, "activity").await
    }
}
