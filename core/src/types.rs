//! Typed HAT records.
//!
//! # Design
//! Top-level records implement `HatRecord` and decode tolerantly through
//! `Fields`. Sub-objects whose shape is known to drift between server
//! versions (data definitions, Fitbit payloads) derive `Deserialize` and are
//! decoded strictly; a failure there only drops the sub-object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decode::{DecodeError, Fields, HatRecord};

/// A data offer published on the HAT data exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct DataOffer {
    pub id: String,
    pub title: String,
    pub short_description: String,
    pub long_description: String,
    pub image_url: String,
    pub merchant_code: String,
    /// Unix timestamps as sent by the server.
    pub created: String,
    pub starts: String,
    pub expires: String,
    pub collect_for: i64,
    pub required_min_users: i64,
    pub required_max_users: i64,
    pub total_user_claims: i64,
    pub required_data_definition: Option<DataDefinition>,
    pub data_conditions: Option<DataDefinition>,
    pub data_requirements: Option<DataDefinition>,
    pub reward: DataOfferReward,
    pub owner: DataOfferOwner,
    pub claim: DataOfferClaim,
    pub pii: bool,
}

impl Default for DataOffer {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            short_description: String::new(),
            long_description: String::new(),
            image_url: String::new(),
            merchant_code: String::new(),
            created: String::new(),
            starts: String::new(),
            expires: String::new(),
            collect_for: -1,
            required_min_users: -1,
            required_max_users: -1,
            total_user_claims: -1,
            required_data_definition: None,
            data_conditions: None,
            data_requirements: None,
            reward: DataOfferReward::default(),
            owner: DataOfferOwner::default(),
            claim: DataOfferClaim::default(),
            pii: false,
        }
    }
}

impl HatRecord for DataOffer {
    fn from_json(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let f = Fields::new(map);
        Ok(Self {
            id: f.string("id", ""),
            title: f.string("title", ""),
            short_description: f.string("shortDescription", ""),
            long_description: f.string("longDescription", ""),
            image_url: f.string("illustrationUrl", ""),
            merchant_code: f.string("merchantCode", ""),
            created: f.string("created", ""),
            starts: f.string("starts", ""),
            expires: f.string("expires", ""),
            collect_for: f.int("collectFor", -1),
            required_min_users: f.int("requiredMinUser", -1),
            required_max_users: f.int("requiredMaxUser", -1),
            total_user_claims: f.int("totalUserClaims", -1),
            required_data_definition: f.strict("requiredDataDefinition"),
            data_conditions: f.strict("dataConditions"),
            data_requirements: f.strict("dataRequirements"),
            reward: f.object("reward"),
            owner: f.object("owner"),
            claim: f.object("claim"),
            pii: f.bool("pii", false),
        })
    }
}

/// Which endpoints and fields a data offer reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDefinition {
    pub name: String,
    pub bundle: std::collections::BTreeMap<String, DataDefinitionBundle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDefinitionBundle {
    pub endpoints: Vec<DataDefinitionEndpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDefinitionEndpoint {
    pub endpoint: String,
    #[serde(default)]
    pub mapping: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataOfferReward {
    pub reward_type: String,
    pub value: String,
    pub currency: String,
    pub codes: Vec<String>,
}

impl HatRecord for DataOfferReward {
    fn from_json(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let f = Fields::new(map);
        // `value` is numeric for cash rewards and text for everything else.
        let value = match f.get("value") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        Ok(Self {
            reward_type: f.string("rewardType", ""),
            value,
            currency: f.string("currency", ""),
            codes: f.string_list("codes"),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataOfferOwner {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl HatRecord for DataOfferOwner {
    fn from_json(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let f = Fields::new(map);
        Ok(Self {
            id: f.string("id", ""),
            email: f.string("email", ""),
            first_name: f.string("firstName", ""),
            last_name: f.string("lastName", ""),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataOfferClaim {
    pub status: String,
    pub confirmed: bool,
    pub data_debit_id: String,
    pub date_created: i64,
}

impl Default for DataOfferClaim {
    fn default() -> Self {
        Self {
            status: String::new(),
            confirmed: false,
            data_debit_id: String::new(),
            date_created: -1,
        }
    }
}

impl HatRecord for DataOfferClaim {
    fn from_json(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let f = Fields::new(map);
        Ok(Self {
            status: f.string("claimStatus", ""),
            confirmed: f.bool("claimConfirmed", false),
            data_debit_id: f.string("dataDebitId", ""),
            date_created: f.int("dateCreated", -1),
        })
    }
}

/// The subscription a HAT was bought with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderPayment {
    /// `monthly`, `yearly`, ... Empty when unknown.
    pub period: String,
}

impl HatRecord for ProviderPayment {
    fn from_json(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let period = Fields::new(map)
            .get("subscription")
            .and_then(Value::as_object)
            .map(|subscription| Fields::new(subscription).string("period", ""))
            .unwrap_or_default();
        Ok(Self { period })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePhoto {
    pub avatar: String,
}

impl HatRecord for ProfilePhoto {
    fn from_json(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        Ok(Self {
            avatar: Fields::new(map).string("avatar", ""),
        })
    }
}

impl ProfilePhoto {
    pub fn to_json(&self) -> Value {
        serde_json::json!({ "avatar": self.avatar })
    }
}

/// The envelope every v2 data record is wrapped in.
#[derive(Debug, Clone, PartialEq)]
pub struct HatRecordEnvelope {
    pub endpoint: String,
    pub record_id: String,
    pub data: Value,
}

impl HatRecord for HatRecordEnvelope {
    fn from_json(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let f = Fields::new(map);
        Ok(Self {
            endpoint: f.string("endpoint", ""),
            record_id: f.required_string("recordId")?,
            data: f.get("data").cloned().unwrap_or(Value::Null),
        })
    }
}

/// A location point stored under `rumpel/locations/ios`.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub record_id: String,
    pub endpoint: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
    /// Unix time in milliseconds.
    pub date_created: i64,
    pub date_created_local: String,
}

impl HatRecord for LocationRecord {
    fn from_json(map: &Map<String, Value>) -> Result<Self, DecodeError> {
        let f = Fields::new(map);
        let data = f.required_object("data")?;
        Ok(Self {
            record_id: f.required_string("recordId")?,
            endpoint: f.string("endpoint", ""),
            latitude: data.required_float("latitude")?,
            longitude: data.required_float("longitude")?,
            accuracy: data.float("horizontalAccuracy", 0.0),
            date_created: data.int("dateCreated", 0),
            date_created_local: data.string("dateCreatedLocal", ""),
        })
    }
}

/// Payload written to `rumpel/locations/ios`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    pub latitude: f64,
    pub longitude: f64,
    pub horizontal_accuracy: f64,
    pub date_created: i64,
    pub date_created_local: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitbitSleep {
    pub date_of_sleep: String,
    pub duration: i64,
    pub efficiency: i64,
    #[serde(default)]
    pub minutes_asleep: i64,
    #[serde(default)]
    pub minutes_awake: i64,
    #[serde(default)]
    pub is_main_sleep: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitbitWeight {
    pub date: String,
    pub weight: f64,
    #[serde(default)]
    pub bmi: f64,
    #[serde(default)]
    pub fat: Option<f64>,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitbitProfile {
    pub encoded_id: String,
    pub full_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub age: i64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitbitDailyActivity {
    pub steps: i64,
    #[serde(default)]
    pub calories_out: i64,
    #[serde(default)]
    pub floors: i64,
    #[serde(default)]
    pub sedentary_minutes: i64,
    #[serde(default)]
    pub very_active_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitbitLifetimeStats {
    pub lifetime: FitbitTotals,
    #[serde(default)]
    pub best: Option<FitbitTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitbitTotals {
    #[serde(default)]
    pub steps: f64,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub floors: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitbitActivity {
    pub log_id: i64,
    pub activity_name: String,
    #[serde(default)]
    pub calories: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub steps: i64,
    #[serde(default)]
    pub start_time: String,
}
