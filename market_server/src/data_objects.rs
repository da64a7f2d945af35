use market_engine::db_types::{FaultReason, MeetingPlace, ProposedLocation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListingParams {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    pub location: MeetingPlace,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeLocationsParams {
    pub locations: Vec<LocationEntry>,
}

impl ProposeLocationsParams {
    pub fn into_candidates(self) -> Vec<ProposedLocation> {
        self.locations
            .into_iter()
            .map(|entry| ProposedLocation { place: entry.location, meeting_time: entry.time })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectLocationParams {
    pub location: MeetingPlace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpParams {
    #[serde(rename = "productId")]
    pub product_id: i64,
    pub otp: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelParams {
    #[serde(default)]
    pub reason: Option<FaultReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeParams {
    pub reason: FaultReason,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub evidence_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: std::fmt::Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}
