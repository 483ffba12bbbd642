use serde::{Deserialize, Serialize};

/// client -> server, `/get_range`
#[derive(Serialize, Debug, Clone)]
pub struct AcquireRequest {
    pub nickname: String,
    pub device_name: String,
    pub workername: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// server -> client, `/get_range`
///
/// A grant is only usable when `success` is set and both `range` and
/// `addresses` are present and non-empty.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RangeResponse {
    #[serde(default)]
    pub success: bool,
    pub range: Option<String>,
    pub addresses: Option<Vec<String>>,
    pub message: Option<String>,
}

/// client -> server, `/submit_range`
#[derive(Serialize, Debug, Clone)]
pub struct SubmitRequest {
    pub range: String,
    pub proof_of_work: String,
    pub device_name: String,
    pub workername: String,
}

/// server -> client, `/submit_range`
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}
