use serde::Serialize;
use ts_rs::TS;

/// Response of the guarded demo endpoints.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-response.ts"
)]
pub struct AccessResponse {
    pub message: String,
    pub required_roles: Vec<String>,
}
