use serde::Deserialize;

use crate::models::requests::RequestStatus;

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: RequestStatus,
}

#[derive(Deserialize)]
pub struct VerificationDecision {
    pub verified: bool,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct ReadFilter {
    pub user_id: Option<String>,
}
