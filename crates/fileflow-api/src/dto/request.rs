//! Request DTOs.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/jobs/{id}/cancel`. The body itself is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelJobRequest {
    /// Why the job is cancelled.
    #[serde(default)]
    pub reason: Option<String>,
}
