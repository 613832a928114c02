use garde::Validate;
use serde::Serialize;

use super::job::{JobId, JobMetadata};

/// Metadata portion of a photo submission.
#[derive(Debug, Validate)]
pub struct SubmitJobRequest {
    #[garde(length(min = 1, max = 200))]
    pub first_name: String,

    #[garde(length(min = 1, max = 200))]
    pub last_name: String,

    #[garde(length(min = 1, max = 200))]
    pub animal_name: String,

    /// Scanned QR code: storage slot id or upload link.
    #[garde(length(min = 1, max = 2048))]
    pub qr_content: String,

    #[garde(length(min = 1, max = 100))]
    pub animal_type: String,

    #[garde(skip)]
    pub broken_bone: bool,
}

impl SubmitJobRequest {
    pub fn metadata(&self) -> JobMetadata {
        JobMetadata {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            animal_name: self.animal_name.clone(),
            animal_type: self.animal_type.clone(),
            broken_bone: self.broken_bone,
        }
    }
}

/// Response after submitting a photo.
#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub status: String,
    pub job_id: JobId,
    pub current_jobs: usize,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

/// One job in the reviewer listing.
#[derive(Debug, Serialize)]
pub struct PendingJobView {
    pub job_id: JobId,
    pub metadata: JobMetadata,
    pub original: String,
    pub results: Vec<String>,
    pub remaining_dispatches: u32,
}

/// Reviewer listing of jobs awaiting approval.
#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub jobs: Vec<PendingJobView>,
    pub results_per_image: u32,
}

/// Carousel image URLs, most recent first.
#[derive(Debug, Serialize)]
pub struct CarouselResponse {
    pub originals: Vec<String>,
    pub xrays: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AnimalTypesResponse {
    pub types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub address: String,
}
