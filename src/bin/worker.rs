use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;
use xray_review::{config::AppConfig, imaging::preview::render_xray};

/// A photo handed out by the review server.
struct DispatchedPhoto {
    job_id: u64,
    animal_name: String,
    image: Vec<u8>,
}

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting reference x-ray worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");
    let poll_interval = Duration::from_millis(config.worker_poll_interval_ms);
    let http = reqwest::Client::new();
    let base_url = config.server_url.trim_end_matches('/').to_string();

    tracing::info!(server = %base_url, "Worker ready, starting job processing loop");

    // Main processing loop
    loop {
        match process_next_job(&http, &base_url).await {
            Ok(true) => {
                // Job processed successfully, continue immediately
                tracing::debug!("Job processed, checking for next job");
            }
            Ok(false) => {
                // No job available, sleep before next poll
                tracing::trace!("No jobs available, sleeping");
                sleep(poll_interval).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Error processing job, will retry");
                sleep(poll_interval).await;
            }
        }
    }
}

/// Process the next job from the review server.
/// Returns Ok(true) if a job was processed, Ok(false) if no job available.
async fn process_next_job(
    http: &reqwest::Client,
    base_url: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let Some(photo) = fetch_job(http, base_url).await? else {
        return Ok(false);
    };

    tracing::info!(
        job_id = photo.job_id,
        animal = %photo.animal_name,
        "Rendering x-ray"
    );

    let start = std::time::Instant::now();
    let image = photo.image;
    let rendered = tokio::task::spawn_blocking(move || render_xray(&image)).await??;

    let form = Form::new().part(
        "result",
        Part::bytes(rendered)
            .file_name(format!("{}_result.png", photo.job_id))
            .mime_str("image/png")?,
    );
    http.post(format!("{base_url}/api/v1/jobs/{}/results", photo.job_id))
        .multipart(form)
        .send()
        .await?
        .error_for_status()?;

    tracing::info!(
        job_id = photo.job_id,
        duration_ms = start.elapsed().as_millis() as u64,
        "Result submitted"
    );

    Ok(true)
}

async fn fetch_job(
    http: &reqwest::Client,
    base_url: &str,
) -> Result<Option<DispatchedPhoto>, Box<dyn std::error::Error>> {
    let response = http
        .get(format!("{base_url}/api/v1/jobs/next"))
        .send()
        .await?
        .error_for_status()?;

    if response.status() == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let job_id: u64 = header("img_id")
        .ok_or("response is missing the img_id header")?
        .parse()?;
    let animal_name = header("animal_name").unwrap_or_default();
    let image = response.bytes().await?.to_vec();

    Ok(Some(DispatchedPhoto {
        job_id,
        animal_name,
        image,
    }))
}
