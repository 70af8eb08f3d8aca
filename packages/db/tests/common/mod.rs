use chrono::Utc;
use jobfeed_core::JobCandidate;

use db::{Database, DbError};

/// A fresh, isolated in-memory store per test.
pub async fn setup_db() -> Result<Database, DbError> {
    Database::memory().await
}

pub fn candidate(external_id: &str, title: &str, source: &str) -> JobCandidate {
    JobCandidate {
        external_id: external_id.to_string(),
        title: title.to_string(),
        company: "Acme".to_string(),
        location: "Remote".to_string(),
        description: "Design things.".to_string(),
        job_type: "full-time".to_string(),
        category: "design".to_string(),
        salary: String::new(),
        url: format!("https://{source}/jobs/{external_id}"),
        published_date: Utc::now(),
        source: source.to_string(),
        source_url: format!("https://{source}/?feed=job_feed"),
    }
}
