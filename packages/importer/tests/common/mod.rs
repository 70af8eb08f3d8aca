#![allow(dead_code)]

use std::time::Duration;

use actors::PoolConfig;
use chrono::Utc;
use db::{Database, DbError};
use importer::AppConfig;
use jobfeed_core::{JobCandidate, QueueSettings};

/// A fresh, isolated in-memory store per test.
pub async fn setup_db() -> Result<Database, DbError> {
    Database::memory().await
}

/// Config with millisecond backoff and polling so retries finish quickly.
pub fn fast_config() -> AppConfig {
    AppConfig {
        queue: QueueSettings {
            backoff_base_ms: 10,
            ..Default::default()
        },
        pool: PoolConfig {
            concurrency: 2,
            poll_interval: Duration::from_millis(10),
        },
        sources: Vec::new(),
        ..Default::default()
    }
}

pub fn candidate(external_id: &str, title: &str) -> JobCandidate {
    JobCandidate {
        external_id: external_id.to_string(),
        title: title.to_string(),
        company: "Acme".to_string(),
        location: "Remote".to_string(),
        description: "Design things.".to_string(),
        job_type: "full-time".to_string(),
        category: "design".to_string(),
        salary: String::new(),
        url: format!("https://jobicy.com/jobs/{external_id}"),
        published_date: Utc::now(),
        source: "jobicy.com".to_string(),
        source_url: "https://jobicy.com/?feed=job_feed".to_string(),
    }
}

/// An RSS document with one `<item>` per `(guid, title, company)`.
pub fn rss_feed(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(guid, title, company)| {
            format!(
                "<item>\
                   <title>{title}</title>\
                   <guid>{guid}</guid>\
                   <link>https://jobicy.com/jobs/{guid}</link>\
                   <job_listing:company>{company}</job_listing:company>\
                   <job_listing:job_type>Full-Time</job_listing:job_type>\
                   <description><![CDATA[<p>Build things at {company}.</p>]]></description>\
                   <pubDate>Mon, 06 Jan 2025 10:00:00 +0000</pubDate>\
                 </item>"
            )
        })
        .collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <rss version=\"2.0\" xmlns:job_listing=\"https://jobicy.com\">\
         <channel><title>Jobs</title>{body}</channel></rss>"
    )
}
