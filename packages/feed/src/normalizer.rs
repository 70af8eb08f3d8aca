//! Mapping of raw feed items to validated job candidates.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use jobfeed_core::{JobCandidate, ValidationError};
use regex::Regex;
use url::Url;

use crate::raw_item::RawItem;
use crate::text::{clean_text, truncate_description};

const UNTITLED: &str = "Untitled Position";
const UNKNOWN_COMPANY: &str = "Unknown Company";
const DEFAULT_JOB_TYPE: &str = "full-time";
const DEFAULT_CATEGORY: &str = "general";
const UNKNOWN_SOURCE: &str = "unknown";

/// Query parameter that names the category a feed URL is filtered on.
const CATEGORY_PARAM: &str = "job_categories";

static TRAILING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)/?$").expect("trailing number regex is valid"));

/// A raw item that failed candidate validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedItem {
    /// 0-based position in the feed.
    pub index: usize,
    pub candidate: JobCandidate,
    pub errors: Vec<ValidationError>,
}

/// Output of [`normalize_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Valid candidates in feed order.
    pub candidates: Vec<JobCandidate>,
    pub dropped: Vec<DroppedItem>,
}

/// Host of `url` without a leading `www.`, or `unknown`.
pub fn source_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .map(|host| host.strip_prefix("www.").unwrap_or(&host).to_string())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

/// Map one raw item to a candidate. `index` is the item's 0-based feed position.
pub fn normalize(item: &RawItem, source_url: &str, index: usize) -> JobCandidate {
    let source = source_name(source_url);

    let title = first_clean([&item.title]).unwrap_or_else(|| UNTITLED.to_string());

    let company = first_clean([
        &item.vendor_company,
        &item.company,
        &item.creator,
        &item.author,
    ])
    .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());

    let link = first_trimmed([&item.link, &item.link_href]);

    let external_id = first_clean([&item.guid, &item.id])
        .or_else(|| link.as_deref().and_then(id_from_link))
        .unwrap_or_else(|| format!("{}-{}-{}", source, Utc::now().timestamp_millis(), index));

    let location = first_clean([&item.vendor_location, &item.location]).unwrap_or_default();

    let description = first_clean([
        &item.description,
        &item.summary,
        &item.content,
        &item.content_encoded,
    ])
    .map(|text| truncate_description(&text))
    .unwrap_or_default();

    let salary = first_clean([&item.vendor_salary, &item.salary]).unwrap_or_default();

    let job_type = first_clean([&item.vendor_job_type, &item.job_type])
        .map(|raw| canonical_job_type(&raw))
        .unwrap_or_else(|| DEFAULT_JOB_TYPE.to_string());

    let category = category_from_url(source_url)
        .or_else(|| first_clean([&item.vendor_category, &item.category]))
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    JobCandidate {
        external_id,
        title,
        company,
        location,
        description,
        job_type,
        category,
        salary,
        url: link.unwrap_or_else(|| source_url.to_string()),
        published_date: published_date(item).unwrap_or_else(Utc::now),
        source,
        source_url: source_url.to_string(),
    }
}

/// Normalize every item and split valid candidates from dropped ones.
pub fn normalize_all(items: &[RawItem], source_url: &str) -> Normalized {
    let mut out = Normalized::default();

    for (index, item) in items.iter().enumerate() {
        let candidate = normalize(item, source_url, index);
        let errors = candidate.validation_errors();

        if errors.is_empty() {
            out.candidates.push(candidate);
            continue;
        }

        let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
        tracing::warn!(
            index = index + 1,
            external_id = %candidate.external_id,
            "Skipping invalid job from {}: {}",
            source_url,
            reasons.join(", ")
        );
        out.dropped.push(DroppedItem {
            index,
            candidate,
            errors,
        });
    }

    out
}

/// Canonical job type token for a free-form feed value.
pub(crate) fn canonical_job_type(raw: &str) -> String {
    let value = raw.trim().to_lowercase();
    let canonical = match value.as_str() {
        "" => DEFAULT_JOB_TYPE,
        "full-time" | "full time" | "fulltime" | "full_time" => "full-time",
        "part-time" | "part time" | "parttime" | "part_time" => "part-time",
        "contract" | "contractor" => "contract",
        "internship" | "intern" => "internship",
        "temporary" | "temp" => "temporary",
        "freelance" | "freelancer" => "freelance",
        "remote" => "remote",
        _ => return value,
    };
    canonical.to_string()
}

fn category_from_url(source_url: &str) -> Option<String> {
    let url = Url::parse(source_url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == CATEGORY_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn id_from_link(link: &str) -> Option<String> {
    let path = Url::parse(link)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| link.to_string());
    TRAILING_NUMBER
        .captures(&path)
        .map(|caps| caps[1].to_string())
}

fn published_date(item: &RawItem) -> Option<DateTime<Utc>> {
    let candidates = [&item.pub_date, &item.published, &item.updated];
    candidates
        .into_iter()
        .flatten()
        .find_map(|raw| parse_date(raw.trim()))
}

/// RFC 2822 (RSS) or RFC 3339 (Atom).
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn first_clean<const N: usize>(fields: [&Option<String>; N]) -> Option<String> {
    fields
        .into_iter()
        .flatten()
        .map(|raw| clean_text(raw))
        .find(|text| !text.is_empty())
}

fn first_trimmed<const N: usize>(fields: [&Option<String>; N]) -> Option<String> {
    fields
        .into_iter()
        .flatten()
        .map(|raw| raw.trim())
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone};

    use super::*;

    const JOBICY: &str = "https://jobicy.com/?feed=job_feed";

    fn item() -> RawItem {
        RawItem::default()
    }

    #[test]
    fn test_senior_designer_candidate() {
        let raw = RawItem {
            guid: Some("123".into()),
            title: Some("Senior Designer".into()),
            company: Some("Acme".into()),
            ..item()
        };

        let candidate = normalize(&raw, JOBICY, 0);

        assert_eq!(candidate.external_id, "123");
        assert_eq!(candidate.title, "Senior Designer");
        assert_eq!(candidate.company, "Acme");
        assert_eq!(candidate.source, "jobicy.com");
        assert_eq!(candidate.job_type, "full-time");
        assert_eq!(candidate.category, "general");
        assert_eq!(candidate.url, JOBICY);
        assert_eq!(candidate.source_url, JOBICY);
        assert!(candidate.validate().is_ok());
    }

    #[test]
    fn test_field_fallback_chains() {
        let raw = RawItem {
            id: Some("urn:42".into()),
            author: Some("Widgets".into()),
            location: Some("Berlin".into()),
            summary: Some("<p>Build &amp; ship</p>".into()),
            content: Some("ignored".into()),
            salary: Some("$100k".into()),
            link_href: Some("https://jobs.test/42".into()),
            updated: Some("2025-01-06T10:00:00Z".into()),
            ..item()
        };

        let candidate = normalize(&raw, "https://www.jobs.test/feed", 3);

        assert_eq!(candidate.title, UNTITLED);
        assert_eq!(candidate.external_id, "urn:42");
        assert_eq!(candidate.company, "Widgets");
        assert_eq!(candidate.location, "Berlin");
        assert_eq!(candidate.description, "Build & ship");
        assert_eq!(candidate.salary, "$100k");
        assert_eq!(candidate.url, "https://jobs.test/42");
        assert_eq!(candidate.source, "jobs.test");
        assert_eq!(
            candidate.published_date,
            Utc.with_ymd_and_hms(2025, 1, 6, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_vendor_fields_take_precedence() {
        let raw = RawItem {
            vendor_company: Some("Acme".into()),
            company: Some("Other".into()),
            vendor_location: Some("Remote".into()),
            location: Some("Paris".into()),
            vendor_salary: Some("50k".into()),
            salary: Some("60k".into()),
            vendor_job_type: Some("Part Time".into()),
            job_type: Some("full-time".into()),
            ..item()
        };

        let candidate = normalize(&raw, JOBICY, 0);

        assert_eq!(candidate.company, "Acme");
        assert_eq!(candidate.location, "Remote");
        assert_eq!(candidate.salary, "50k");
        assert_eq!(candidate.job_type, "part-time");
    }

    #[test]
    fn test_external_id_from_link_or_synthesized() {
        let linked = RawItem {
            title: Some("Ops Engineer".into()),
            link: Some("https://board.test/jobs/98765/".into()),
            ..item()
        };
        assert_eq!(normalize(&linked, JOBICY, 0).external_id, "98765");

        let bare = RawItem {
            title: Some("Ops Engineer".into()),
            link: Some("https://board.test/jobs/ops".into()),
            ..item()
        };
        let first = normalize(&bare, JOBICY, 4).external_id;
        let second = normalize(&bare, JOBICY, 5).external_id;
        assert!(first.starts_with("jobicy.com-"));
        assert!(first.ends_with("-4"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_job_type_canonicalization() {
        assert_eq!(canonical_job_type("Full Time"), "full-time");
        assert_eq!(canonical_job_type(" FULLTIME "), "full-time");
        assert_eq!(canonical_job_type("full_time"), "full-time");
        assert_eq!(canonical_job_type("part time"), "part-time");
        assert_eq!(canonical_job_type("Contractor"), "contract");
        assert_eq!(canonical_job_type("intern"), "internship");
        assert_eq!(canonical_job_type("temp"), "temporary");
        assert_eq!(canonical_job_type("Freelancer"), "freelance");
        assert_eq!(canonical_job_type("Remote"), "remote");
        assert_eq!(canonical_job_type("Seasonal"), "seasonal");
    }

    #[test]
    fn test_category_prefers_feed_filter() {
        let raw = RawItem {
            category: Some("Marketing".into()),
            ..item()
        };

        let filtered = "https://jobicy.com/?feed=job_feed&job_categories=design-multimedia";
        assert_eq!(normalize(&raw, filtered, 0).category, "design-multimedia");
        assert_eq!(normalize(&raw, JOBICY, 0).category, "Marketing");
    }

    #[test]
    fn test_source_name() {
        assert_eq!(source_name("https://www.higheredjobs.com/rss/articleFeed.cfm"), "higheredjobs.com");
        assert_eq!(source_name("https://jobicy.com/?feed=job_feed"), "jobicy.com");
        assert_eq!(source_name("not a url"), "unknown");
    }

    #[test]
    fn test_published_date_parsing() {
        let rss = RawItem {
            pub_date: Some("Mon, 06 Jan 2025 10:00:00 +0100".into()),
            ..item()
        };
        let date = normalize(&rss, JOBICY, 0).published_date;
        assert_eq!(date, Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap());

        let garbage = RawItem {
            pub_date: Some("yesterday".into()),
            ..item()
        };
        let before = Utc::now();
        let date = normalize(&garbage, JOBICY, 0).published_date;
        assert!(date >= before);
        assert!(date.year() >= 2025);
    }

    #[test]
    fn test_long_description_is_truncated() {
        let raw = RawItem {
            description: Some(format!("<div>{}</div>", "word ".repeat(400))),
            ..item()
        };

        let description = normalize(&raw, JOBICY, 0).description;
        assert!(description.ends_with("..."));
        assert!(description.chars().count() <= jobfeed_core::DESCRIPTION_MAX_CHARS + 3);
    }

    #[test]
    fn test_normalize_all_drops_invalid_candidates() {
        let items = vec![
            RawItem {
                guid: Some("1".into()),
                title: Some("Senior Designer".into()),
                company: Some("Acme".into()),
                ..item()
            },
            RawItem {
                guid: Some("2".into()),
                title: Some("QA".into()),
                company: Some("Acme".into()),
                ..item()
            },
            RawItem {
                guid: Some("3".into()),
                title: Some("Data Engineer".into()),
                company: Some("Z".into()),
                ..item()
            },
        ];

        let out = normalize_all(&items, JOBICY);

        assert_eq!(out.candidates.len(), 1);
        assert_eq!(out.candidates[0].external_id, "1");
        assert_eq!(out.dropped.len(), 2);
        assert_eq!(out.dropped[0].index, 1);
        assert_eq!(out.dropped[0].errors, vec![ValidationError::TitleTooShort]);
        assert_eq!(out.dropped[1].errors, vec![ValidationError::CompanyTooShort]);
    }
}
