//! Loosely-typed feed item: every alternative source key as a named optional field.

/// One `<item>`/`<entry>` as found in the feed, before normalization.
///
/// Fields hold trimmed element text. The first non-empty occurrence of a key
/// wins; later duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub guid: Option<String>,
    pub id: Option<String>,
    pub link: Option<String>,
    /// Atom `<link href="..."/>`.
    pub link_href: Option<String>,
    /// `job:company` / `job_listing:company`.
    pub vendor_company: Option<String>,
    pub company: Option<String>,
    /// `dc:creator`.
    pub creator: Option<String>,
    pub author: Option<String>,
    pub vendor_location: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    /// `content:encoded`.
    pub content_encoded: Option<String>,
    pub vendor_job_type: Option<String>,
    pub job_type: Option<String>,
    pub vendor_category: Option<String>,
    pub category: Option<String>,
    pub vendor_salary: Option<String>,
    pub salary: Option<String>,
    /// RSS `pubDate`, RFC 2822.
    pub pub_date: Option<String>,
    /// Atom `published`, RFC 3339.
    pub published: Option<String>,
    /// Atom `updated`, RFC 3339.
    pub updated: Option<String>,
}

impl RawItem {
    /// Record the text of a child element by its qualified name.
    ///
    /// Returns `false` when the name is not a recognized key.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        let Some(slot) = self.slot(name) else {
            return false;
        };
        let value = value.trim();
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value.to_string());
        }
        true
    }

    /// Record an attribute of a child element (`link href`, Atom `category term`).
    pub fn set_attribute(&mut self, element: &str, attribute: &str, value: &str) {
        let slot = match (local_name(element), attribute) {
            ("link", "href") => &mut self.link_href,
            ("category", "term") => &mut self.category,
            _ => return,
        };
        let value = value.trim();
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value.to_string());
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        let slot = match name {
            "job:company" | "job_listing:company" => &mut self.vendor_company,
            "dc:creator" => &mut self.creator,
            "job:location" | "job_listing:location" => &mut self.vendor_location,
            "content:encoded" => &mut self.content_encoded,
            "job:type" | "job:job_type" | "job_listing:job_type" => &mut self.vendor_job_type,
            "job:category" | "job_listing:category" => &mut self.vendor_category,
            "job:salary" | "job_listing:salary" => &mut self.vendor_salary,
            "dc:date" => &mut self.published,
            _ => return self.generic_slot(name),
        };
        Some(slot)
    }

    /// Keys that mean the same under any prefix (`atom:title`, `rss:link`).
    fn generic_slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        if let Some((prefix, _)) = name.split_once(':')
            && VENDOR_PREFIXES.contains(&prefix)
        {
            return None;
        }
        let slot = match local_name(name) {
            "title" => &mut self.title,
            "guid" => &mut self.guid,
            "id" => &mut self.id,
            "link" | "url" => &mut self.link,
            "company" => &mut self.company,
            "author" => &mut self.author,
            "location" => &mut self.location,
            "description" => &mut self.description,
            "summary" => &mut self.summary,
            "content" => &mut self.content,
            "type" | "job_type" | "jobtype" => &mut self.job_type,
            "category" => &mut self.category,
            "salary" => &mut self.salary,
            "pubDate" | "pubdate" => &mut self.pub_date,
            "published" => &mut self.published,
            "updated" => &mut self.updated,
            _ => return None,
        };
        Some(slot)
    }
}

/// Prefixes whose keys carry their own meaning and never fall back to the local name.
const VENDOR_PREFIXES: [&str; 4] = ["job", "job_listing", "dc", "content"];

/// Element name without its namespace prefix.
pub(crate) fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}
