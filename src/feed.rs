//! Atom feed generation.
//!
//! The feed is hand-built XML: the vocabulary is a dozen fixed elements, so
//! a writer over `String` with the shared HTML escaper covers it. Entry
//! content goes out as escaped HTML (`type="html"`), timestamps are RFC-3339
//! from the entry dates, and all links are absolute against the configured
//! base URL.

use crate::config::SiteConfig;
use crate::date::EntryDate;
use crate::izu::escape_html;

/// One feed entry, already rendered.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: String,
    /// Path relative to the site root, e.g. `2006-05-28-tide/`.
    pub path: String,
    pub updated: EntryDate,
    /// Entry content HTML (goes out escaped, `type="html"`).
    pub html: String,
}

/// Join a path onto the configured base URL.
pub fn absolute_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url, path.trim_start_matches('/'))
}

/// Build the Atom feed document.
///
/// `items` must be sorted newest-first; only the first `config.feed.items`
/// are published.
pub fn atom_feed(config: &SiteConfig, items: &[FeedItem]) -> String {
    let base = &config.site.base_url;
    let items = &items[..items.len().min(config.feed.items as usize)];

    let updated = items
        .first()
        .map(|i| i.updated.rfc3339())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string());

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
    push_element(&mut xml, 1, "title", &config.site.title);
    if !config.site.subtitle.is_empty() {
        push_element(&mut xml, 1, "subtitle", &config.site.subtitle);
    }
    push_element(&mut xml, 1, "id", base);
    push_element(&mut xml, 1, "updated", &updated);
    xml.push_str(&format!(
        "  <link href=\"{}\" rel=\"alternate\"/>\n",
        escape_html(base)
    ));
    xml.push_str(&format!(
        "  <link href=\"{}\" rel=\"self\"/>\n",
        escape_html(&absolute_url(base, "feed.xml"))
    ));
    if !config.site.author.is_empty() {
        xml.push_str("  <author>\n");
        push_element(&mut xml, 2, "name", &config.site.author);
        xml.push_str("  </author>\n");
    }

    for item in items {
        let link = absolute_url(base, &item.path);
        xml.push_str("  <entry>\n");
        push_element(&mut xml, 2, "title", &item.title);
        push_element(&mut xml, 2, "id", &link);
        xml.push_str(&format!(
            "    <link href=\"{}\" rel=\"alternate\"/>\n",
            escape_html(&link)
        ));
        push_element(&mut xml, 2, "updated", &item.updated.rfc3339());
        xml.push_str(&format!(
            "    <content type=\"html\">{}</content>\n",
            escape_html(&item.html)
        ));
        xml.push_str("  </entry>\n");
    }

    xml.push_str("</feed>\n");
    xml
}

fn push_element(xml: &mut String, indent: usize, name: &str, text: &str) {
    xml.push_str(&format!(
        "{}<{name}>{}</{name}>\n",
        "  ".repeat(indent),
        escape_html(text)
    ));
}
