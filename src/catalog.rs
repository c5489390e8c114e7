//! Built-in list of well-known public status pages, offered as presets when adding a source.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub base_url: &'static str,
    pub category: &'static str,
}

const fn entry(name: &'static str, base_url: &'static str, category: &'static str) -> CatalogEntry {
    CatalogEntry { name, base_url, category }
}

static CATALOG: &[CatalogEntry] = &[
    entry("Anthropic", "https://status.anthropic.com", "ai"),
    entry("OpenAI", "https://status.openai.com", "ai"),
    entry("GitHub", "https://www.githubstatus.com", "developer"),
    entry("npm", "https://status.npmjs.org", "developer"),
    entry("CircleCI", "https://status.circleci.com", "developer"),
    entry("Bitbucket", "https://bitbucket.status.atlassian.com", "developer"),
    entry("Docker", "https://www.dockerstatus.com", "developer"),
    entry("Linear", "https://linearstatus.com", "developer"),
    entry("Cloudflare", "https://www.cloudflarestatus.com", "cloud"),
    entry("DigitalOcean", "https://status.digitalocean.com", "cloud"),
    entry("Vercel", "https://www.vercel-status.com", "cloud"),
    entry("Netlify", "https://www.netlifystatus.com", "cloud"),
    entry("Dropbox", "https://status.dropbox.com", "cloud"),
    entry("Datadog", "https://status.datadoghq.com", "monitoring"),
    entry("Sentry", "https://status.sentry.io", "monitoring"),
    entry("Discord", "https://discordstatus.com", "communication"),
    entry("Twilio", "https://status.twilio.com", "communication"),
    entry("Zoom", "https://status.zoom.us", "communication"),
    entry("Reddit", "https://www.redditstatus.com", "communication"),
    entry("Atlassian", "https://status.atlassian.com", "productivity"),
];

pub fn entries() -> &'static [CatalogEntry] {
    CATALOG
}

/// Case-insensitive match on name or category.
pub fn search(query: &str) -> Vec<CatalogEntry> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return CATALOG.to_vec();
    }
    CATALOG
        .iter()
        .filter(|e| e.name.to_lowercase().contains(&q) || e.category == q)
        .copied()
        .collect()
}
