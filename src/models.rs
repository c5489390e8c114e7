use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Indicator ──

/// Coarse page health reported by a status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    #[default]
    None,
    Minor,
    Major,
    Critical,
    #[serde(other)]
    Unknown,
}

impl Indicator {
    /// Ordinal used for threshold and transition comparisons. `Unknown` sorts below `None`.
    pub fn severity(self) -> i8 {
        match self {
            Indicator::None => 0,
            Indicator::Minor => 1,
            Indicator::Major => 2,
            Indicator::Critical => 3,
            Indicator::Unknown => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Indicator::None => "none",
            Indicator::Minor => "minor",
            Indicator::Major => "major",
            Indicator::Critical => "critical",
            Indicator::Unknown => "unknown",
        }
    }

    /// The more severe of two indicators; ties keep `self`.
    pub fn worst(self, other: Indicator) -> Indicator {
        if other.severity() > self.severity() { other } else { self }
    }
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Alert threshold ──

/// Minimum indicator a source must reach before transitions are announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    #[default]
    All,
    Minor,
    Major,
    Critical,
}

impl AlertLevel {
    pub fn threshold(self) -> i8 {
        match self {
            AlertLevel::All => 0,
            AlertLevel::Minor => 1,
            AlertLevel::Major => 2,
            AlertLevel::Critical => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::All => "all",
            AlertLevel::Minor => "minor",
            AlertLevel::Major => "major",
            AlertLevel::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<AlertLevel> {
        match s.trim().to_lowercase().as_str() {
            "all" => Some(AlertLevel::All),
            "minor" => Some(AlertLevel::Minor),
            "major" => Some(AlertLevel::Major),
            "critical" => Some(AlertLevel::Critical),
            _ => None,
        }
    }
}

// ── Provider ──

/// Status page vendor API shape spoken by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Atlassian,
    IncidentIoCompatible,
    IncidentIoNative,
    Instatus,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Atlassian => "atlassian",
            Provider::IncidentIoCompatible => "incident-io-compatible",
            Provider::IncidentIoNative => "incident-io-native",
            Provider::Instatus => "instatus",
        }
    }
}

// ── Source ──

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub alert_level: AlertLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

/// Trim whitespace and strip every trailing slash from a status page URL.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateSource {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub alert_level: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateSource {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub alert_level: Option<String>,
    /// Empty string clears the group.
    pub group: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderSources {
    pub ids: Vec<String>,
}

// ── Normalized status page data ──

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PageInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PageStatus {
    pub indicator: Indicator,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default)]
    pub group: bool,
}

impl Component {
    pub fn is_operational(&self) -> bool {
        self.status == "operational"
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IncidentUpdate {
    #[serde(default)]
    pub id: String,
    pub status: String,
    /// incident.io's compatibility API omits bodies.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Incident {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub impact: Indicator,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortlink: Option<String>,
    #[serde(default)]
    pub incident_updates: Vec<IncidentUpdate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Summary {
    pub page: PageInfo,
    pub status: PageStatus,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub incidents: Vec<Incident>,
}

impl Summary {
    pub fn indicator(&self) -> Indicator {
        self.status.indicator
    }

    /// Names of non-operational leaf components, in page order.
    pub fn affected_components(&self) -> Vec<String> {
        self.components
            .iter()
            .filter(|c| !c.group && !c.is_operational())
            .map(|c| c.name.clone())
            .collect()
    }
}

// ── Per-source state ──

#[derive(Debug, Serialize, Clone, Default)]
pub struct SourceState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    pub incidents: Vec<Incident>,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    pub is_stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

impl SourceState {
    pub fn indicator(&self) -> Option<Indicator> {
        self.summary.as_ref().map(Summary::indicator)
    }
}

#[derive(Debug, Serialize)]
pub struct SourceView {
    #[serde(flatten)]
    pub source: Source,
    pub state: SourceState,
}

// ── History ──

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub timestamp: DateTime<Utc>,
    pub indicator: Indicator,
}

#[derive(Debug, Serialize)]
pub struct UptimeStats {
    pub source_id: String,
    pub days: u32,
    pub uptime_fraction: f64,
    pub total_checkpoints: usize,
}

// ── Webhooks ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// Full structured JSON.
    #[default]
    Json,
    /// `{"content": "...", "sender": "statusbar"}` for chat-style incoming webhooks.
    Chat,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Webhook {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub payload_format: PayloadFormat,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool { true }

#[derive(Debug, Deserialize)]
pub struct CreateWebhook {
    pub url: String,
    #[serde(default)]
    pub payload_format: PayloadFormat,
}

// ── Import / export ──

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ExportDocument {
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub webhooks: Vec<Webhook>,
}

#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub sources_added: usize,
    pub sources_skipped: usize,
    pub webhooks_added: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert_eq!(Indicator::None.severity(), 0);
        assert_eq!(Indicator::Minor.severity(), 1);
        assert_eq!(Indicator::Major.severity(), 2);
        assert_eq!(Indicator::Critical.severity(), 3);
        assert_eq!(Indicator::Unknown.severity(), -1);
        assert!(Indicator::Unknown.severity() < Indicator::None.severity());
    }

    #[test]
    fn test_unrecognized_indicator_decodes_as_unknown() {
        let ind: Indicator = serde_json::from_str("\"maintenance\"").unwrap();
        assert_eq!(ind, Indicator::Unknown);
        let ind: Indicator = serde_json::from_str("\"major\"").unwrap();
        assert_eq!(ind, Indicator::Major);
    }

    #[test]
    fn test_worst() {
        assert_eq!(Indicator::None.worst(Indicator::Major), Indicator::Major);
        assert_eq!(Indicator::Critical.worst(Indicator::Minor), Indicator::Critical);
        assert_eq!(Indicator::None.worst(Indicator::Unknown), Indicator::None);
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://status.example.com///"), "https://status.example.com");
        assert_eq!(normalize_base_url("  https://status.example.com "), "https://status.example.com");
        assert_eq!(normalize_base_url("https://status.example.com"), "https://status.example.com");
    }

    #[test]
    fn test_source_list_round_trip() {
        let sources = vec![
            Source {
                id: "a".into(),
                name: "GitHub".into(),
                base_url: normalize_base_url("https://www.githubstatus.com/"),
                alert_level: AlertLevel::Major,
                group: Some("Dev".into()),
                sort_order: 0,
            },
            Source {
                id: "b".into(),
                name: "Cloudflare".into(),
                base_url: "https://www.cloudflarestatus.com".into(),
                alert_level: AlertLevel::All,
                group: None,
                sort_order: 1,
            },
        ];
        let json = serde_json::to_string_pretty(&sources).unwrap();
        let decoded: Vec<Source> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, sources);
        assert_eq!(decoded[0].base_url, "https://www.githubstatus.com");
    }

    #[test]
    fn test_provider_serialization() {
        assert_eq!(serde_json::to_string(&Provider::IncidentIoCompatible).unwrap(), "\"incident-io-compatible\"");
        assert_eq!(Provider::Instatus.as_str(), "instatus");
    }

    #[test]
    fn test_affected_components_skip_groups_and_operational() {
        let summary = Summary {
            page: PageInfo::default(),
            status: PageStatus { indicator: Indicator::Minor, description: "Minor".into() },
            components: vec![
                Component { id: "1".into(), name: "API".into(), status: "partial_outage".into(), position: 1, group_id: None, group: false },
                Component { id: "2".into(), name: "Web".into(), status: "operational".into(), position: 2, group_id: None, group: false },
                Component { id: "3".into(), name: "Infra".into(), status: "major_outage".into(), position: 3, group_id: None, group: true },
            ],
            incidents: vec![],
        };
        assert_eq!(summary.affected_components(), vec!["API".to_string()]);
    }

    #[test]
    fn test_alert_level_parse() {
        assert_eq!(AlertLevel::parse("Major"), Some(AlertLevel::Major));
        assert_eq!(AlertLevel::parse("bogus"), None);
        assert_eq!(AlertLevel::default().threshold(), 0);
    }
}
