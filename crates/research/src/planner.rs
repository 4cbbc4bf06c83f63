use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the planner sees before each follow-up round.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerRequest<'a> {
    pub question: &'a str,
    pub transcript: Option<&'a str>,
    pub round: usize,
    pub repo_context: &'a str,
    pub external_context: &'a str,
    pub repo_queries: &'a [String],
    pub external_queries: &'a [String],
}

/// Planner suggestion for the next round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlannerDecision {
    pub done: bool,
    pub repo_queries: Vec<String>,
    pub external_queries: Vec<String>,
    pub ask_user: Vec<String>,
}

impl Default for PlannerDecision {
    /// Stop with nothing new; used for any response that cannot be trusted.
    fn default() -> Self {
        Self {
            done: true,
            repo_queries: Vec::new(),
            external_queries: Vec::new(),
            ask_user: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDecision {
    #[serde(default)]
    done: Option<Value>,
    #[serde(default, alias = "repo_queries")]
    repo_queries: Option<Value>,
    #[serde(default, alias = "external_queries")]
    external_queries: Option<Value>,
    #[serde(default, alias = "ask_user")]
    ask_user: Option<Value>,
}

impl PlannerDecision {
    /// Parse a planner reply.
    ///
    /// Accepts a bare JSON object, one wrapped in a markdown code fence, or one
    /// embedded in prose. Anything that does not yield an object falls back to
    /// [`PlannerDecision::default`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let Some(object) = extract_object(raw) else {
            log::warn!("Planner reply has no JSON object; stopping");
            return Self::default();
        };
        let parsed: RawDecision = match serde_json::from_str(object) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("Planner reply rejected: {err}");
                return Self::default();
            }
        };

        let done = match parsed.done {
            None | Some(Value::Null) => false,
            Some(Value::Bool(done)) => done,
            Some(other) => {
                log::warn!("Planner reply has non-boolean done: {other}");
                return Self::default();
            }
        };

        Self {
            done,
            repo_queries: strings(parsed.repo_queries),
            external_queries: strings(parsed.external_queries),
            ask_user: strings(parsed.ask_user),
        }
    }
}

/// Trimmed non-empty strings of a JSON array (or a lone string).
fn strings(value: Option<Value>) -> Vec<String> {
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(single @ Value::String(_)) => vec![single],
        _ => return Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn extract_object(raw: &str) -> Option<&str> {
    let mut body = raw.trim();
    if let Some(fenced) = body.strip_prefix("```") {
        let fenced = fenced.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
        body = fenced.rsplit_once("```").map_or(fenced, |(inner, _)| inner).trim();
    }
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}
