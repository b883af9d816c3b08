use serde::{Deserialize, Serialize};

/// Which wizard step suggestions are being requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Products,
    Competitors,
    Icps,
    Personas,
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SuggestionKind::Products => "products",
            SuggestionKind::Competitors => "competitors",
            SuggestionKind::Icps => "icps",
            SuggestionKind::Personas => "personas",
        };
        f.write_str(name)
    }
}

/// One suggested entry for a wizard step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SuggestRequest<'a> {
    pub kind: SuggestionKind,
    pub company: &'a str,
    pub industry: Option<&'a str>,
    pub context: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestEnvelope {
    pub status: String,
    #[serde(default)]
    pub suggestions: Option<Vec<Suggestion>>,
    #[serde(default)]
    pub error: Option<String>,
}
