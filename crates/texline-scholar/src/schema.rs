//! Graph API response shapes (only the requested fields)

use serde::Deserialize;

/// `GET /paper/arXiv:<id>?fields=references,references.externalIds,references.title`
#[derive(Debug, Default, Deserialize)]
pub struct ReferencesResponse {
    #[serde(rename = "paperId")]
    pub paper_id: Option<String>,
    /// Null entries show up for references S2 could not resolve
    #[serde(default)]
    pub references: Vec<Option<CitedPaper>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CitedPaper {
    #[serde(rename = "paperId")]
    pub paper_id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "externalIds")]
    pub external_ids: Option<ExternalIds>,
}

impl CitedPaper {
    /// arXiv identifier of the cited paper, if S2 knows one
    pub fn arxiv_id(&self) -> Option<&str> {
        self.external_ids
            .as_ref()?
            .arxiv
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExternalIds {
    #[serde(rename = "ArXiv")]
    pub arxiv: Option<String>,
    #[serde(rename = "DOI")]
    pub doi: Option<String>,
}
