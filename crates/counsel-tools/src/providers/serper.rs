//! Google search through the Serper API

use super::{Document, ProviderError, SearchProvider};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

const SERPER_API_URL: &str = "https://google.serper.dev/search";

pub struct SerperSearch {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            endpoint: SERPER_API_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SerperResponse {
    #[serde(rename = "answerBox")]
    answer_box: Option<AnswerBox>,
    organic: Vec<OrganicResult>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AnswerBox {
    answer: Option<String>,
    snippet: Option<String>,
    link: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct OrganicResult {
    title: String,
    link: String,
    snippet: String,
}

#[async_trait::async_trait]
impl SearchProvider for SerperSearch {
    async fn search(&self, query: &str) -> Result<Vec<Document>, ProviderError> {
        debug!("Serper search: {}", query);
        let response = self.client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&serde_json::json!({ "q": query }))
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Serper error {}: {}", status, body);
            return Err(ProviderError::Request(format!("{}: {}", status, body)));
        }

        let parsed: SerperResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let mut documents = Vec::new();
        if let Some(answer) = parsed.answer_box {
            if let Some(content) = answer.answer.or(answer.snippet) {
                documents.push(Document::new(content, answer.link.unwrap_or_default()));
            }
        }
        documents.extend(parsed.organic.into_iter().map(|r| {
            let content = if r.snippet.is_empty() { r.title } else { r.snippet };
            Document::new(content, r.link)
        }));
        Ok(documents)
    }
}
