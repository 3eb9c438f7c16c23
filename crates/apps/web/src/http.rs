use gloo_net::http::Request;
use tracing::debug;
use viewer::{BackendClient, BoundaryResponse, FetchError, FluxQuery, FluxReport, check_status, decode_boundary, decode_flux};

/// Simulation backend reached over `fetch`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_text<'a>(
        &self,
        path: &str,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<String, FetchError> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {url}");
        let resp = Request::get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        check_status(resp.status())?;
        resp.text().await.map_err(|e| FetchError::Transport(e.to_string()))
    }
}

impl BackendClient for HttpBackend {
    async fn boundary(&self, city: &str) -> Result<BoundaryResponse, FetchError> {
        let body = self.get_text("/boundary", [("city", city)]).await?;
        decode_boundary(&body)
    }

    async fn flux(&self, query: &FluxQuery) -> Result<FluxReport, FetchError> {
        let body = self.get_text("/flux", query.params()).await?;
        decode_flux(&body)
    }
}
