//! CouchDB backend
//!
//! Talks to one CouchDB database over its HTTP API:
//!
//! ```text
//! HEAD/PUT  /{db}                              check / create
//! GET/PUT   /{db}/{id}        POST /{db}        documents
//! DELETE    /{db}/{id}?rev=
//! GET       /{db}/_all_docs?include_docs=true
//! GET       /{db}/_design/{design}/_view/{view}
//! POST      /{db}/_find
//! ```

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::backend::{Backend, BackendKind};
use super::document::Document;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::query::{Selector, ViewQuery, ViewRow};
use crate::validation::validate_database_name;

/// Upper bound on `_find` results; CouchDB's own default is 25
const FIND_LIMIT: usize = 10_000;

/// CouchDB HTTP backend
#[derive(Debug, Clone)]
pub struct CouchBackend {
    client: Client,
    base: Url,
    database: String,
    credentials: Option<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct SaveResponse {
    id: String,
    rev: String,
}

#[derive(Debug, Deserialize)]
struct CouchError {
    error: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct RowsResponse<R> {
    #[serde(default = "Vec::new")]
    rows: Vec<R>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    #[serde(default)]
    doc: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    docs: Vec<Document>,
    #[serde(default)]
    warning: Option<String>,
}

impl CouchBackend {
    /// Build a backend without contacting the server
    pub fn new(url: &str, database: &str, credentials: Option<(String, String)>) -> Result<Self> {
        validate_database_name(database)?;
        let base = Url::parse(url).map_err(|e| Error::Config {
            message: format!("invalid CouchDB URL '{url}': {e}"),
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("CouchDB URL '{url}' cannot carry a path"),
            });
        }

        Ok(Self {
            client: Client::new(),
            base,
            database: database.to_string(),
            credentials,
        })
    }

    /// Connect, creating the database if needed
    ///
    /// If the configured credentials are rejected, one more attempt is made
    /// anonymously.
    pub async fn connect(config: &Config) -> Result<Self> {
        info!("Connecting to CouchDB at {}", config.url);

        let credentials = config
            .credentials()
            .map(|(user, password)| (user.to_string(), password.to_string()));
        match &credentials {
            Some((user, _)) => info!("Using authentication with user: {}", user),
            None => warn!("No CouchDB credentials provided. Using anonymous access."),
        }

        let backend = Self::new(&config.url, &config.database, credentials)?;
        match backend.open().await {
            Ok(()) => Ok(backend),
            Err(Error::Unauthorized { message }) if backend.credentials.is_some() => {
                error!("Authentication failed ({message}). Please check your CouchDB credentials.");
                info!("Attempting to connect without authentication...");
                let anonymous = Self {
                    credentials: None,
                    ..backend
                };
                anonymous.open().await?;
                Ok(anonymous)
            }
            Err(e) => Err(e),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn is_anonymous(&self) -> bool {
        self.credentials.is_none()
    }

    /// Check the database exists and create it when missing
    async fn open(&self) -> Result<()> {
        let url = self.db_url()?;
        let response = self.request(Method::HEAD, url.clone()).send().await?;

        match response.status() {
            status if status.is_success() => {
                info!("Database {} already exists", self.database);
                Ok(())
            }
            StatusCode::NOT_FOUND => {
                info!("Database {} does not exist. Creating...", self.database);
                let response = self.request(Method::PUT, url).send().await?;
                let status = response.status();
                // 412: created by someone else in the meantime
                if status.is_success() || status == StatusCode::PRECONDITION_FAILED {
                    info!("Database {} created successfully", self.database);
                    Ok(())
                } else {
                    Err(failure(response, None).await)
                }
            }
            status => Err(classify(status, "", None)),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    fn url_with(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config {
                message: format!("CouchDB URL '{}' cannot carry a path", self.base),
            })?
            .pop_if_empty()
            .push(&self.database)
            .extend(segments);
        Ok(url)
    }

    pub(crate) fn db_url(&self) -> Result<Url> {
        self.url_with(&[])
    }

    /// Design and local document ids keep their slash; other ids are one
    /// escaped path segment
    pub(crate) fn doc_url(&self, id: &str) -> Result<Url> {
        for prefix in ["_design/", "_local/"] {
            if let Some(name) = id.strip_prefix(prefix) {
                return self.url_with(&[prefix.trim_end_matches('/'), name]);
            }
        }
        self.url_with(&[id])
    }

    pub(crate) fn view_url(&self, design: &str, view: &str) -> Result<Url> {
        self.url_with(&["_design", design, "_view", view])
    }
}

/// Encode view options as CouchDB query parameters
pub(crate) fn view_params(query: &ViewQuery) -> Result<Vec<(&'static str, String)>> {
    let mut params = vec![("reduce", query.reduce.to_string())];
    if query.include_docs {
        params.push(("include_docs", "true".to_string()));
    }
    if let Some(key) = &query.key {
        params.push(("key", serde_json::to_string(key)?));
    } else {
        if let Some(start) = &query.range.start {
            params.push(("startkey", serde_json::to_string(start)?));
        }
        if let Some(end) = &query.range.end {
            params.push(("endkey", serde_json::to_string(end)?));
        }
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    Ok(params)
}

/// Map an unsuccessful status to an error
pub(crate) fn classify(status: StatusCode, body: &str, id: Option<&str>) -> Error {
    let reason = serde_json::from_str::<CouchError>(body)
        .map(|e| {
            if e.reason.is_empty() {
                e.error
            } else {
                format!("{}: {}", e.error, e.reason)
            }
        })
        .unwrap_or_else(|_| status.to_string());

    match status {
        StatusCode::CONFLICT => Error::Conflict {
            id: id.unwrap_or_default().to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized { message: reason },
        _ => Error::Persistence {
            message: reason,
            status: Some(status.as_u16()),
        },
    }
}

async fn failure(response: Response, id: Option<&str>) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify(status, &body, id)
}

#[async_trait]
impl Backend for CouchBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CouchDb
    }

    fn describe(&self) -> String {
        let mut shown = self.base.clone();
        // never print embedded credentials
        let _ = shown.set_password(None);
        format!("{} database '{}'", shown, self.database)
    }

    async fn save(&self, doc: Document) -> Result<(String, String)> {
        let request = match doc.id() {
            Some(id) => self.request(Method::PUT, self.doc_url(id)?),
            None => self.request(Method::POST, self.db_url()?),
        };
        let response = request.json(&doc).send().await?;
        if !response.status().is_success() {
            return Err(failure(response, doc.id()).await);
        }
        let saved: SaveResponse = response.json().await?;
        Ok((saved.id, saved.rev))
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let response = self.request(Method::GET, self.doc_url(id)?).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Document not found: {}", id);
                Ok(None)
            }
            status if status.is_success() => Ok(Some(response.json().await?)),
            _ => Err(failure(response, Some(id)).await),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let Some(current) = self.get(id).await? else {
            return Ok(false);
        };
        let Some(rev) = current.rev() else {
            return Ok(false);
        };

        let mut url = self.doc_url(id)?;
        url.query_pairs_mut().append_pair("rev", rev);
        let response = self.request(Method::DELETE, url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(failure(response, Some(id)).await),
        }
    }

    async fn all_docs(&self) -> Result<Vec<Document>> {
        let url = self.url_with(&["_all_docs"])?;
        let response = self
            .request(Method::GET, url)
            .query(&[("include_docs", "true")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(failure(response, None).await);
        }
        let body: RowsResponse<AllDocsRow> = response.json().await?;
        Ok(body.rows.into_iter().filter_map(|row| row.doc).collect())
    }

    async fn query_view(&self, design: &str, view: &str, query: &ViewQuery) -> Result<Vec<ViewRow>> {
        let response = self
            .request(Method::GET, self.view_url(design, view)?)
            .query(&view_params(query)?)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::SchemaMissing {
                design: design.to_string(),
                view: view.to_string(),
            }),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                let reason = serde_json::from_str::<CouchError>(&body)
                    .map(|e| e.reason)
                    .unwrap_or(body);
                Err(Error::InvalidQuery {
                    design: design.to_string(),
                    view: view.to_string(),
                    reason,
                })
            }
            status if status.is_success() => {
                let body: RowsResponse<ViewRow> = response.json().await?;
                Ok(body.rows)
            }
            _ => Err(failure(response, None).await),
        }
    }

    async fn find(&self, selector: &Selector) -> Result<Vec<Document>> {
        let url = self.url_with(&["_find"])?;
        let payload = json!({ "selector": selector, "limit": FIND_LIMIT });
        let response = self.request(Method::POST, url).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(failure(response, None).await);
        }
        let body: FindResponse = response.json().await?;
        if let Some(warning) = body.warning {
            debug!("CouchDB _find: {}", warning);
        }
        Ok(body.docs)
    }
}
