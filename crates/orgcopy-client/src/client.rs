//! REST implementation of the [`Store`] trait.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use orgcopy_core::catalog::ObjectDescribe;
use orgcopy_core::record::Record;
use orgcopy_core::store::{CreateResult, RemoteError, ResourceLimits, Store};
use orgcopy_core::StoreError;

use crate::auth::{self, Session};
use crate::config::{Credentials, StoreConfig};
use crate::error::{describe_errors, Error};

/// One page of query results.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    records: Vec<Map<String, Value>>,
    #[serde(default = "default_done")]
    done: bool,
    #[serde(default)]
    next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

/// A store reached over the REST API with a logged-in session.
///
/// # Example
///
/// ```ignore
/// use orgcopy_client::{Credentials, RestStore, StoreConfig};
///
/// let credentials = Credentials::new("me@example.com", "password", "token");
/// let store = RestStore::connect("target", StoreConfig::new("login"), &credentials).await?;
/// let limits = store.resource_limits().await?;
/// ```
pub struct RestStore {
    name: String,
    http: Client,
    session: Session,
    config: StoreConfig,
}

impl RestStore {
    /// Log in and create a store handle.
    pub async fn connect(
        name: impl Into<String>,
        config: StoreConfig,
        credentials: &Credentials,
    ) -> Result<Self, Error> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let session = auth::login(&http, &config, credentials).await?;
        Ok(Self::with_session(name, config, http, session))
    }

    /// Create a store handle from an existing session.
    pub fn with_session(
        name: impl Into<String>,
        config: StoreConfig,
        http: Client,
        session: Session,
    ) -> Self {
        Self {
            name: name.into(),
            http,
            session,
            config,
        }
    }

    /// The session in use.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Base URL of the versioned REST API, ending in `/`.
    pub fn data_url(&self) -> String {
        format!(
            "{}/services/data/v{}/",
            self.session.instance_url, self.config.api_version
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.data_url(), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.session.session_id)
            .header("Accept", "application/json")
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        debug!(store = %self.name, url, "GET");
        let response = self.authorized(self.http.get(url)).send().await?;
        decode(response).await
    }

    async fn fetch_page(&self, url: &str, query: Option<&str>) -> Result<QueryPage, Error> {
        let mut request = self.http.get(url);
        if let Some(q) = query {
            request = request.query(&[("q", q)]);
        }
        let response = self.authorized(request).send().await?;
        decode(response).await
    }

    /// Send a write and read the answer as a [`CreateResult`].
    ///
    /// Client errors carrying an error array become an unsuccessful result.
    async fn write(&self, request: RequestBuilder, id: Option<&str>) -> Result<CreateResult, Error> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NO_CONTENT {
            return Ok(match id {
                Some(id) => CreateResult::created(id),
                None => CreateResult::rejected(Vec::new()),
            });
        }
        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }
        if status.is_client_error() {
            if let Ok(errors) = serde_json::from_str::<Vec<RemoteError>>(&body) {
                return Ok(CreateResult::rejected(errors));
            }
        }
        Err(api_error(status.as_u16(), &body))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(api_error(status.as_u16(), &body));
    }
    Ok(serde_json::from_str(&body)?)
}

/// Build an [`Error::Api`] from an error response body.
///
/// Bodies that are not an error array are kept as a single entry.
pub fn api_error(status: u16, body: &str) -> Error {
    let errors = serde_json::from_str::<Vec<RemoteError>>(body)
        .unwrap_or_else(|_| vec![RemoteError::new(status.to_string(), body.trim())]);
    Error::Api { status, errors }
}

#[async_trait]
impl Store for RestStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn describe(&self, object: &str) -> Result<ObjectDescribe, StoreError> {
        let url = self.url(&format!("sobjects/{}/describe", object));
        Ok(self.get_json(&url).await?)
    }

    #[instrument(skip(self), fields(store = %self.name))]
    async fn query(&self, query: &str) -> Result<Vec<Record>, StoreError> {
        let mut page = self
            .fetch_page(&self.url("query"), Some(query))
            .await
            .map_err(|e| match e {
                Error::Api { status: 400, errors } => StoreError::InvalidQuery(describe_errors(&errors)),
                other => other.into(),
            })?;

        let mut records = Vec::new();
        loop {
            records.extend(
                page.records
                    .drain(..)
                    .map(|row| Record::from(row).without_envelope()),
            );
            match page.next_records_url.take() {
                Some(next) if !page.done => {
                    let url = format!("{}{}", self.session.instance_url, next);
                    page = self.fetch_page(&url, None).await?;
                }
                _ => break,
            }
        }
        debug!(rows = records.len(), "query complete");
        Ok(records)
    }

    #[instrument(skip(self, record), fields(store = %self.name))]
    async fn create(&self, object: &str, record: &Record) -> Result<CreateResult, StoreError> {
        let url = self.url(&format!("sobjects/{}", object));
        let request = self.http.post(&url).json(record);
        Ok(self.write(request, None).await?)
    }

    #[instrument(skip(self, record), fields(store = %self.name))]
    async fn update(
        &self,
        object: &str,
        id: &str,
        record: &Record,
    ) -> Result<CreateResult, StoreError> {
        let url = self.url(&format!("sobjects/{}/{}", object, id));
        let request = self.http.patch(&url).json(record);
        Ok(self.write(request, Some(id)).await?)
    }

    async fn resource_limits(&self) -> Result<ResourceLimits, StoreError> {
        Ok(self.get_json(&self.url("limits")).await?)
    }
}
