//! GoodData API client
//!
//! `GoodDataApi` is the public operation surface; `GoodDataClient` implements it over
//! HTTP. Every operation runs login → temporary token → action on a fresh session.

use crate::config::ClientConfig;
use crate::elements::element_stream;
use crate::error::{GoodDataError, Operation, Result};
use crate::http;
use crate::session::{Authenticator, Session};
use crate::types::*;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use url::Url;

#[async_trait]
pub trait GoodDataApi: Send + Sync {
    /// Replace a user's filters; succeeds only if the platform reports the user as
    /// updated and nothing as failed.
    async fn update_filters(&self, input: UpdateFiltersInput) -> Result<UserFiltersUpdateResponse>;

    /// Create a user filter object restricting an attribute to one element.
    async fn create_filter(&self, input: CreateFilterInput) -> Result<CreatedObject>;

    async fn create_user(&self, input: CreateUserInput) -> Result<CreatedObject>;

    /// Add a user to the configured project with the given roles.
    async fn add_user_to_project(&self, input: AddUserToProjectInput) -> Result<UpdateResult>;

    async fn get_user_info_by_login(&self, login: &str) -> Result<AccountSettings>;

    /// Delete a user; accepts a profile id or a profile URI. Returns the raw body.
    async fn delete_user(&self, user_id: &str) -> Result<Value>;

    async fn get_attribute_by_uri(&self, uri: &str) -> Result<Attribute>;

    /// Resolve element titles to element URIs. The attribute is fetched first unless the
    /// input already carries one. Titles that are not found are left out.
    async fn find_attribute_elements_by_title(
        &self,
        input: FindElementsInput,
    ) -> Result<ElementLookup>;
}

enum AttributeSource {
    Given(Attribute),
    Fetch(String),
}

#[derive(Clone)]
pub struct GoodDataClient {
    http: Client,
    config: Arc<ClientConfig>,
    base: Url,
}

impl std::fmt::Debug for GoodDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoodDataClient")
            .field("base", &self.base.as_str())
            .field("config", &self.config)
            .finish()
    }
}

impl GoodDataClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = config.base_url()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
            base,
        })
    }

    /// Create a client from `GOODDATA_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn auth(&self) -> Authenticator<'_> {
        Authenticator {
            http: &self.http,
            config: &self.config,
            base: &self.base,
        }
    }

    fn request(&self, session: &Session, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = http::endpoint(&self.base, path)?;
        tracing::debug!(method = %method, url = %url, "Issuing request");
        Ok(self
            .http
            .request(method, url)
            .header(COOKIE, session.temporary_cookie()?))
    }

    async fn post_user_filters(
        &self,
        session: &Session,
        project: &str,
        input: &UpdateFiltersInput,
    ) -> Result<UserFiltersUpdateResponse> {
        let path = format!("/gdc/md/{}/userfilters", project);
        let response = self
            .request(session, Method::POST, &path)?
            .json(&UserFiltersRequest::single(input))
            .send()
            .await?;
        let body = http::classify(response, Operation::UpdateFilters).await?;

        let parsed: UserFiltersUpdateResponse = serde_json::from_value(body)
            .map_err(|_| GoodDataError::Semantic(Operation::UpdateFilters))?;
        if !parsed.user_filters_update_result.succeeded_for(&input.user_id) {
            tracing::warn!(
                user = %input.user_id,
                failed = parsed.user_filters_update_result.failed.len(),
                "Filter update not confirmed for user"
            );
            return Err(GoodDataError::Semantic(Operation::UpdateFilters));
        }
        Ok(parsed)
    }

    /// POST a body and require a `uri` in the response
    async fn post_for_uri<T: serde::Serialize + ?Sized>(
        &self,
        session: &Session,
        path: &str,
        payload: &T,
        operation: Operation,
    ) -> Result<CreatedObject> {
        let response = self
            .request(session, Method::POST, path)?
            .json(payload)
            .send()
            .await?;
        let body = http::classify(response, operation).await?;

        if !body.get("uri").map(Value::is_string).unwrap_or(false) {
            tracing::warn!(operation = ?operation, "Response has no uri");
            return Err(GoodDataError::Semantic(operation));
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn post_project_user(
        &self,
        session: &Session,
        project: &str,
        input: &AddUserToProjectInput,
    ) -> Result<UpdateResult> {
        let path = format!("/gdc/projects/{}/users", project);
        let response = self
            .request(session, Method::POST, &path)?
            .json(&ProjectUserRequest::new(input))
            .send()
            .await?;
        let body = http::classify(response, Operation::AddUserToProject).await?;

        let parsed: ProjectUsersUpdateResponse = serde_json::from_value(body)
            .map_err(|_| GoodDataError::Semantic(Operation::AddUserToProject))?;
        let result = parsed.project_users_update_result;
        if result.successful.is_empty() {
            tracing::warn!(
                user = %input.user_id,
                failed = result.failed.len(),
                "Project membership not confirmed"
            );
            return Err(GoodDataError::Semantic(Operation::AddUserToProject));
        }
        Ok(result)
    }

    async fn fetch_account_settings(
        &self,
        session: &Session,
        domain: &str,
        login: &str,
    ) -> Result<AccountSettings> {
        let path = format!("/gdc/account/domains/{}/users", domain);
        let mut url = http::endpoint(&self.base, &path)?;
        url.query_pairs_mut().append_pair("login", login);

        let response = self
            .request(session, Method::GET, url.as_str())?
            .send()
            .await?;
        let mut body = http::classify(response, Operation::GetUserInfo).await?;

        let settings = body
            .get_mut("accountSettings")
            .map(Value::take)
            .ok_or_else(|| GoodDataError::Shape("response has no accountSettings".to_string()))?;
        Ok(serde_json::from_value(settings)?)
    }

    async fn delete_profile(&self, session: &Session, profile: &str) -> Result<Value> {
        let path = format!("/gdc/account/profile/{}", profile);
        let response = self
            .request(session, Method::DELETE, &path)?
            .send()
            .await?;
        http::classify(response, Operation::DeleteUser).await
    }

    async fn fetch_attribute(&self, session: &Session, uri: &str) -> Result<Attribute> {
        let response = self.request(session, Method::GET, uri)?.send().await?;
        let mut body = http::classify(response, Operation::GetAttribute).await?;

        let attribute = body
            .get_mut("attribute")
            .map(Value::take)
            .ok_or_else(|| GoodDataError::Shape("response has no attribute".to_string()))?;
        Ok(serde_json::from_value(attribute)?)
    }

    /// Stream the elements behind `link`, keeping those whose title was requested
    async fn lookup_elements(
        &self,
        session: &Session,
        link: &str,
        titles: &HashSet<String>,
    ) -> Result<HashMap<String, String>> {
        // The link comes from the platform, so an off-host link is a response defect
        let request = self
            .request(session, Method::GET, link)
            .map_err(|e| match e {
                GoodDataError::InvalidInput(msg) => GoodDataError::Shape(msg),
                other => other,
            })?;
        let response = request.send().await?;
        let status = response.status().as_u16();
        if status >= http::ERROR_STATUS {
            // Vendor error object takes precedence over the bare status
            return match http::classify(response, Operation::FindAttributeElements).await {
                Err(e) => Err(e),
                Ok(_) => Err(GoodDataError::HttpStatus {
                    operation: Operation::FindAttributeElements,
                    status,
                }),
            };
        }

        let mut elements = Box::pin(element_stream(Box::pin(response.bytes_stream())));
        let mut found = HashMap::new();
        let mut scanned = 0usize;
        while let Some(element) = elements.next().await {
            let element = element?;
            scanned += 1;
            if titles.contains(&element.title) {
                found.insert(element.title, element.uri);
            }
        }

        tracing::debug!(
            scanned,
            requested = titles.len(),
            found = found.len(),
            "Element lookup finished"
        );
        Ok(found)
    }
}

#[async_trait]
impl GoodDataApi for GoodDataClient {
    async fn update_filters(&self, input: UpdateFiltersInput) -> Result<UserFiltersUpdateResponse> {
        let project = self.config.require_project()?;
        self.auth()
            .with_session(move |session| async move {
                self.post_user_filters(&session, project, &input).await
            })
            .await
    }

    async fn create_filter(&self, input: CreateFilterInput) -> Result<CreatedObject> {
        let project = self.config.require_project()?;
        let attribute_uri = input
            .attribute_uri
            .as_deref()
            .or(self.config.attribute_uri_for_filter.as_deref())
            .ok_or_else(|| {
                GoodDataError::InvalidInput("no attribute uri for the filter expression".to_string())
            })?;
        let payload = UserFilterObject::new(&input.title, attribute_uri, &input.element_id);
        let path = format!("/gdc/md/{}/obj", project);

        self.auth()
            .with_session(|session| async move {
                self.post_for_uri(&session, &path, &payload, Operation::CreateFilter)
                    .await
            })
            .await
    }

    async fn create_user(&self, input: CreateUserInput) -> Result<CreatedObject> {
        let domain = self.config.require_domain()?;
        let payload = AccountSettingRequest::new(&input);
        let path = format!("/gdc/account/domains/{}/users", domain);

        self.auth()
            .with_session(|session| async move {
                self.post_for_uri(&session, &path, &payload, Operation::CreateUser)
                    .await
            })
            .await
    }

    async fn add_user_to_project(&self, input: AddUserToProjectInput) -> Result<UpdateResult> {
        let project = self.config.require_project()?;
        self.auth()
            .with_session(move |session| async move {
                self.post_project_user(&session, project, &input).await
            })
            .await
    }

    async fn get_user_info_by_login(&self, login: &str) -> Result<AccountSettings> {
        let domain = self.config.require_domain()?;
        self.auth()
            .with_session(|session| async move {
                self.fetch_account_settings(&session, domain, login).await
            })
            .await
    }

    async fn delete_user(&self, user_id: &str) -> Result<Value> {
        let profile = profile_id(user_id);
        if profile.is_empty() {
            return Err(GoodDataError::InvalidInput("user id is empty".to_string()));
        }
        self.auth()
            .with_session(|session| async move { self.delete_profile(&session, profile).await })
            .await
    }

    async fn get_attribute_by_uri(&self, uri: &str) -> Result<Attribute> {
        http::endpoint(&self.base, uri)?;
        self.auth()
            .with_session(|session| async move { self.fetch_attribute(&session, uri).await })
            .await
    }

    async fn find_attribute_elements_by_title(
        &self,
        input: FindElementsInput,
    ) -> Result<ElementLookup> {
        let FindElementsInput {
            titles,
            uri,
            attribute,
        } = input;
        if titles.is_empty() {
            return Err(GoodDataError::InvalidInput("Has no titles to find".to_string()));
        }
        let source = match (attribute, uri) {
            (Some(attribute), _) => AttributeSource::Given(attribute),
            (None, Some(uri)) => {
                http::endpoint(&self.base, &uri)?;
                AttributeSource::Fetch(uri)
            }
            (None, None) => {
                return Err(GoodDataError::InvalidInput(
                    "either an attribute or its uri is required".to_string(),
                ))
            }
        };
        let titles: HashSet<String> = titles.into_iter().collect();

        self.auth()
            .with_session(|session| async move {
                let attribute = match source {
                    AttributeSource::Given(attribute) => attribute,
                    AttributeSource::Fetch(uri) => self.fetch_attribute(&session, &uri).await?,
                };
                let link = attribute.elements_link().ok_or_else(|| {
                    GoodDataError::Shape("Has no link to attribute's elements".to_string())
                })?;
                let elements = self.lookup_elements(&session, link, &titles).await?;
                Ok::<_, GoodDataError>(ElementLookup {
                    elements,
                    attribute,
                })
            })
            .await
    }
}
