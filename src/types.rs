//! GoodData API request and response types
//!
//! Request envelopes mirror the JSON the platform expects; response types keep unknown
//! fields in `extra` so callers see the full object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const DEFAULT_LANGUAGE: &str = "en-US";

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFiltersInput {
    /// Profile URI of the user, e.g. `/gdc/account/profile/{id}`
    pub user_id: String,
    /// Filter object URIs; replaces the user's current filters
    pub filters: Vec<String>,
}

impl UpdateFiltersInput {
    pub fn new(user_id: impl Into<String>, filters: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            filters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFilterInput {
    pub title: String,
    pub element_id: String,
    /// Falls back to `ClientConfig::attribute_uri_for_filter` when unset
    pub attribute_uri: Option<String>,
}

impl CreateFilterInput {
    pub fn new(title: impl Into<String>, element_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            element_id: element_id.into(),
            attribute_uri: None,
        }
    }

    pub fn with_attribute_uri(mut self, uri: impl Into<String>) -> Self {
        self.attribute_uri = Some(uri.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateUserInput {
    pub login: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub sso_provider: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddUserToProjectInput {
    pub user_id: String,
    /// Role URIs, e.g. `/gdc/projects/{projectId}/roles/2`
    pub roles: Vec<String>,
}

impl AddUserToProjectInput {
    pub fn new(user_id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles,
        }
    }
}

/// Titles to resolve, plus either an attribute URI or an already-fetched attribute
#[derive(Debug, Clone, Default)]
pub struct FindElementsInput {
    pub titles: Vec<String>,
    pub uri: Option<String>,
    pub attribute: Option<Attribute>,
}

impl FindElementsInput {
    pub fn by_uri(titles: Vec<String>, uri: impl Into<String>) -> Self {
        Self {
            titles,
            uri: Some(uri.into()),
            attribute: None,
        }
    }

    pub fn by_attribute(titles: Vec<String>, attribute: Attribute) -> Self {
        Self {
            titles,
            uri: None,
            attribute: Some(attribute),
        }
    }
}

// =============================================================================
// Request envelopes
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct UserFiltersRequest<'a> {
    #[serde(rename = "userFilters")]
    pub user_filters: UserFilterItems<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserFilterItems<'a> {
    pub items: Vec<UserFilterItem<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserFilterItem<'a> {
    pub user: &'a str,
    #[serde(rename = "userFilters")]
    pub user_filters: &'a [String],
}

impl<'a> UserFiltersRequest<'a> {
    pub fn single(input: &'a UpdateFiltersInput) -> Self {
        Self {
            user_filters: UserFilterItems {
                items: vec![UserFilterItem {
                    user: &input.user_id,
                    user_filters: &input.filters,
                }],
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UserFilterObject<'a> {
    #[serde(rename = "userFilter")]
    pub user_filter: UserFilterBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserFilterBody<'a> {
    pub content: UserFilterContent,
    pub meta: UserFilterMeta<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserFilterContent {
    pub expression: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UserFilterMeta<'a> {
    pub category: &'static str,
    pub title: &'a str,
}

impl<'a> UserFilterObject<'a> {
    pub fn new(title: &'a str, attribute_uri: &str, element_id: &str) -> Self {
        Self {
            user_filter: UserFilterBody {
                content: UserFilterContent {
                    expression: filter_expression(attribute_uri, element_id),
                },
                meta: UserFilterMeta {
                    category: "userFilter",
                    title,
                },
            },
        }
    }
}

/// MAQL expression restricting `attribute_uri` to a single element
pub fn filter_expression(attribute_uri: &str, element_id: &str) -> String {
    format!("[{0}]=[{0}/elements?id={1}]", attribute_uri, element_id)
}

#[derive(Debug, Serialize)]
pub(crate) struct AccountSettingRequest<'a> {
    #[serde(rename = "accountSetting")]
    pub account_setting: NewAccountSetting<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewAccountSetting<'a> {
    pub login: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    #[serde(rename = "verifyPassword")]
    pub verify_password: &'a str,
    #[serde(rename = "firstName")]
    pub first_name: &'a str,
    #[serde(rename = "lastName")]
    pub last_name: &'a str,
    #[serde(rename = "ssoProvider", skip_serializing_if = "Option::is_none")]
    pub sso_provider: Option<&'a str>,
    pub language: &'a str,
}

impl<'a> AccountSettingRequest<'a> {
    pub fn new(input: &'a CreateUserInput) -> Self {
        Self {
            account_setting: NewAccountSetting {
                login: &input.login,
                email: &input.email,
                password: &input.password,
                verify_password: &input.password,
                first_name: &input.first_name,
                last_name: &input.last_name,
                sso_provider: input.sso_provider.as_deref(),
                language: input.language.as_deref().unwrap_or(DEFAULT_LANGUAGE),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectUserRequest<'a> {
    pub user: ProjectUser<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectUser<'a> {
    pub content: ProjectUserContent<'a>,
    pub links: ProjectUserLinks<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectUserContent<'a> {
    pub status: &'static str,
    #[serde(rename = "userRoles")]
    pub user_roles: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct ProjectUserLinks<'a> {
    #[serde(rename = "self")]
    pub self_link: &'a str,
}

impl<'a> ProjectUserRequest<'a> {
    pub fn new(input: &'a AddUserToProjectInput) -> Self {
        Self {
            user: ProjectUser {
                content: ProjectUserContent {
                    status: "ENABLED",
                    user_roles: &input.roles,
                },
                links: ProjectUserLinks {
                    self_link: &input.user_id,
                },
            },
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// `successful` / `failed` lists returned by bulk update endpoints
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UpdateResult {
    #[serde(default)]
    pub successful: Vec<String>,
    #[serde(default)]
    pub failed: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UpdateResult {
    pub fn succeeded_for(&self, id: &str) -> bool {
        self.successful.iter().any(|s| s == id) && self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserFiltersUpdateResponse {
    #[serde(rename = "userFiltersUpdateResult")]
    pub user_filters_update_result: UpdateResult,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) struct ProjectUsersUpdateResponse {
    #[serde(rename = "projectUsersUpdateResult")]
    pub project_users_update_result: UpdateResult,
}

/// Body returned when the platform creates an object or user
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CreatedObject {
    pub uri: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AccountSettings {
    #[serde(default)]
    pub items: Vec<AccountSettingItem>,
    #[serde(default)]
    pub paging: Option<Value>,
}

impl AccountSettings {
    pub fn first(&self) -> Option<&AccountSetting> {
        self.items.first().map(|i| &i.account_setting)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccountSettingItem {
    #[serde(rename = "accountSetting")]
    pub account_setting: AccountSetting,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AccountSetting {
    pub login: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(rename = "ssoProvider")]
    pub sso_provider: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub links: Option<AccountLinks>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountSetting {
    pub fn profile_uri(&self) -> Option<&str> {
        self.links.as_ref()?.self_link.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AccountLinks {
    #[serde(rename = "self")]
    pub self_link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attribute metadata object (`{"attribute": {...}}` unwrapped)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Attribute {
    #[serde(default)]
    pub content: Option<AttributeContent>,
    #[serde(default)]
    pub meta: Option<ObjectMeta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Attribute {
    /// Link to the elements of the first display form
    pub fn elements_link(&self) -> Option<&str> {
        self.content
            .as_ref()?
            .display_forms
            .first()?
            .links
            .as_ref()?
            .elements
            .as_deref()
            .filter(|link| !link.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AttributeContent {
    #[serde(rename = "displayForms", default)]
    pub display_forms: Vec<DisplayForm>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DisplayForm {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub meta: Option<ObjectMeta>,
    #[serde(default)]
    pub links: Option<DisplayFormLinks>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DisplayFormLinks {
    pub elements: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ObjectMeta {
    pub title: Option<String>,
    pub uri: Option<String>,
    pub identifier: Option<String>,
    pub category: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of `attributeElements.elements`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub title: String,
    pub uri: String,
}

impl Element {
    /// `None` when the value lacks a string `title` or `uri`
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            title: value.get("title")?.as_str()?.to_string(),
            uri: value.get("uri")?.as_str()?.to_string(),
        })
    }
}

/// Requested titles that were found, with the attribute the lookup ran against
#[derive(Debug, Clone, Default)]
pub struct ElementLookup {
    pub elements: HashMap<String, String>,
    pub attribute: Attribute,
}

impl ElementLookup {
    pub fn get(&self, title: &str) -> Option<&str> {
        self.elements.get(title).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn into_elements(self) -> HashMap<String, String> {
        self.elements
    }
}

/// Profile id from either a bare id or a `/gdc/account/profile/{id}` URI
pub fn profile_id(user_id: &str) -> &str {
    user_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(user_id)
}
