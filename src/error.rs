use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GoodDataError>;

/// The step of a call chain that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    TempToken,
    UpdateFilters,
    CreateFilter,
    CreateUser,
    AddUserToProject,
    GetUserInfo,
    DeleteUser,
    GetAttribute,
    FindAttributeElements,
}

impl Operation {
    /// Fixed human-readable message reported when this step fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Login => "error logging in",
            Self::TempToken => "error getting temporary token",
            Self::UpdateFilters => "error updating filters",
            Self::CreateFilter => "error creating filter",
            Self::CreateUser => "error creating user",
            Self::AddUserToProject => "error adding user to project",
            Self::GetUserInfo => "error getting user info",
            Self::DeleteUser => "error deleting user",
            Self::GetAttribute => "error getting attribute",
            Self::FindAttributeElements => "error getting attribute elements",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.failure_message())
    }
}

#[derive(Debug, Error)]
pub enum GoodDataError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("platform error: {0}")]
    Vendor(VendorError),

    #[error("{operation} (HTTP {status})")]
    HttpStatus { operation: Operation, status: u16 },

    #[error("{0}")]
    Semantic(Operation),

    #[error("{0}")]
    Shape(String),

    #[error("session cookie {0} was not issued")]
    MissingSessionCookie(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration: {0}")]
    Config(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl GoodDataError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::HttpStatus { operation, .. } | Self::Semantic(operation) => Some(*operation),
            _ => None,
        }
    }
}

/// Structured error object returned by the platform under a top-level `error` key.
///
/// The payload is kept verbatim; accessors cover the fields the platform normally sends.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorError {
    payload: Value,
}

impl VendorError {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn message(&self) -> Option<&str> {
        self.field("message")
    }

    pub fn error_class(&self) -> Option<&str> {
        self.field("errorClass")
    }

    pub fn error_code(&self) -> Option<&str> {
        self.field("errorCode")
    }

    pub fn request_id(&self) -> Option<&str> {
        self.field("requestId")
    }

    fn field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Message with `%s` placeholders replaced by `parameters`, in order
    pub fn formatted_message(&self) -> Option<String> {
        let template = self.message()?;
        let mut params = self
            .payload
            .get("parameters")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(idx) = rest.find("%s") {
            out.push_str(&rest[..idx]);
            match params.next() {
                Some(Value::String(s)) => out.push_str(s),
                Some(other) => out.push_str(&other.to_string()),
                None => out.push_str("%s"),
            }
            rest = &rest[idx + 2..];
        }
        out.push_str(rest);
        Some(out)
    }
}

impl std::fmt::Display for VendorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.formatted_message(), self.error_class()) {
            (Some(msg), Some(class)) => write!(f, "{} ({})", msg, class),
            (Some(msg), None) => f.write_str(&msg),
            _ => write!(f, "{}", self.payload),
        }
    }
}
