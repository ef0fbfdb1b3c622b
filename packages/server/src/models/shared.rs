use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Acknowledgement body for writes that return nothing else.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SuccessResponse {
    #[schema(example = true)]
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// `?userId=` query parameter.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Owning user.
    pub user_id: Option<String>,
}

impl UserQuery {
    /// The user id, or a validation error if it is missing or blank.
    pub fn require(&self) -> Result<&str, AppError> {
        require_present(self.user_id.as_deref(), "User ID required")
    }

    pub fn hint(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|u| !u.is_empty())
    }
}

pub fn require_present<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Validation(message.into())),
    }
}
