use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::LifecycleTransitionError;
use crate::gateway::GatewayError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Product,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => f.write_str("customer"),
            Self::Product => f.write_str("product"),
        }
    }
}

/// Errors that escape the coordination layer. Model failures never appear here.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("data gateway failure: {0}")]
    DataGateway(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleTransitionError),
}

impl From<GatewayError> for OrchestrationError {
    fn from(value: GatewayError) -> Self {
        Self::DataGateway(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "The requested customer or product could not be found.",
            Self::ServiceUnavailable { .. } => {
                "The catalog is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl OrchestrationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<OrchestrationError> for InterfaceError {
    fn from(value: OrchestrationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            OrchestrationError::NotFound { .. } => {
                Self::NotFound { message: value.to_string(), correlation_id }
            }
            OrchestrationError::DataGateway(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            OrchestrationError::Lifecycle(error) => {
                Self::Internal { message: error.to_string(), correlation_id }
            }
        }
    }
}
