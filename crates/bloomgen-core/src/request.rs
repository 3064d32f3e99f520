//! Request and completion types for bloomgen-core

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CancellationFlag, GenerationParams};

/// NewType pattern for Request ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Create a new RequestId
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create from existing string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A prompt together with the parameters to sample it under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Unique request ID
    pub id: RequestId,
    /// Raw model input text, possibly empty
    pub prompt: String,
    pub params: GenerationParams,
    /// Set by the caller to abandon the request between sampling steps
    #[serde(skip)]
    pub cancel: CancellationFlag,
}

impl GenerationRequest {
    /// Create a request with default parameters
    pub fn simple(prompt: impl Into<String>) -> Self {
        Self::with_params(prompt, GenerationParams::default())
    }

    pub fn with_params(prompt: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            id: RequestId::new(),
            prompt: prompt.into(),
            params,
            cancel: CancellationFlag::new(),
        }
    }
}

/// Completions produced for one request, in sampling order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSet {
    /// Corresponding request ID
    pub request_id: RequestId,
    pub completions: Vec<String>,
}

impl CompletionSet {
    pub fn new(request_id: RequestId, completions: Vec<String>) -> Self {
        Self {
            request_id,
            completions,
        }
    }

    pub fn len(&self) -> usize {
        self.completions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.completions.iter().map(String::as_str)
    }

    /// Completions paired with their 1-based position
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &str)> {
        self.iter().enumerate().map(|(idx, text)| (idx + 1, text))
    }
}
