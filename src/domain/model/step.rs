use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Directives, EndpointId};

/// Step type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    Start,
    Endpoint,
    Branch,
    /// Any other tag. Rejected at configuration time, fatal for an iteration at run time.
    Unknown(String),
}

impl From<String> for StepKind {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "START" => StepKind::Start,
            "ENDPOINT" => StepKind::Endpoint,
            "BRANCH" => StepKind::Branch,
            _ => StepKind::Unknown(value),
        }
    }
}

impl From<StepKind> for String {
    fn from(value: StepKind) -> Self {
        value.to_string()
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Start => f.write_str("START"),
            StepKind::Endpoint => f.write_str("ENDPOINT"),
            StepKind::Branch => f.write_str("BRANCH"),
            StepKind::Unknown(tag) => f.write_str(tag),
        }
    }
}

/// Wire form of a step, as submitted to and returned from `configure_flow`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStepDto {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<EndpointId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_processor: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_processor: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_if_true: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_if_false: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl FlowStepDto {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            endpoint_id: None,
            pre_processor: None,
            post_processor: None,
            next_if_true: None,
            next_if_false: None,
            condition: None,
        }
    }

    pub fn start(id: impl Into<String>, next: impl Into<String>) -> Self {
        let mut dto = Self::new(id, StepKind::Start);
        dto.next_if_true = Some(next.into());
        dto
    }

    pub fn endpoint(id: impl Into<String>, endpoint_id: EndpointId) -> Self {
        let mut dto = Self::new(id, StepKind::Endpoint);
        dto.endpoint_id = Some(endpoint_id);
        dto
    }

    pub fn branch(
        id: impl Into<String>,
        condition: impl Into<String>,
        if_true: impl Into<String>,
        if_false: impl Into<String>,
    ) -> Self {
        let mut dto = Self::new(id, StepKind::Branch);
        dto.condition = Some(condition.into());
        dto.next_if_true = Some(if_true.into());
        dto.next_if_false = Some(if_false.into());
        dto
    }

    pub fn with_next(mut self, if_true: Option<&str>, if_false: Option<&str>) -> Self {
        self.next_if_true = if_true.map(str::to_string);
        self.next_if_false = if_false.map(str::to_string);
        self
    }

    pub fn with_pre_processor(mut self, value: Value) -> Self {
        self.pre_processor = Some(value);
        self
    }

    pub fn with_post_processor(mut self, value: Value) -> Self {
        self.post_processor = Some(value);
        self
    }

    /// `nextIfTrue`, treating a blank id as absent.
    pub fn next_true(&self) -> Option<&str> {
        non_blank(&self.next_if_true)
    }

    /// `nextIfFalse`, treating a blank id as absent.
    pub fn next_false(&self) -> Option<&str> {
        non_blank(&self.next_if_false)
    }
}

/// Blank targets mean "no edge". Others are kept verbatim so they match step
/// ids, which are never trimmed.
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Immutable step as held by a built flow definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStep {
    id: String,
    kind: StepKind,
    endpoint_id: Option<EndpointId>,
    pre_processor: Option<Directives>,
    post_processor: Option<Directives>,
    next_if_true: Option<String>,
    next_if_false: Option<String>,
    condition: Option<String>,
}

impl FlowStep {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn endpoint_id(&self) -> Option<EndpointId> {
        self.endpoint_id
    }

    pub fn pre_processor(&self) -> Option<&Directives> {
        self.pre_processor.as_ref()
    }

    pub fn post_processor(&self) -> Option<&Directives> {
        self.post_processor.as_ref()
    }

    pub fn next_if_true(&self) -> Option<&str> {
        self.next_if_true.as_deref()
    }

    pub fn next_if_false(&self) -> Option<&str> {
        self.next_if_false.as_deref()
    }

    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.next_if_true.is_none() && self.next_if_false.is_none()
    }

    pub fn to_dto(&self) -> FlowStepDto {
        FlowStepDto {
            id: self.id.clone(),
            kind: self.kind.clone(),
            endpoint_id: self.endpoint_id,
            pre_processor: self.pre_processor.as_ref().map(Directives::to_value),
            post_processor: self.post_processor.as_ref().map(Directives::to_value),
            next_if_true: self.next_if_true.clone(),
            next_if_false: self.next_if_false.clone(),
            condition: self.condition.clone(),
        }
    }
}

impl From<&FlowStepDto> for FlowStep {
    fn from(dto: &FlowStepDto) -> Self {
        Self {
            id: dto.id.clone(),
            kind: dto.kind.clone(),
            endpoint_id: dto.endpoint_id,
            pre_processor: dto.pre_processor.as_ref().map(Directives::parse_lenient),
            post_processor: dto.post_processor.as_ref().map(Directives::parse_lenient),
            next_if_true: dto.next_true().map(str::to_string),
            next_if_false: dto.next_false().map(str::to_string),
            condition: dto
                .condition
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        }
    }
}
