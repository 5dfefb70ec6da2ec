// ── Filter engine ──
//
// Recursive boolean filter tree evaluated against one delivered message.
// The bridge never filters; this runs display-side over the bridged set.

use std::fmt;

use natswatch_api::BrokerMessage;
use serde::{Deserialize, Serialize};

/// One node of a filter expression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Filter {
    /// Matches every message.
    #[default]
    Unfiltered,
    /// Substring match on the subject or the raw payload.
    Value {
        field: ValueField,
        #[serde(default)]
        operator: Operator,
        value: String,
    },
    /// Substring match on any value sent under one header key.
    KeyValue {
        field: KeyValueField,
        #[serde(default)]
        operator: Operator,
        key: String,
        value: String,
    },
    /// Ordered combination of child filters.
    Group { logic: Logic, filters: Vec<Filter> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValueField {
    Subject,
    Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KeyValueField {
    Headers,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operator {
    #[default]
    Contains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Logic {
    And,
    Or,
}

impl Filter {
    pub fn subject_contains(value: impl Into<String>) -> Self {
        Self::Value {
            field: ValueField::Subject,
            operator: Operator::Contains,
            value: value.into(),
        }
    }

    pub fn payload_contains(value: impl Into<String>) -> Self {
        Self::Value {
            field: ValueField::Payload,
            operator: Operator::Contains,
            value: value.into(),
        }
    }

    pub fn header_contains(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::KeyValue {
            field: KeyValueField::Headers,
            operator: Operator::Contains,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn all(filters: Vec<Filter>) -> Self {
        Self::Group {
            logic: Logic::And,
            filters,
        }
    }

    pub fn any(filters: Vec<Filter>) -> Self {
        Self::Group {
            logic: Logic::Or,
            filters,
        }
    }

    /// Evaluate this filter against one message.
    ///
    /// Empty `and` groups match everything, empty `or` groups match nothing.
    pub fn matches(&self, msg: &BrokerMessage) -> bool {
        match self {
            Self::Unfiltered => true,
            Self::Value {
                field,
                operator: Operator::Contains,
                value,
            } => match field {
                ValueField::Subject => msg.subject().contains(value.as_str()),
                ValueField::Payload => msg.payload().contains(value.as_str()),
            },
            Self::KeyValue {
                operator: Operator::Contains,
                key,
                value,
                ..
            } => msg
                .header_values(key)
                .is_some_and(|values| values.iter().any(|v| v.contains(value.as_str()))),
            Self::Group {
                logic: Logic::And,
                filters,
            } => filters.iter().all(|f| f.matches(msg)),
            Self::Group {
                logic: Logic::Or,
                filters,
            } => filters.iter().any(|f| f.matches(msg)),
        }
    }

    /// Number of leaf conditions in the tree.
    pub fn count(&self) -> usize {
        match self {
            Self::Unfiltered => 0,
            Self::Value { .. } | Self::KeyValue { .. } => 1,
            Self::Group { filters, .. } => filters.iter().map(Filter::count).sum(),
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.count() == 0
    }

    /// Human-readable rendering, e.g. `and (subject contains a, headers k contains v)`.
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unfiltered => f.write_str("Unfiltered"),
            Self::Value {
                field,
                operator,
                value,
            } => write!(f, "{field} {operator} {value}"),
            Self::KeyValue {
                field,
                operator,
                key,
                value,
            } => write!(f, "{field} {key} {operator} {value}"),
            Self::Group { logic, filters } => {
                write!(f, "{logic} (")?;
                for (i, child) in filters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Free-function form of [`Filter::matches`].
pub fn matches(msg: &BrokerMessage, filter: &Filter) -> bool {
    filter.matches(msg)
}
