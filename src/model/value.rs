// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Nesting below this depth is stringified instead of converted.
pub const MAX_VALUE_DEPTH: usize = 10;

/// A value read from the host (parameter values, expression results).
///
/// The set of shapes is closed: anything the host cannot describe as one of the structured variants
/// arrives as `Opaque` with its string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HostValue {
    Scalar(Scalar),
    Vector(Vec<f64>),
    Color([f64; 3]),
    Enum(String),
    Curve(Curve),
    Sequence(Vec<HostValue>),
    Mapping(BTreeMap<String, HostValue>),
    Opaque(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// A ramp parameter: interpolation basis per key plus key positions and values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    #[serde(default)]
    pub basis: Vec<String>,
    #[serde(default)]
    pub keys: Vec<f64>,
    #[serde(default)]
    pub values: Vec<HostValue>,
}

impl HostValue {
    /// Converts to a JSON-safe value.
    pub fn to_json(&self) -> Value {
        self.to_json_at(MAX_VALUE_DEPTH)
    }

    fn to_json_at(&self, depth: usize) -> Value {
        if depth == 0 {
            return Value::String(format!("{self:?}"));
        }

        match self {
            Self::Scalar(scalar) => scalar_to_json(scalar),
            Self::Vector(components) => floats_to_json(components),
            Self::Color(rgb) => floats_to_json(rgb),
            Self::Enum(name) => Value::String(name.clone()),
            Self::Curve(curve) => curve_to_json(curve, depth),
            Self::Sequence(items) => {
                Value::Array(items.iter().map(|item| item.to_json_at(depth - 1)).collect())
            }
            Self::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json_at(depth - 1)))
                    .collect::<Map<_, _>>(),
            ),
            Self::Opaque(text) => Value::String(text.clone()),
        }
    }
}

fn scalar_to_json(scalar: &Scalar) -> Value {
    match scalar {
        Scalar::Null => Value::Null,
        Scalar::Bool(value) => Value::Bool(*value),
        Scalar::Int(value) => Value::Number((*value).into()),
        Scalar::Float(value) => float_to_json(*value),
        Scalar::Text(value) => Value::String(value.clone()),
    }
}

// NaN and infinities have no JSON number form.
fn float_to_json(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or_else(|| Value::String(value.to_string()))
}

fn floats_to_json(values: &[f64]) -> Value {
    Value::Array(values.iter().copied().map(float_to_json).collect())
}

fn curve_to_json(curve: &Curve, depth: usize) -> Value {
    serde_json::json!({
        "type": "ramp",
        "basis": curve.basis,
        "keys": floats_to_json(&curve.keys),
        "values": curve.values.iter().map(|value| value.to_json_at(depth - 1)).collect::<Vec<_>>(),
    })
}
