//! Declarative property transforms, applied server-side after aggregation.
//!
//! Transformed values must stay inside the schema: every target is a
//! declared property, and the op's output kind must match the target's
//! declared kind, because the transformed element is re-encoded into the
//! same byte layout.

use crate::element::Properties;
use serde::{Deserialize, Serialize};

///
/// TransformOp
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformOp {
    /// Overwrite `property` with a constant.
    SetConstant {
        property: String,
        value: crate::value::Value,
    },

    /// Copy `from` into `to`; a missing source leaves `to` untouched.
    CopyProperty { from: String, to: String },

    /// Join the display forms of `sources` into `target`. Missing sources
    /// are skipped.
    ConcatText {
        sources: Vec<String>,
        target: String,
        separator: String,
    },
}

///
/// Transform
/// Ops applied in declared order.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transform(pub Vec<TransformOp>);

impl Transform {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn with(mut self, op: TransformOp) -> Self {
        self.0.push(op);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn apply(&self, properties: &mut Properties) {
        for op in &self.0 {
            match op {
                TransformOp::SetConstant { property, value } => {
                    properties.insert(property.clone(), value.clone());
                }
                TransformOp::CopyProperty { from, to } => {
                    if let Some(value) = properties.get(from).cloned() {
                        properties.insert(to.clone(), value);
                    }
                }
                TransformOp::ConcatText {
                    sources,
                    target,
                    separator,
                } => {
                    let joined = sources
                        .iter()
                        .filter_map(|name| properties.get(name))
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(separator);
                    properties.insert(target.clone(), crate::value::Value::Text(joined));
                }
            }
        }
    }

    /// Every property name an op reads or writes.
    pub fn referenced(&self) -> impl Iterator<Item = &str> {
        self.0.iter().flat_map(|op| {
            let names: Vec<&str> = match op {
                TransformOp::SetConstant { property, .. } => vec![property],
                TransformOp::CopyProperty { from, to } => vec![from.as_str(), to.as_str()],
                TransformOp::ConcatText {
                    sources, target, ..
                } => sources
                    .iter()
                    .map(String::as_str)
                    .chain(std::iter::once(target.as_str()))
                    .collect(),
            };
            names
        })
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn ops_apply_in_order() {
        let transform = Transform::new()
            .with(TransformOp::SetConstant {
                property: "a".into(),
                value: Value::Int(1),
            })
            .with(TransformOp::CopyProperty {
                from: "a".into(),
                to: "b".into(),
            });

        let mut props = Properties::new();
        transform.apply(&mut props);
        assert_eq!(props.get("b"), Some(&Value::Int(1)));
    }

    #[test]
    fn concat_skips_missing_sources() {
        let transform = Transform::new().with(TransformOp::ConcatText {
            sources: vec!["x".into(), "y".into()],
            target: "joined".into(),
            separator: "-".into(),
        });

        let mut props = Properties::new().with("y", Value::Text("right".into()));
        transform.apply(&mut props);
        assert_eq!(props.get("joined"), Some(&Value::Text("right".into())));
    }
}
