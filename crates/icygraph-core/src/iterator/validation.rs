//! Validation stage: drops cells whose decoded element fails a declared
//! property validator. Undecodable cells are corrupt by definition here and
//! are dropped with a warning rather than failing the scan.

use crate::iterator::{VALIDATION_NAME, build_error, config::IteratorConfig, stage_codec};
use icygraph_tablet::{CellStream, ServerIteratorBuilder, TabletError, iterator::IteratorOptions};
use tracing::warn;

pub struct ValidationIterator;

impl ServerIteratorBuilder for ValidationIterator {
    fn name(&self) -> &'static str {
        VALIDATION_NAME
    }

    fn build<'a>(
        &self,
        options: &IteratorOptions,
        input: CellStream<'a>,
    ) -> Result<CellStream<'a>, TabletError> {
        let config =
            IteratorConfig::from_options(options).map_err(|e| build_error(VALIDATION_NAME, &e))?;
        let codec = stage_codec(&config);
        let schema = codec.schema().clone();

        Ok(Box::new(input.filter(move |(key, value)| {
            let element = match codec.from_key_value(key, value, false) {
                Ok(element) => element,
                Err(err) => {
                    warn!(key = %key, error = %err, "dropping undecodable cell");
                    return false;
                }
            };

            let Some((_, def)) = schema.def(element.group()) else {
                return false;
            };

            def.properties.iter().all(|property| {
                property.validator.as_ref().is_none_or(|validator| {
                    validator.eval(element.properties().get(&property.name))
                })
            })
        })))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{ElementConverter, layout::RowLayout},
        element::{Element, Entity},
        filter::{CompareOp, ValuePredicate},
        iterator::config::CONFIG_OPTION_KEY,
        schema::{ElementDef, PropertyDef, Schema, aggregate::Aggregator},
        value::{Value, ValueKind},
    };
    use std::sync::Arc;

    fn guarded_schema() -> Arc<Schema> {
        let schema = Schema::new().with_entity(
            "person",
            ElementDef::new(ValueKind::Text).with_property(
                PropertyDef::new("age", ValueKind::Int, Aggregator::Max).with_validator(
                    ValuePredicate::new(CompareOp::Ge, Some(Value::Int(0))),
                ),
            ),
        );
        schema.validate().unwrap();
        Arc::new(schema)
    }

    fn cell(codec: &ElementConverter, age: i64) -> (icygraph_tablet::StoredKey, Vec<u8>) {
        let element: Element = Entity::new("person", Value::Text("a".into()))
            .with_property("age", Value::Int(age))
            .into();
        let (key, _) = codec.to_keys(&element).unwrap();
        (key, codec.to_value(&element).unwrap())
    }

    #[test]
    fn invalid_elements_are_dropped() {
        let schema = guarded_schema();
        let codec = ElementConverter::new(RowLayout::ByteEntity, schema.clone());
        let config = IteratorConfig::new(RowLayout::ByteEntity, &schema).unwrap();
        let options = IteratorOptions::from([(
            CONFIG_OPTION_KEY.to_string(),
            config.encode().unwrap(),
        )]);

        let cells = vec![cell(&codec, 30), cell(&codec, -1)];
        let out: Vec<_> = ValidationIterator
            .build(&options, Box::new(cells.into_iter()))
            .unwrap()
            .collect();

        assert_eq!(out.len(), 1);
        let survivor = codec.from_key_value(&out[0].0, &out[0].1, false).unwrap();
        assert_eq!(survivor.properties().get("age"), Some(&Value::Int(30)));
    }

    #[test]
    fn corrupt_cells_are_dropped_not_fatal() {
        let schema = guarded_schema();
        let codec = ElementConverter::new(RowLayout::ByteEntity, schema.clone());
        let config = IteratorConfig::new(RowLayout::ByteEntity, &schema).unwrap();
        let options = IteratorOptions::from([(
            CONFIG_OPTION_KEY.to_string(),
            config.encode().unwrap(),
        )]);

        let (key, mut value) = cell(&codec, 30);
        value.truncate(2);
        let out: Vec<_> = ValidationIterator
            .build(&options, Box::new(std::iter::once((key, value))))
            .unwrap()
            .collect();
        assert!(out.is_empty());
    }
}
