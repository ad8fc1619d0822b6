use handling_schema::{Axis, FieldBounds, FieldDescriptor, FieldSchema, FieldValue};

use crate::error::{Bound, BoundViolation, EditError};

/// Check a proposed value against the schema before anything is written.
///
/// Bounds are inclusive and compared exactly; the float tolerance only applies
/// to equality, never to range checks.
pub fn validate_edit(
    schema: &FieldSchema,
    field: &str,
    proposed: FieldValue,
) -> Result<FieldValue, EditError> {
    let descriptor = schema
        .lookup(field)
        .ok_or_else(|| EditError::UnknownField(field.to_string()))?;
    check_value(descriptor, proposed)
}

pub(crate) fn check_value(
    descriptor: &FieldDescriptor,
    proposed: FieldValue,
) -> Result<FieldValue, EditError> {
    let invalid = |found: String| EditError::InvalidValue {
        field: descriptor.name.clone(),
        expected: descriptor.kind,
        found,
    };

    if proposed.kind() != descriptor.kind {
        return Err(invalid(proposed.kind().to_string()));
    }
    if !is_finite(&proposed) {
        return Err(invalid(format!("non-finite {proposed}")));
    }
    let Some(bounds) = descriptor.bounds else {
        return Err(invalid(proposed.kind().to_string()));
    };

    match range_violation(&bounds, &proposed) {
        Some(violated) => Err(EditError::OutOfRange {
            field: descriptor.name.clone(),
            value: proposed,
            min: bounds.min(),
            max: bounds.max(),
            violated,
        }),
        None => Ok(proposed),
    }
}

/// First bound `value` falls outside of, if any.
pub(crate) fn range_violation(bounds: &FieldBounds, value: &FieldValue) -> Option<BoundViolation> {
    let scalar = |value: f64, min: f64, max: f64| {
        if value < min {
            Some(Bound::Min)
        } else if value > max {
            Some(Bound::Max)
        } else {
            None
        }
    };

    match (bounds, value) {
        (FieldBounds::Int { min, max }, FieldValue::Int(value)) => {
            scalar(*value as f64, *min as f64, *max as f64).map(|bound| BoundViolation {
                bound,
                component: None,
            })
        }
        (FieldBounds::Float { min, max }, FieldValue::Float(value)) => {
            scalar(*value as f64, *min as f64, *max as f64).map(|bound| BoundViolation {
                bound,
                component: None,
            })
        }
        (FieldBounds::Vector { min, max }, FieldValue::Vector(value)) => {
            Axis::ALL.into_iter().find_map(|axis| {
                scalar(
                    value.component(axis) as f64,
                    min.component(axis) as f64,
                    max.component(axis) as f64,
                )
                .map(|bound| BoundViolation {
                    bound,
                    component: Some(axis),
                })
            })
        }
        _ => None,
    }
}

fn is_finite(value: &FieldValue) -> bool {
    match value {
        FieldValue::Int(_) => true,
        FieldValue::Float(value) => value.is_finite(),
        FieldValue::Vector(value) => Axis::ALL
            .into_iter()
            .all(|axis| value.component(axis).is_finite()),
    }
}
