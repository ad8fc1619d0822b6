use handling_schema::{FieldKind, FieldSchema, FieldValue, Vec3};

use crate::error::EditError;

/// Parse user-typed text into a value of the field's kind.
///
/// Vectors accept three components separated by commas and/or whitespace.
/// The result is not range checked.
pub fn parse_field_input(
    schema: &FieldSchema,
    field: &str,
    text: &str,
) -> Result<FieldValue, EditError> {
    let descriptor = schema
        .lookup(field)
        .ok_or_else(|| EditError::UnknownField(field.to_string()))?;
    let invalid = || EditError::InvalidValue {
        field: field.to_string(),
        expected: descriptor.kind,
        found: format!("'{}'", text.trim()),
    };

    let trimmed = text.trim();
    match descriptor.kind {
        FieldKind::Int32 => trimmed
            .parse::<i32>()
            .map(FieldValue::Int)
            .map_err(|_| invalid()),
        FieldKind::Float32 => parse_f32(trimmed).map(FieldValue::Float).ok_or_else(invalid),
        FieldKind::Vector3 => {
            let parts: Vec<&str> = trimmed
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .collect();
            let [x, y, z] = parts.as_slice() else {
                return Err(invalid());
            };
            match (parse_f32(x), parse_f32(y), parse_f32(z)) {
                (Some(x), Some(y), Some(z)) => Ok(FieldValue::Vector(Vec3::new(x, y, z))),
                _ => Err(invalid()),
            }
        }
        FieldKind::String => Err(invalid()),
    }
}

fn parse_f32(value: &str) -> Option<f32> {
    value.parse::<f32>().ok().filter(|value| value.is_finite())
}
