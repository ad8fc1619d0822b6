use handling_schema::{Axis, FieldValue, Vec3};

/// Absolute tolerance for every float comparison in the editor.
pub const EPSILON: f32 = 0.001;

pub fn within_epsilon(a: f32, b: f32) -> bool {
    (a - b).abs() <= EPSILON
}

pub fn vectors_equal(a: Vec3, b: Vec3) -> bool {
    Axis::ALL
        .into_iter()
        .all(|axis| within_epsilon(a.component(axis), b.component(axis)))
}

/// Kind-aware equality: exact for ints, epsilon for floats and each vector
/// component. Values of different kinds are never equal.
pub fn values_equal(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
        (FieldValue::Float(a), FieldValue::Float(b)) => within_epsilon(*a, *b),
        (FieldValue::Vector(a), FieldValue::Vector(b)) => vectors_equal(*a, *b),
        _ => false,
    }
}
