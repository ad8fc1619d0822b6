use crate::value::{Axis, FieldKind, FieldValue, Vec3};

/// Inclusive numeric range of a field, matching the field's kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldBounds {
    Int { min: i32, max: i32 },
    Float { min: f32, max: f32 },
    Vector { min: Vec3, max: Vec3 },
}

impl FieldBounds {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldBounds::Int { .. } => FieldKind::Int32,
            FieldBounds::Float { .. } => FieldKind::Float32,
            FieldBounds::Vector { .. } => FieldKind::Vector3,
        }
    }

    pub fn min(&self) -> FieldValue {
        match *self {
            FieldBounds::Int { min, .. } => FieldValue::Int(min),
            FieldBounds::Float { min, .. } => FieldValue::Float(min),
            FieldBounds::Vector { min, .. } => FieldValue::Vector(min),
        }
    }

    pub fn max(&self) -> FieldValue {
        match *self {
            FieldBounds::Int { max, .. } => FieldValue::Int(max),
            FieldBounds::Float { max, .. } => FieldValue::Float(max),
            FieldBounds::Vector { max, .. } => FieldValue::Vector(max),
        }
    }

    /// `min <= max`, per component for vectors.
    pub fn is_ordered(&self) -> bool {
        match *self {
            FieldBounds::Int { min, max } => min <= max,
            FieldBounds::Float { min, max } => min <= max,
            FieldBounds::Vector { min, max } => Axis::ALL
                .into_iter()
                .all(|axis| min.component(axis) <= max.component(axis)),
        }
    }
}

/// Static description of one editable handling field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub owner_class: String,
    pub kind: FieldKind,
    pub editable: bool,
    pub description: String,
    /// Present for every numeric kind, absent for strings.
    pub bounds: Option<FieldBounds>,
}

impl FieldDescriptor {
    pub fn int(
        name: impl Into<String>,
        owner_class: impl Into<String>,
        min: i32,
        max: i32,
    ) -> Self {
        Self::numeric(name, owner_class, FieldBounds::Int { min, max })
    }

    pub fn float(
        name: impl Into<String>,
        owner_class: impl Into<String>,
        min: f32,
        max: f32,
    ) -> Self {
        Self::numeric(name, owner_class, FieldBounds::Float { min, max })
    }

    pub fn vector(
        name: impl Into<String>,
        owner_class: impl Into<String>,
        min: Vec3,
        max: Vec3,
    ) -> Self {
        Self::numeric(name, owner_class, FieldBounds::Vector { min, max })
    }

    pub fn string(name: impl Into<String>, owner_class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_class: owner_class.into(),
            kind: FieldKind::String,
            editable: false,
            description: String::new(),
            bounds: None,
        }
    }

    fn numeric(
        name: impl Into<String>,
        owner_class: impl Into<String>,
        bounds: FieldBounds,
    ) -> Self {
        Self {
            name: name.into(),
            owner_class: owner_class.into(),
            kind: bounds.kind(),
            editable: true,
            description: String::new(),
            bounds: Some(bounds),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn locked(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn is_numeric(&self) -> bool {
        self.kind.is_numeric()
    }

    pub fn min(&self) -> Option<FieldValue> {
        self.bounds.as_ref().map(FieldBounds::min)
    }

    pub fn max(&self) -> Option<FieldValue> {
        self.bounds.as_ref().map(FieldBounds::max)
    }
}
