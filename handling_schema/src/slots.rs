//! Naming convention for persisted companion slots.
//!
//! Every numeric field owns a primary slot holding its override and a `_def`
//! slot holding the recorded default. Vector fields get one pair per
//! component. The separator is internal to this crate; nothing outside should
//! parse slot names.

use crate::descriptor::FieldDescriptor;
use crate::value::{kind_for_name, Axis, FieldKind};

const COMPONENT_SEPARATOR: &str = "_";
const DEFAULT_SUFFIX: &str = "_def";

/// Primary/default slot names for one scalar or one vector component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPair {
    pub primary: String,
    pub default: String,
    pub component: Option<Axis>,
}

impl SlotPair {
    fn new(primary: String, component: Option<Axis>) -> Self {
        let default = format!("{primary}{DEFAULT_SUFFIX}");
        Self {
            primary,
            default,
            component,
        }
    }
}

/// Slot pairs for a field. String fields have none.
pub fn slot_pairs(descriptor: &FieldDescriptor) -> Vec<SlotPair> {
    match descriptor.kind {
        FieldKind::Int32 | FieldKind::Float32 => {
            vec![SlotPair::new(descriptor.name.clone(), None)]
        }
        FieldKind::Vector3 => Axis::ALL
            .into_iter()
            .map(|axis| {
                SlotPair::new(
                    format!("{}{COMPONENT_SEPARATOR}{}", descriptor.name, axis.suffix()),
                    Some(axis),
                )
            })
            .collect(),
        FieldKind::String => Vec::new(),
    }
}

/// Kind of the scalar stored in a slot, inferred from the slot's name.
///
/// Vector component slots hold floats.
pub fn slot_value_kind(slot: &str) -> FieldKind {
    match kind_for_name(slot) {
        FieldKind::Vector3 => FieldKind::Float32,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Vec3;

    #[test]
    fn scalar_field_has_single_pair() {
        let mass = FieldDescriptor::float("fMass", "CHandlingData", 0.0, 1.0);
        let pairs = slot_pairs(&mass);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].primary, "fMass");
        assert_eq!(pairs[0].default, "fMass_def");
        assert_eq!(pairs[0].component, None);
    }

    #[test]
    fn vector_field_has_pair_per_component() {
        let offset = FieldDescriptor::vector(
            "vecCentreOfMassOffset",
            "CHandlingData",
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, 1.0, 1.0),
        );
        let pairs = slot_pairs(&offset);
        let names: Vec<_> = pairs.iter().map(|p| p.default.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "vecCentreOfMassOffset_x_def",
                "vecCentreOfMassOffset_y_def",
                "vecCentreOfMassOffset_z_def"
            ]
        );
        for pair in &pairs {
            assert_eq!(slot_value_kind(&pair.primary), FieldKind::Float32);
        }
    }

    #[test]
    fn string_field_has_no_slots() {
        let flags = FieldDescriptor::string("strHandlingFlags", "CHandlingData");
        assert!(slot_pairs(&flags).is_empty());
    }

    #[test]
    fn int_slot_kind_is_int() {
        assert_eq!(slot_value_kind("nInitialDriveGears_def"), FieldKind::Int32);
    }
}
