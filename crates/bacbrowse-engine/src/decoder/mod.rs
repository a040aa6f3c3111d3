//! Turns ReadPropertyMultiple results into named, display-ready properties.

mod names;

use core::fmt;

use bacbrowse_client::ReadResult;
use bacbrowse_core::types::DataValue;
use serde::Serialize;

use names::PROPERTY_NAMES;

/// Properties that hold one value even when a device wraps it in a list.
const SCALAR_PROPERTIES: &[u32] = &[
    28,  // description
    36,  // event-state
    44,  // firmware-revision
    58,  // location
    70,  // model-name
    75,  // object-identifier
    77,  // object-name
    79,  // object-type
    81,  // out-of-service
    85,  // present-value
    103, // reliability
    111, // status-flags
    117, // units
    120, // vendor-identifier
    121, // vendor-name
];

/// Properties that are lists even when only one element is present.
const LIST_PROPERTIES: &[u32] = &[
    2,   // action
    3,   // action-text
    7,   // alarm-values
    23,  // date-list
    30,  // device-address-binding
    38,  // exception-schedule
    39,  // fault-values
    53,  // list-of-group-members
    54,  // list-of-object-property-references
    76,  // object-list
    87,  // priority-array
    102, // recipient-list
    110, // state-text
    116, // time-synchronization-recipients
    123, // weekly-schedule
    130, // event-time-stamps
    131, // log-buffer
    152, // active-cov-subscriptions
    154, // configuration-files
    159, // member-of
    165, // zone-members
    209, // structured-object-list
    211, // subordinate-list
    351, // event-message-texts
    371, // property-list
    486, // tags
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Single(DataValue),
    List(Vec<DataValue>),
}

impl PropertyValue {
    pub fn first(&self) -> Option<&DataValue> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(values) => values.first(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(value) => write!(f, "{value}"),
            Self::List(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: u32,
    pub name: String,
    pub value: PropertyValue,
}

/// Standard name of a property identifier, if it has one.
pub fn property_name(id: u32) -> Option<&'static str> {
    PROPERTY_NAMES
        .binary_search_by_key(&id, |(n, _)| *n)
        .ok()
        .map(|i| PROPERTY_NAMES[i].1)
}

pub fn display_name(id: u32) -> String {
    match property_name(id) {
        Some(name) => name.to_string(),
        None => format!("Vendor Specific Property {id}"),
    }
}

fn shape(id: u32, mut values: Vec<DataValue>) -> Option<PropertyValue> {
    if values.is_empty() {
        return None;
    }
    let single = if SCALAR_PROPERTIES.contains(&id) {
        true
    } else if LIST_PROPERTIES.contains(&id) {
        false
    } else {
        values.len() == 1
    };
    Some(if single {
        PropertyValue::Single(values.swap_remove(0))
    } else {
        PropertyValue::List(values)
    })
}

/// Decodes every successfully read, non-empty property in response order.
pub fn decode(results: &[ReadResult]) -> Vec<Property> {
    results
        .iter()
        .filter_map(|result| {
            let values = result.value.as_ref().ok()?;
            let id = result.property_id.number();
            Some(Property {
                id,
                name: display_name(id),
                value: shape(id, values.clone())?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bacbrowse_client::PropertyAccessError;
    use bacbrowse_core::types::{ObjectId, ObjectType, PropertyId};

    fn ok(id: u32, values: Vec<DataValue>) -> ReadResult {
        ReadResult {
            property_id: PropertyId::from_number(id),
            array_index: None,
            value: Ok(values),
        }
    }

    #[test]
    fn name_table_is_sorted_and_resolves_standard_ids() {
        assert!(PROPERTY_NAMES.windows(2).all(|w| w[0].0 < w[1].0));
        assert_eq!(property_name(77), Some("object-name"));
        assert_eq!(property_name(85), Some("present-value"));
        assert_eq!(property_name(371), Some("property-list"));
        assert_eq!(property_name(18), None);
    }

    #[test]
    fn unknown_ids_get_vendor_label() {
        assert_eq!(display_name(5012), "Vendor Specific Property 5012");
        assert_eq!(display_name(28), "description");
    }

    #[test]
    fn scalar_list_and_heuristic_shapes() {
        let oid = |i| DataValue::ObjectId(ObjectId::new(ObjectType::AnalogInput, i));
        let decoded = decode(&[
            ok(77, vec![DataValue::CharacterString("AHU-1".into())]),
            ok(76, vec![oid(1)]),
            ok(85, vec![DataValue::Real(1.0), DataValue::Real(2.0)]),
            ok(600, vec![DataValue::Unsigned(3)]),
            ok(601, vec![DataValue::Unsigned(3), DataValue::Unsigned(4)]),
        ]);
        assert_eq!(
            decoded.iter().map(|p| &p.value).collect::<Vec<_>>(),
            vec![
                &PropertyValue::Single(DataValue::CharacterString("AHU-1".into())),
                &PropertyValue::List(vec![oid(1)]),
                &PropertyValue::Single(DataValue::Real(1.0)),
                &PropertyValue::Single(DataValue::Unsigned(3)),
                &PropertyValue::List(vec![DataValue::Unsigned(3), DataValue::Unsigned(4)]),
            ]
        );
        assert_eq!(decoded[3].name, "Vendor Specific Property 600");
        assert_eq!(decoded[4].value.to_string(), "[3, 4]");
        assert_eq!(decoded[0].value.to_string(), "AHU-1");
    }

    #[test]
    fn errors_and_empty_values_are_skipped() {
        let decoded = decode(&[
            ReadResult {
                property_id: PropertyId::Description,
                array_index: None,
                value: Err(PropertyAccessError {
                    error_class: 2,
                    error_code: 32,
                }),
            },
            ok(87, vec![]),
            ok(79, vec![DataValue::Enumerated(8)]),
        ]);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, 79);
        assert_eq!(decoded[0].name, "object-type");
    }

    #[test]
    fn serializes_single_values_flat() {
        let property = Property {
            id: 85,
            name: display_name(85),
            value: PropertyValue::Single(DataValue::Real(21.5)),
        };
        let json = serde_json::to_value(&property).unwrap();
        assert_eq!(json["name"], "present-value");
        assert_eq!(json["value"]["kind"], "Real");
        assert_eq!(json["value"]["value"], 21.5);
    }
}
