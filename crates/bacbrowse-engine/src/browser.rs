//! Object enumeration and property reads against one device.

use core::fmt;
use std::str::FromStr;

use bacbrowse_client::{BacnetClient, ReadAccessResult};
use bacbrowse_core::types::{DataValue, ObjectId, PropertyId};
use bacbrowse_datalink::{DataLink, DataLinkAddress};
use serde::Serialize;

use crate::decoder::{self, Property};
use crate::BrowseError;

/// Largest object type number an object identifier can carry.
const MAX_OBJECT_TYPE: u16 = 0x03FF;

/// `"<type>:<instance>"` with the numeric object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub object_type: u16,
    pub instance: u32,
}

impl ObjectKey {
    pub fn object_id(self) -> ObjectId {
        ObjectId::from_parts(self.object_type, self.instance)
    }
}

impl From<ObjectId> for ObjectKey {
    fn from(id: ObjectId) -> Self {
        Self {
            object_type: id.type_number(),
            instance: id.instance(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.instance)
    }
}

impl FromStr for ObjectKey {
    type Err = BrowseError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let invalid = || BrowseError::InvalidObjectKey(key.to_string());
        let (object_type, instance) = key.split_once(':').ok_or_else(invalid)?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(object_type) || !digits(instance) {
            return Err(invalid());
        }
        let object_type: u16 = object_type.parse().map_err(|_| invalid())?;
        let instance: u32 = instance.parse().map_err(|_| invalid())?;
        if object_type > MAX_OBJECT_TYPE || instance > ObjectId::MAX_INSTANCE {
            return Err(invalid());
        }
        Ok(Self {
            object_type,
            instance,
        })
    }
}

/// Summary row for one object of a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacnetObject {
    pub key: String,
    #[serde(rename = "type")]
    pub object_type: u16,
    pub instance: u32,
    pub name: String,
    pub description: String,
    pub present_value: Option<DataValue>,
}

impl BacnetObject {
    /// Entry for an object whose read failed.
    pub fn placeholder(id: ObjectId) -> Self {
        Self {
            key: ObjectKey::from(id).to_string(),
            object_type: id.type_number(),
            instance: id.instance(),
            name: String::new(),
            description: String::new(),
            present_value: None,
        }
    }

    pub fn from_read(id: ObjectId, read: &ReadAccessResult) -> Self {
        let text = |property| {
            read.values_of(property)
                .and_then(<[DataValue]>::first)
                .and_then(DataValue::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };
        Self {
            name: text(PropertyId::ObjectName),
            description: text(PropertyId::Description),
            present_value: read
                .values_of(PropertyId::PresentValue)
                .and_then(<[DataValue]>::first)
                .cloned(),
            ..Self::placeholder(id)
        }
    }
}

/// Object references from a device's object-list read, in list order.
fn object_references(listing: &ReadAccessResult) -> Result<Vec<ObjectId>, BrowseError> {
    let entry = listing
        .results
        .iter()
        .find(|r| r.property_id == PropertyId::ObjectList)
        .ok_or_else(|| BrowseError::MalformedResponse("object-list missing from response".into()))?;
    match &entry.value {
        Ok(values) => Ok(values.iter().filter_map(DataValue::as_object_id).collect()),
        Err(err) => Err(BrowseError::MalformedResponse(format!(
            "object-list unreadable (class {}, code {})",
            err.error_class, err.error_code
        ))),
    }
}

/// Reads the device's object-list, then every listed object one after the
/// other. Only the object-list read can fail the whole call; a failed object
/// read becomes a placeholder entry.
pub async fn list_objects<L: DataLink + 'static>(
    client: &BacnetClient<L>,
    address: DataLinkAddress,
) -> Result<Vec<BacnetObject>, BrowseError> {
    let listing = client
        .read_properties(address, ObjectId::device_wildcard(), &[PropertyId::ObjectList])
        .await?;
    let references = object_references(&listing)?;
    log::debug!("{address} lists {} objects", references.len());

    let mut objects = Vec::with_capacity(references.len());
    for id in references {
        let entry = match client.read_properties(address, id, &[PropertyId::All]).await {
            Ok(read) => BacnetObject::from_read(id, &read),
            Err(err) => {
                log::warn!("reading {id} on {address} failed: {err}");
                BacnetObject::placeholder(id)
            }
        };
        objects.push(entry);
    }
    Ok(objects)
}

/// Reads property `all` of one object and decodes it.
pub async fn object_properties<L: DataLink + 'static>(
    client: &BacnetClient<L>,
    address: DataLinkAddress,
    object: ObjectKey,
) -> Result<Vec<Property>, BrowseError> {
    let read = client
        .read_properties(address, object.object_id(), &[PropertyId::All])
        .await?;
    Ok(decoder::decode(&read.results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bacbrowse_client::{PropertyAccessError, ReadResult};
    use bacbrowse_core::types::ObjectType;
    use proptest::prelude::*;

    fn read(id: ObjectId, values: Vec<(PropertyId, DataValue)>) -> ReadAccessResult {
        ReadAccessResult {
            object_id: id,
            results: values
                .into_iter()
                .map(|(property_id, value)| ReadResult {
                    property_id,
                    array_index: None,
                    value: Ok(vec![value]),
                })
                .collect(),
        }
    }

    #[test]
    fn object_key_parses_and_rejects() {
        assert_eq!(
            "0:1".parse::<ObjectKey>().unwrap(),
            ObjectKey {
                object_type: 0,
                instance: 1
            }
        );
        for bad in ["", "1", ":", "a:1", "1:b", "1:2:3", "+1:2", "1024:0", "0:4194304", " 1:2"] {
            assert!(
                matches!(bad.parse::<ObjectKey>(), Err(BrowseError::InvalidObjectKey(k)) if k == bad),
                "{bad:?} should be rejected"
            );
        }
    }

    proptest! {
        #[test]
        fn object_key_round_trips(object_type in 0u16..=1023, instance in 0u32..=ObjectId::MAX_INSTANCE) {
            let id = ObjectId::from_parts(object_type, instance);
            let key = ObjectKey::from(id).to_string();
            let parsed: ObjectKey = key.parse().unwrap();
            prop_assert_eq!(parsed.to_string(), key);
            prop_assert_eq!(parsed.object_id(), id);
        }
    }

    #[test]
    fn summary_takes_first_values_and_defaults_missing_fields() {
        let id = ObjectId::new(ObjectType::AnalogValue, 3);
        let summary = BacnetObject::from_read(
            id,
            &read(
                id,
                vec![
                    (PropertyId::ObjectName, DataValue::CharacterString("SP".into())),
                    (PropertyId::PresentValue, DataValue::Real(20.0)),
                ],
            ),
        );
        assert_eq!(summary.key, "2:3");
        assert_eq!(summary.name, "SP");
        assert_eq!(summary.description, "");
        assert_eq!(summary.present_value, Some(DataValue::Real(20.0)));
    }

    #[test]
    fn placeholder_serializes_null_value() {
        let json = serde_json::to_value(BacnetObject::placeholder(ObjectId::new(
            ObjectType::BinaryInput,
            7,
        )))
        .unwrap();
        assert_eq!(json["key"], "3:7");
        assert_eq!(json["type"], 3);
        assert!(json["presentValue"].is_null());
    }

    #[test]
    fn object_list_errors_are_malformed() {
        let device = ObjectId::new(ObjectType::Device, 1);
        let missing = read(device, vec![]);
        assert!(matches!(
            object_references(&missing),
            Err(BrowseError::MalformedResponse(_))
        ));

        let denied = ReadAccessResult {
            object_id: device,
            results: vec![ReadResult {
                property_id: PropertyId::ObjectList,
                array_index: None,
                value: Err(PropertyAccessError {
                    error_class: 2,
                    error_code: 32,
                }),
            }],
        };
        assert!(matches!(
            object_references(&denied),
            Err(BrowseError::MalformedResponse(_))
        ));

        let listed = ReadAccessResult {
            object_id: device,
            results: vec![ReadResult {
                property_id: PropertyId::ObjectList,
                array_index: None,
                value: Ok(vec![
                    DataValue::ObjectId(device),
                    DataValue::Null,
                    DataValue::ObjectId(ObjectId::new(ObjectType::AnalogInput, 0)),
                ]),
            }],
        };
        assert_eq!(object_references(&listed).unwrap().len(), 2);
    }
}
