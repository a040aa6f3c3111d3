//! Simulated BACnet device.
//!
//! [`SimulatedDevice`] answers Who-Is and ReadPropertyMultiple (including
//! reads of property `all`) from an in-memory object table. Objects can be
//! muted so that reads against them go unanswered, which is how tests
//! provoke client timeouts.

use std::collections::HashSet;

use bacbrowse_core::apdu::{
    max_apdu_octets, AbortPdu, ApduType, ComplexAckHeader, ConfirmedRequestHeader, ErrorPdu,
    UnconfirmedRequestHeader,
};
use bacbrowse_core::encoding::{reader::Reader, writer::Writer};
use bacbrowse_core::npdu::Npdu;
use bacbrowse_core::services::i_am::{segmentation, IAmRequest};
use bacbrowse_core::services::read_property_multiple::{
    PropertyAccessError, ReadAccessResult, ReadAccessSpec, ReadPropertyMultipleAck,
    ReadPropertyMultipleRequest, ReadResult, SERVICE_READ_PROPERTY_MULTIPLE,
};
use bacbrowse_core::services::who_is::{WhoIsRequest, SERVICE_WHO_IS};
use bacbrowse_core::types::{DataValue, ObjectId, ObjectType, PropertyId};
use bacbrowse_datalink::{DataLink, DataLinkAddress};
use tokio::sync::RwLock;

use crate::dispatch::MAX_NPDU_LEN;
use crate::ClientError;

const SIM_MAX_APDU: u32 = 1476;
const SIM_VENDOR_ID: u32 = 999;

const ERROR_CLASS_OBJECT: u32 = 1;
const ERROR_CLASS_PROPERTY: u32 = 2;
const ERROR_CODE_UNKNOWN_OBJECT: u32 = 31;
const ERROR_CODE_UNKNOWN_PROPERTY: u32 = 32;
const ABORT_SEGMENTATION_NOT_SUPPORTED: u8 = 4;

/// Complex-ack header size of a segmented response.
const SEGMENT_HEADER_LEN: usize = 5;

struct SimObject {
    id: ObjectId,
    properties: Vec<(PropertyId, Vec<DataValue>)>,
}

impl SimObject {
    fn new(id: ObjectId) -> Self {
        Self {
            id,
            properties: vec![
                (PropertyId::ObjectIdentifier, vec![DataValue::ObjectId(id)]),
                (
                    PropertyId::ObjectType,
                    vec![DataValue::Enumerated(u32::from(id.type_number()))],
                ),
            ],
        }
    }

    fn set(&mut self, property: PropertyId, values: Vec<DataValue>) {
        match self.properties.iter_mut().find(|(p, _)| *p == property) {
            Some((_, existing)) => *existing = values,
            None => self.properties.push((property, values)),
        }
    }

    fn get(&self, property: PropertyId) -> Option<&[DataValue]> {
        self.properties
            .iter()
            .find(|(p, _)| *p == property)
            .map(|(_, v)| v.as_slice())
    }
}

/// A simulated BACnet device bound to a data link.
pub struct SimulatedDevice<D: DataLink> {
    pub device_id: ObjectId,
    vendor_id: u32,
    datalink: D,
    objects: RwLock<Vec<SimObject>>,
    muted: RwLock<HashSet<ObjectId>>,
}

impl<D: DataLink> SimulatedDevice<D> {
    /// Creates a device object with a default name; further objects are
    /// listed in its object-list in the order they are added.
    pub fn new(instance: u32, datalink: D) -> Self {
        let device_id = ObjectId::new(ObjectType::Device, instance);
        let mut device = SimObject::new(device_id);
        device.set(
            PropertyId::ObjectName,
            vec![DataValue::CharacterString(format!("SimDevice-{instance}"))],
        );
        device.set(
            PropertyId::VendorName,
            vec![DataValue::CharacterString("bacbrowse".into())],
        );
        Self {
            device_id,
            vendor_id: SIM_VENDOR_ID,
            datalink,
            objects: RwLock::new(vec![device]),
            muted: RwLock::new(HashSet::new()),
        }
    }

    pub fn datalink(&self) -> &D {
        &self.datalink
    }

    /// Adds (or replaces) an object. Object-identifier and object-type are
    /// filled in automatically.
    pub async fn add_object(&self, id: ObjectId, properties: Vec<(PropertyId, DataValue)>) {
        let mut object = SimObject::new(id);
        for (property, value) in properties {
            object.set(property, vec![value]);
        }
        let mut objects = self.objects.write().await;
        match objects.iter_mut().find(|o| o.id == id) {
            Some(existing) => *existing = object,
            None => objects.push(object),
        }
    }

    pub async fn set_property(&self, object: ObjectId, property: PropertyId, value: DataValue) {
        self.set_property_values(object, property, vec![value]).await;
    }

    /// Sets a multi-valued property. Ignored when the object does not exist.
    pub async fn set_property_values(
        &self,
        object: ObjectId,
        property: PropertyId,
        values: Vec<DataValue>,
    ) {
        if let Some(o) = self.objects.write().await.iter_mut().find(|o| o.id == object) {
            o.set(property, values);
        }
    }

    /// Requests that touch a muted object receive no reply at all.
    pub async fn mute_object(&self, object: ObjectId) {
        self.muted.write().await.insert(object);
    }

    /// Sends an unsolicited I-Am to `target`.
    pub async fn announce(&self, target: DataLinkAddress) -> Result<(), ClientError> {
        let mut w = Writer::new();
        Npdu::local(false).encode(&mut w);
        IAmRequest {
            device_id: self.device_id,
            max_apdu: SIM_MAX_APDU,
            segmentation: segmentation::TRANSMIT,
            vendor_id: self.vendor_id,
        }
        .encode(&mut w);
        self.datalink.send(target, w.as_written()).await?;
        Ok(())
    }

    /// Serves requests until the data link fails.
    pub async fn run(&self) -> Result<(), ClientError> {
        let mut buf = vec![0u8; MAX_NPDU_LEN];
        loop {
            let (n, source) = self.datalink.recv(&mut buf).await?;
            if let Err(e) = self.handle_frame(&buf[..n], source).await {
                log::debug!("simulator: error handling frame from {source}: {e}");
            }
        }
    }

    async fn handle_frame(&self, frame: &[u8], source: DataLinkAddress) -> Result<(), ClientError> {
        let mut r = Reader::new(frame);
        let npdu = Npdu::decode(&mut r)?;
        if npdu.is_network_message() {
            return Ok(());
        }

        match ApduType::of(r.rest()) {
            Some(ApduType::UnconfirmedRequest) => {
                let header = UnconfirmedRequestHeader::decode(&mut r)?;
                if header.service_choice == SERVICE_WHO_IS {
                    let who_is = WhoIsRequest::decode_after_header(&mut r)?;
                    if who_is.matches(self.device_id.instance()) {
                        self.announce(source).await?;
                    }
                }
            }
            Some(ApduType::ConfirmedRequest) => {
                let header = ConfirmedRequestHeader::decode(&mut r)?;
                if header.service_choice == SERVICE_READ_PROPERTY_MULTIPLE {
                    let specs = ReadPropertyMultipleRequest::decode_after_header(&mut r)?;
                    self.handle_read_property_multiple(header, specs, source)
                        .await?;
                }
            }
            // Segment-ACKs for our responses need no action; segments go out
            // back to back.
            _ => {}
        }
        Ok(())
    }

    async fn handle_read_property_multiple(
        &self,
        header: ConfirmedRequestHeader,
        specs: Vec<ReadAccessSpec>,
        source: DataLinkAddress,
    ) -> Result<(), ClientError> {
        let response = {
            let objects = self.objects.read().await;
            let muted = self.muted.read().await;
            let mut results = Vec::with_capacity(specs.len());
            let mut unknown = false;
            for spec in &specs {
                let id = self.resolve(spec.object_id);
                if muted.contains(&id) {
                    log::debug!("simulator: {id} is muted, not answering");
                    return Ok(());
                }
                match objects.iter().find(|o| o.id == id) {
                    Some(object) => results.push(self.read_object(&objects, object, spec)),
                    None => {
                        unknown = true;
                        break;
                    }
                }
            }
            if unknown {
                None
            } else {
                Some(ReadPropertyMultipleAck { results })
            }
        };

        let Some(ack) = response else {
            let mut w = Writer::new();
            Npdu::local(false).encode(&mut w);
            ErrorPdu {
                invoke_id: header.invoke_id,
                service_choice: SERVICE_READ_PROPERTY_MULTIPLE,
                error_class: Some(ERROR_CLASS_OBJECT),
                error_code: Some(ERROR_CODE_UNKNOWN_OBJECT),
            }
            .encode(&mut w);
            self.datalink.send(source, w.as_written()).await?;
            return Ok(());
        };

        let mut body = Writer::new();
        ack.encode_after_header(&mut body)?;
        self.send_complex_ack(header, body.as_written(), source).await
    }

    fn resolve(&self, id: ObjectId) -> ObjectId {
        if id == ObjectId::device_wildcard() {
            self.device_id
        } else {
            id
        }
    }

    fn read_object(
        &self,
        objects: &[SimObject],
        object: &SimObject,
        spec: &ReadAccessSpec,
    ) -> ReadAccessResult {
        let object_list = || -> Vec<DataValue> {
            objects.iter().map(|o| DataValue::ObjectId(o.id)).collect()
        };
        let is_device = object.id == self.device_id;

        let mut results = Vec::new();
        for reference in &spec.properties {
            match reference.property_id {
                PropertyId::All => {
                    for (property_id, values) in &object.properties {
                        results.push(ReadResult {
                            property_id: *property_id,
                            array_index: None,
                            value: Ok(values.clone()),
                        });
                    }
                    if is_device && object.get(PropertyId::ObjectList).is_none() {
                        results.push(ReadResult {
                            property_id: PropertyId::ObjectList,
                            array_index: None,
                            value: Ok(object_list()),
                        });
                    }
                }
                PropertyId::ObjectList if is_device => results.push(ReadResult {
                    property_id: PropertyId::ObjectList,
                    array_index: reference.array_index,
                    value: Ok(object
                        .get(PropertyId::ObjectList)
                        .map(<[DataValue]>::to_vec)
                        .unwrap_or_else(object_list)),
                }),
                property_id => results.push(ReadResult {
                    property_id,
                    array_index: reference.array_index,
                    value: object.get(property_id).map(<[DataValue]>::to_vec).ok_or(
                        PropertyAccessError {
                            error_class: ERROR_CLASS_PROPERTY,
                            error_code: ERROR_CODE_UNKNOWN_PROPERTY,
                        },
                    ),
                }),
            }
        }
        ReadAccessResult {
            object_id: object.id,
            results,
        }
    }

    async fn send_complex_ack(
        &self,
        request: ConfirmedRequestHeader,
        body: &[u8],
        target: DataLinkAddress,
    ) -> Result<(), ClientError> {
        let max_apdu = max_apdu_octets(request.max_apdu).min(SIM_MAX_APDU as usize);
        let unsegmented = ComplexAckHeader::unsegmented(request.invoke_id, SERVICE_READ_PROPERTY_MULTIPLE);

        if body.len() + 3 <= max_apdu {
            let mut w = Writer::new();
            Npdu::local(false).encode(&mut w);
            unsegmented.encode(&mut w);
            w.write_all(body);
            self.datalink.send(target, w.as_written()).await?;
            return Ok(());
        }

        let chunk_len = max_apdu - SEGMENT_HEADER_LEN;
        let chunk_count = body.len().div_ceil(chunk_len);
        if !request.segmented_response_accepted || chunk_count > usize::from(u8::MAX) {
            let mut w = Writer::new();
            Npdu::local(false).encode(&mut w);
            AbortPdu {
                server: true,
                invoke_id: request.invoke_id,
                reason: ABORT_SEGMENTATION_NOT_SUPPORTED,
            }
            .encode(&mut w);
            self.datalink.send(target, w.as_written()).await?;
            return Ok(());
        }

        for (sequence, chunk) in body.chunks(chunk_len).enumerate() {
            let mut w = Writer::new();
            Npdu::local(false).encode(&mut w);
            ComplexAckHeader {
                segmented: true,
                more_follows: sequence + 1 < chunk_count,
                sequence_number: Some(sequence as u8),
                proposed_window_size: Some(1),
                ..unsegmented
            }
            .encode(&mut w);
            w.write_all(chunk);
            self.datalink.send(target, w.as_written()).await?;
        }
        Ok(())
    }
}
