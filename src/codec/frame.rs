use super::header::ControlPacket;
use super::service_info::ServiceInformation;
use super::traits::{BusDeserialize, BusSerialize};
use super::CodecError;
use std::io::Write;

/// A complete control frame: the identity header followed by the
/// advertisement section. Record `k` describes the sender's slot `k + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFrame {
    pub header: ControlPacket,
    pub records: Vec<ServiceInformation>,
}

impl ControlFrame {
    pub fn new(header: ControlPacket) -> Self {
        ControlFrame {
            header,
            records: Vec::new(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        ControlPacket::HEADER_LENGTH + self.records.iter().map(|r| r.encoded_len()).sum::<usize>()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.serialize(&mut out)?;
        Ok(out)
    }

    /// Split a received frame into its header and a lazy record iterator.
    ///
    /// The advertisement section is everything after the header, so the
    /// declared total advertisement length is the frame length minus 12.
    pub fn parse(data: &[u8]) -> Result<(ControlPacket, ServiceInfoIter<'_>), CodecError> {
        let mut reader = data;
        let header = ControlPacket::deserialize(&mut reader)?;
        Ok((header, ServiceInfoIter::new(reader)))
    }
}

impl BusSerialize for ControlFrame {
    fn serialize<W: Write>(&self, writer: &mut W) -> Result<(), CodecError> {
        self.header.serialize(writer)?;
        for record in &self.records {
            record.serialize(writer)?;
        }
        Ok(())
    }
}

impl BusDeserialize for ControlFrame {
    /// Strict decode: any truncated record fails the whole frame.
    fn deserialize(reader: &mut &[u8]) -> Result<Self, CodecError> {
        let header = ControlPacket::deserialize(reader)?;
        let records = ServiceInfoIter::new(*reader).collect::<Result<Vec<_>, _>>()?;
        *reader = &[];
        Ok(ControlFrame { header, records })
    }
}

/// Iterates packed [`ServiceInformation`] records until the section is consumed.
///
/// After yielding an error the iterator is exhausted; records decoded before
/// the error remain valid.
#[derive(Debug, Clone)]
pub struct ServiceInfoIter<'a> {
    remaining: &'a [u8],
    failed: bool,
}

impl<'a> ServiceInfoIter<'a> {
    pub fn new(section: &'a [u8]) -> Self {
        ServiceInfoIter {
            remaining: section,
            failed: false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

impl<'a> Iterator for ServiceInfoIter<'a> {
    type Item = Result<ServiceInformation, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }
        match ServiceInformation::deserialize(&mut self.remaining) {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.failed = true;
                self.remaining = &[];
                Some(Err(e))
            }
        }
    }
}
