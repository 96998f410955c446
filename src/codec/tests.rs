#[cfg(test)]
mod tests {
    use crate::codec::frame::ControlFrame;
    use crate::codec::header::{ControlPacket, PacketType};
    use crate::codec::service_info::ServiceInformation;
    use crate::codec::traits::{BusDeserialize, BusSerialize};
    use crate::codec::CodecError;

    #[test]
    fn test_hello_header_layout() {
        let hello = ControlPacket::hello(5, 0x00FF, 0x1234, 42);
        let bytes = hello.to_bytes();

        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes[0], 0x01); // HELLO
        assert_eq!(bytes[1], 5);
        assert_eq!(bytes[2..4], [0xFF, 0x00]);
        assert_eq!(bytes[4..8], [0x34, 0x12, 0x00, 0x00]);
        assert_eq!(bytes[8..12], [42, 0, 0, 0]);
    }

    #[test]
    fn test_hello_header_deserialize() {
        let bytes = [0x01, 9, 0x03, 0x80, 0xEF, 0xBE, 0xAD, 0xDE, 0x01, 0x00, 0x00, 0x00];
        let mut reader = &bytes[..];
        let hello = ControlPacket::deserialize(&mut reader).unwrap();

        assert!(hello.is_hello());
        assert_eq!(hello.address, 9);
        assert_eq!(hello.flags, 0x8003);
        assert_eq!(hello.session_flags(), 0x03);
        assert_eq!(hello.driver_class, 0xDEADBEEF);
        assert_eq!(hello.serial_number, 1);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_unknown_packet_type() {
        let mut bytes = ControlPacket::hello(1, 0, 0, 0).to_bytes();
        bytes[0] = 0x7E;
        let hello = ControlPacket::deserialize(&mut &bytes[..]).unwrap();
        assert_eq!(hello.packet_type, PacketType::Unknown(0x7E));
        assert!(!hello.is_hello());
    }

    #[test]
    fn test_short_header() {
        let bytes = [0x01, 5, 0, 0];
        let result = ControlPacket::deserialize(&mut &bytes[..]);
        assert!(matches!(result, Err(CodecError::TruncatedHeader)));
    }

    #[test]
    fn test_service_information_round_trip() {
        let info = ServiceInformation::new(0xAABBCCDD, 0x01, &[0x10, 0x20, 0x30]).unwrap();
        let mut buf = Vec::new();
        info.serialize(&mut buf).unwrap();

        assert_eq!(buf, vec![0xDD, 0xCC, 0xBB, 0xAA, 0x01, 3, 0x10, 0x20, 0x30]);

        let mut reader = &buf[..];
        let decoded = ServiceInformation::deserialize(&mut reader).unwrap();
        assert_eq!(decoded.service_class, 0xAABBCCDD);
        assert_eq!(decoded.service_flags, 0x01);
        assert_eq!(decoded.payload(), &[0x10, 0x20, 0x30]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_service_information_truncated_payload() {
        let info = ServiceInformation::new(0xAABBCCDD, 0x01, &[0x10, 0x20, 0x30]).unwrap();
        let mut buf = Vec::new();
        info.serialize(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);

        match ServiceInformation::deserialize(&mut &buf[..]) {
            Err(CodecError::TruncatedRecord { declared, available }) => {
                assert_eq!(declared, 3);
                assert_eq!(available, 2);
            }
            other => panic!("Expected TruncatedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_service_information_payload_limit() {
        assert!(ServiceInformation::new(1, 0, &[0u8; 16]).is_ok());
        let result = ServiceInformation::new(1, 0, &[0u8; 17]);
        assert!(matches!(result, Err(CodecError::PayloadTooLarge { len: 17 })));
    }

    #[test]
    fn test_oversized_declared_size_rejected() {
        let buf = [1, 0, 0, 0, 0, 40];
        let result = ServiceInformation::deserialize(&mut &buf[..]);
        assert!(matches!(result, Err(CodecError::PayloadTooLarge { len: 40 })));
    }

    #[test]
    fn test_frame_packs_records_back_to_back() {
        let mut frame = ControlFrame::new(ControlPacket::hello(3, 0x0001, 0x10, 7));
        frame.records.push(ServiceInformation::new(0x100, 0, &[1, 2]).unwrap());
        frame.records.push(ServiceInformation::vacant());
        frame.records.push(ServiceInformation::new(0x200, 4, &[]).unwrap());

        let bytes = frame.to_bytes().unwrap();
        assert_eq!(bytes.len(), 12 + 8 + 6 + 6);
        assert_eq!(bytes.len(), frame.encoded_len());

        let (header, records) = ControlFrame::parse(&bytes).unwrap();
        assert_eq!(header.address, 3);
        let records: Vec<_> = records.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].payload(), &[1, 2]);
        assert!(records[1].is_vacant());
        assert_eq!(records[2].service_class, 0x200);
    }

    #[test]
    fn test_frame_iteration_stops_at_truncation() {
        let mut frame = ControlFrame::new(ControlPacket::hello(3, 0, 0x10, 7));
        frame.records.push(ServiceInformation::new(0x100, 0, &[1, 2]).unwrap());
        frame.records.push(ServiceInformation::new(0x200, 0, &[9, 9, 9, 9]).unwrap());
        let mut bytes = frame.to_bytes().unwrap();
        bytes.truncate(bytes.len() - 2);

        let (_, mut records) = ControlFrame::parse(&bytes).unwrap();
        assert_eq!(records.next().unwrap().unwrap().service_class, 0x100);
        assert!(matches!(records.next(), Some(Err(CodecError::TruncatedRecord { .. }))));
        assert!(records.next().is_none());

        assert!(ControlFrame::deserialize(&mut &bytes[..]).is_err());
    }

    #[test]
    fn test_frame_without_advertisements() {
        let frame = ControlFrame::new(ControlPacket::hello(8, 0, 0x77, 1));
        let bytes = frame.to_bytes().unwrap();
        let decoded = ControlFrame::deserialize(&mut &bytes[..]).unwrap();
        assert_eq!(decoded, frame);
    }
}
