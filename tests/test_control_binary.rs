use jdbus::codec::{BusSerialize, ControlFrame, ControlPacket, ServiceInformation};
use jdbus::service::{NullHandler, ServiceHandler};
use jdbus::{BusConfig, BusRuntime, MemoryTransport, Service, Target};

struct Calibrated;

impl ServiceHandler for Calibrated {
    fn add_advertisement_data(&mut self, data: &mut Vec<u8>) {
        data.extend_from_slice(&[0x10, 0x20, 0x30]);
    }
}

#[test]
/// Identity header layout, little-endian, no padding
fn test_hello_binary_layout() {
    let hello = ControlPacket::hello(5, 0x00FF, 0x1234, 42);
    let mut buf = Vec::new();
    hello.serialize(&mut buf).unwrap();

    assert_eq!(buf, vec![0x01, 5, 0xFF, 0x00, 0x34, 0x12, 0x00, 0x00, 42, 0, 0, 0]);
}

#[test]
/// Advertisement record: class(4) flags(1) size(1) payload
fn test_service_information_binary_layout() {
    let info = ServiceInformation::new(0xAABBCCDD, 0x01, &[0x10, 0x20, 0x30]).unwrap();
    let mut buf = Vec::new();
    info.serialize(&mut buf).unwrap();

    assert_eq!(buf[0..4], [0xDD, 0xCC, 0xBB, 0xAA]);
    assert_eq!(buf[4], 0x01);
    assert_eq!(buf[5], 3);
    assert_eq!(buf[6..], [0x10, 0x20, 0x30]);
}

#[test]
/// Full control frame as transmitted by a runtime hosting two services
fn test_runtime_control_frame_layout() {
    let transport = MemoryTransport::standalone();
    let mut runtime = BusRuntime::new(&BusConfig::new(7, 0x01020304, 0x55), transport.clone());
    runtime.register_service(Service::client(0x77, NullHandler)).unwrap();
    runtime.register_service(Service::host(0xAABBCCDD, Calibrated).with_flags(0x01)).unwrap();
    runtime.register_service(Service::broadcast_host(0x66, NullHandler)).unwrap();

    runtime.queue_control_packet().unwrap();
    let sent = transport.take_sent();
    assert_eq!(sent.len(), 1);
    let (target, buf) = &sent[0];
    assert_eq!(*target, Target::CONTROL);

    // [0..12] hello header, reserved flag byte zero
    assert_eq!(buf[0], 0x01);
    assert_eq!(buf[1], 7);
    assert_eq!(buf[3], 0x00);
    assert_eq!(buf[4..8], [0x55, 0, 0, 0]);
    assert_eq!(buf[8..12], [0x04, 0x03, 0x02, 0x01]);

    // [12..21] slot 1: host record with 3 payload bytes
    assert_eq!(buf[12..16], [0xDD, 0xCC, 0xBB, 0xAA]);
    assert_eq!(buf[16], 0x01);
    assert_eq!(buf[17], 3);
    assert_eq!(buf[18..21], [0x10, 0x20, 0x30]);

    // [21..27] slot 2: broadcast host record, no payload
    assert_eq!(buf[21..25], [0x66, 0, 0, 0]);
    assert_eq!(buf[26], 0);

    // Client contributes nothing
    assert_eq!(buf.len(), 12 + 9 + 6);

    let (_, records) = ControlFrame::parse(buf).unwrap();
    assert_eq!(records.count(), 2);
}
