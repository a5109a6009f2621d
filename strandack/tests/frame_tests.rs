//! Wire envelope tests from the peer's point of view.

use strandack::frame::{Ack, Frame, Inbound};
use strandack::StrandAckError;

#[test]
fn peer_reads_single_client_frame() {
    let raw = Frame::new(17, None).encode().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["frameId"], 17);
    assert_eq!(value["data"], "frame-17");
    assert!(value.get("clientId").is_none());
}

#[test]
fn peer_reads_group_frame() {
    let raw = Frame::with_payload(3, Some(5), "payload").encode().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["clientId"], 5);
    assert_eq!(value["frameId"], 3);
    assert_eq!(value["data"], "payload");
}

#[test]
fn frame_decode_accepts_missing_client_id() {
    let frame = Frame::decode(r#"{"frameId":8,"data":"frame-8"}"#).unwrap();
    assert_eq!(frame, Frame::new(8, None));
}

#[test]
fn ack_tolerates_extra_fields() {
    let inbound = Inbound::decode(r#"{"type":"ack","frameId":2,"server":"edge-1"}"#).unwrap();
    assert_eq!(inbound, Inbound::Ack(Ack::new(2)));
}

#[test]
fn negative_frame_id_is_malformed() {
    let err = Inbound::decode(r#"{"type":"ack","frameId":-1}"#).unwrap_err();
    assert!(matches!(err, StrandAckError::MalformedMessage(_)));
}

#[test]
fn bare_frame_id_without_type_is_malformed() {
    // Only the `{"type":"ack",...}` envelope is understood.
    let err = Inbound::decode(r#"{"frameId":2}"#).unwrap_err();
    assert!(matches!(err, StrandAckError::MalformedMessage(_)));
}

#[test]
fn empty_and_non_object_input_is_malformed() {
    for raw in ["", "[]", "42", "\"ack\"", "{\"type\":7}"] {
        assert!(Inbound::decode(raw).is_err(), "{raw:?} should not decode");
    }
}
