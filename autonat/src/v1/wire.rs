//! AutoNAT v1 wire messages on `/libp2p/autonat/1.0.0` (spec §4.3).
//!
//! Hand-implements `quick_protobuf`'s `MessageRead`/`MessageWrite`, same
//! approach as `gossipsub::wire`, following the field layout of the
//! reference `autonat/1.0.0` proto (`Message{type,dial,dialResponse}`).

use quick_protobuf::sizeofs::sizeof_len;
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Result as PbResult, Writer, WriterBackend};

use crate::error::AutoNatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    DialError,
    DialRefused,
    BadRequest,
    InternalError,
}

impl ResponseStatus {
    fn to_wire(self) -> i32 {
        match self {
            ResponseStatus::Ok => 0,
            ResponseStatus::DialError => 100,
            ResponseStatus::DialRefused => 101,
            ResponseStatus::BadRequest => 200,
            ResponseStatus::InternalError => 300,
        }
    }

    fn from_wire(v: i32) -> Self {
        match v {
            0 => ResponseStatus::Ok,
            100 => ResponseStatus::DialError,
            101 => ResponseStatus::DialRefused,
            200 => ResponseStatus::BadRequest,
            _ => ResponseStatus::InternalError,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialRequest {
    pub peer_id: Vec<u8>,
    pub addrs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialResponse {
    pub status: ResponseStatus,
    pub status_text: Option<String>,
    pub addr: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Dial(DialRequest),
    DialResponse(DialResponse),
}

pub fn encode_message(msg: &Message) -> Vec<u8> {
    let wire = WireMessage::from(msg);
    let mut buf = Vec::with_capacity(wire.get_size());
    let mut writer = Writer::new(&mut buf);
    wire.write_message(&mut writer).expect("writing to a Vec<u8> never fails");
    buf
}

pub fn decode_message(bytes: &[u8]) -> Result<Message, AutoNatError> {
    let mut reader = BytesReader::from_bytes(bytes);
    let wire = WireMessage::from_reader(&mut reader, bytes)
        .map_err(|e| AutoNatError::ProtocolViolation(e.to_string()))?;
    Message::try_from(wire)
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WirePeerInfo {
    id: Option<Vec<u8>>,
    addrs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireDial {
    peer: Option<WirePeerInfo>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireDialResponse {
    status: Option<i32>,
    status_text: Option<String>,
    addr: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireMessage {
    msg_type: Option<i32>,
    dial: Option<WireDial>,
    dial_response: Option<WireDialResponse>,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        match msg {
            Message::Dial(d) => Self {
                msg_type: Some(0),
                dial: Some(WireDial {
                    peer: Some(WirePeerInfo { id: Some(d.peer_id.clone()), addrs: d.addrs.clone() }),
                }),
                dial_response: None,
            },
            Message::DialResponse(r) => Self {
                msg_type: Some(1),
                dial: None,
                dial_response: Some(WireDialResponse {
                    status: Some(r.status.to_wire()),
                    status_text: r.status_text.clone(),
                    addr: r.addr.clone(),
                }),
            },
        }
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = AutoNatError;

    fn try_from(w: WireMessage) -> Result<Self, Self::Error> {
        match w.msg_type {
            Some(0) => {
                let peer = w.dial.and_then(|d| d.peer).unwrap_or_default();
                Ok(Message::Dial(DialRequest { peer_id: peer.id.unwrap_or_default(), addrs: peer.addrs }))
            }
            Some(1) => {
                let r = w.dial_response.ok_or_else(|| AutoNatError::BadRequest("missing dialResponse".into()))?;
                Ok(Message::DialResponse(DialResponse {
                    status: ResponseStatus::from_wire(r.status.unwrap_or(300)),
                    status_text: r.status_text,
                    addr: r.addr,
                }))
            }
            _ => Err(AutoNatError::BadRequest("missing or unknown message type".into())),
        }
    }
}

impl<'a> MessageRead<'a> for WirePeerInfo {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.id = Some(r.read_bytes(bytes)?.to_vec()),
                Ok(18) => msg.addrs.push(r.read_bytes(bytes)?.to_vec()),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WirePeerInfo {
    fn get_size(&self) -> usize {
        self.id.as_ref().map_or(0, |v| 1 + sizeof_len(v.len()))
            + self.addrs.iter().map(|v| 1 + sizeof_len(v.len())).sum::<usize>()
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(ref v) = self.id {
            w.write_with_tag(10, |w| w.write_bytes(v))?;
        }
        for a in &self.addrs {
            w.write_with_tag(18, |w| w.write_bytes(a))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireDial {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.peer = Some(r.read_message(bytes, WirePeerInfo::from_reader)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireDial {
    fn get_size(&self) -> usize {
        self.peer.as_ref().map_or(0, |m| 1 + sizeof_len(m.get_size()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(ref m) = self.peer {
            w.write_with_tag(10, |w| w.write_message(m))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireDialResponse {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(8) => msg.status = Some(r.read_int32(bytes)?),
                Ok(18) => msg.status_text = Some(r.read_string(bytes)?.to_string()),
                Ok(26) => msg.addr = Some(r.read_bytes(bytes)?.to_vec()),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireDialResponse {
    fn get_size(&self) -> usize {
        self.status.map_or(0, |_| 2)
            + self.status_text.as_ref().map_or(0, |s| 1 + sizeof_len(s.len()))
            + self.addr.as_ref().map_or(0, |v| 1 + sizeof_len(v.len()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(v) = self.status {
            w.write_with_tag(8, |w| w.write_int32(v))?;
        }
        if let Some(ref s) = self.status_text {
            w.write_with_tag(18, |w| w.write_string(s))?;
        }
        if let Some(ref v) = self.addr {
            w.write_with_tag(26, |w| w.write_bytes(v))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireMessage {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(8) => msg.msg_type = Some(r.read_int32(bytes)?),
                Ok(18) => msg.dial = Some(r.read_message(bytes, WireDial::from_reader)?),
                Ok(26) => msg.dial_response = Some(r.read_message(bytes, WireDialResponse::from_reader)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireMessage {
    fn get_size(&self) -> usize {
        self.msg_type.map_or(0, |_| 2)
            + self.dial.as_ref().map_or(0, |m| 1 + sizeof_len(m.get_size()))
            + self.dial_response.as_ref().map_or(0, |m| 1 + sizeof_len(m.get_size()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(v) = self.msg_type {
            w.write_with_tag(8, |w| w.write_int32(v))?;
        }
        if let Some(ref m) = self.dial {
            w.write_with_tag(18, |w| w.write_message(m))?;
        }
        if let Some(ref m) = self.dial_response {
            w.write_with_tag(26, |w| w.write_message(m))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_request_roundtrips() {
        let msg = Message::Dial(DialRequest { peer_id: vec![1, 2, 3], addrs: vec![vec![4, 5], vec![6]] });
        let encoded = encode_message(&msg);
        let decoded = decode_message(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn dial_response_roundtrips() {
        let msg = Message::DialResponse(DialResponse {
            status: ResponseStatus::DialRefused,
            status_text: Some("no addresses matched".into()),
            addr: None,
        });
        let encoded = encode_message(&msg);
        let decoded = decode_message(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn unknown_response_status_maps_to_internal_error() {
        let wire = WireMessage {
            msg_type: Some(1),
            dial: None,
            dial_response: Some(WireDialResponse { status: Some(9999), status_text: None, addr: None }),
        };
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        wire.write_message(&mut writer).unwrap();
        let decoded = decode_message(&buf).unwrap();
        match decoded {
            Message::DialResponse(r) => assert_eq!(r.status, ResponseStatus::InternalError),
            _ => panic!("expected dial response"),
        }
    }
}
