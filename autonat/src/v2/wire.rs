//! AutoNAT v2 wire messages (spec §4.4). Nonces are encoded as `fixed64`
//! fields: tag `0x09` (field 1, wire type 1) carries `DialBack`'s nonce,
//! `0x11` (field 2, wire type 1) carries `DialRequest`'s nonce, exactly as
//! spec.md's open question on the nonce layout resolves it — a flat
//! `fixed64` field rather than a nested submessage.

use quick_protobuf::sizeofs::sizeof_len;
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Result as PbResult, Writer, WriterBackend};

use crate::error::AutoNatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialStatus {
    Ok,
    DialError,
    DialBackError,
    BadRequest,
    InternalError,
}

impl DialStatus {
    fn to_wire(self) -> i32 {
        match self {
            DialStatus::Ok => 0,
            DialStatus::DialError => 100,
            DialStatus::DialBackError => 101,
            DialStatus::BadRequest => 200,
            DialStatus::InternalError => 300,
        }
    }

    fn from_wire(v: i32) -> Self {
        match v {
            0 => DialStatus::Ok,
            100 => DialStatus::DialError,
            101 => DialStatus::DialBackError,
            200 => DialStatus::BadRequest,
            _ => DialStatus::InternalError,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialRequest {
    pub address: Vec<u8>,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialResponse {
    pub status: DialStatus,
    pub status_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialBack {
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialBackResponse {
    pub ok: bool,
}

macro_rules! encode_decode {
    ($encode_fn:ident, $decode_fn:ident, $ty:ty, $wire:ty) => {
        pub fn $encode_fn(msg: &$ty) -> Vec<u8> {
            let wire = <$wire>::from(msg);
            let mut buf = Vec::with_capacity(wire.get_size());
            let mut writer = Writer::new(&mut buf);
            wire.write_message(&mut writer).expect("writing to a Vec<u8> never fails");
            buf
        }

        pub fn $decode_fn(bytes: &[u8]) -> Result<$ty, AutoNatError> {
            let mut reader = BytesReader::from_bytes(bytes);
            let wire = <$wire>::from_reader(&mut reader, bytes)
                .map_err(|e| AutoNatError::ProtocolViolation(e.to_string()))?;
            <$ty>::try_from(wire)
        }
    };
}

encode_decode!(encode_dial_request, decode_dial_request, DialRequest, WireDialRequest);
encode_decode!(encode_dial_response, decode_dial_response, DialResponse, WireDialResponse);
encode_decode!(encode_dial_back, decode_dial_back, DialBack, WireDialBack);
encode_decode!(encode_dial_back_response, decode_dial_back_response, DialBackResponse, WireDialBackResponse);

#[derive(Debug, Clone, Default, PartialEq)]
struct WireDialRequest {
    address: Option<Vec<u8>>,
    nonce: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireDialResponse {
    status: Option<i32>,
    status_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireDialBack {
    nonce: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireDialBackResponse {
    ok: Option<bool>,
}

impl From<&DialRequest> for WireDialRequest {
    fn from(r: &DialRequest) -> Self {
        Self { address: Some(r.address.clone()), nonce: Some(r.nonce) }
    }
}

impl TryFrom<WireDialRequest> for DialRequest {
    type Error = AutoNatError;

    fn try_from(w: WireDialRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            address: w.address.ok_or_else(|| AutoNatError::BadRequest("missing address".into()))?,
            nonce: w.nonce.ok_or_else(|| AutoNatError::BadRequest("missing nonce".into()))?,
        })
    }
}

impl From<&DialResponse> for WireDialResponse {
    fn from(r: &DialResponse) -> Self {
        Self { status: Some(r.status.to_wire()), status_text: r.status_text.clone() }
    }
}

impl TryFrom<WireDialResponse> for DialResponse {
    type Error = AutoNatError;

    fn try_from(w: WireDialResponse) -> Result<Self, Self::Error> {
        Ok(Self { status: DialStatus::from_wire(w.status.unwrap_or(300)), status_text: w.status_text })
    }
}

impl From<&DialBack> for WireDialBack {
    fn from(b: &DialBack) -> Self {
        Self { nonce: Some(b.nonce) }
    }
}

impl TryFrom<WireDialBack> for DialBack {
    type Error = AutoNatError;

    fn try_from(w: WireDialBack) -> Result<Self, Self::Error> {
        Ok(Self { nonce: w.nonce.ok_or_else(|| AutoNatError::BadRequest("missing nonce".into()))? })
    }
}

impl From<&DialBackResponse> for WireDialBackResponse {
    fn from(r: &DialBackResponse) -> Self {
        Self { ok: Some(r.ok) }
    }
}

impl TryFrom<WireDialBackResponse> for DialBackResponse {
    type Error = AutoNatError;

    fn try_from(w: WireDialBackResponse) -> Result<Self, Self::Error> {
        Ok(Self { ok: w.ok.unwrap_or(false) })
    }
}

impl<'a> MessageRead<'a> for WireDialRequest {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.address = Some(r.read_bytes(bytes)?.to_vec()),
                Ok(0x11) => msg.nonce = Some(r.read_fixed64(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireDialRequest {
    fn get_size(&self) -> usize {
        self.address.as_ref().map_or(0, |v| 1 + sizeof_len(v.len())) + self.nonce.map_or(0, |_| 1 + 8)
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(ref v) = self.address {
            w.write_with_tag(10, |w| w.write_bytes(v))?;
        }
        if let Some(v) = self.nonce {
            w.write_with_tag(0x11, |w| w.write_fixed64(v))?;
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
        self.status.map_or(0, |_| 2) + self.status_text.as_ref().map_or(0, |s| 1 + sizeof_len(s.len()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(v) = self.status {
            w.write_with_tag(8, |w| w.write_int32(v))?;
        }
        if let Some(ref s) = self.status_text {
            w.write_with_tag(18, |w| w.write_string(s))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireDialBack {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(0x09) => msg.nonce = Some(r.read_fixed64(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireDialBack {
    fn get_size(&self) -> usize {
        self.nonce.map_or(0, |_| 1 + 8)
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(v) = self.nonce {
            w.write_with_tag(0x09, |w| w.write_fixed64(v))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireDialBackResponse {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(8) => msg.ok = Some(r.read_bool(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireDialBackResponse {
    fn get_size(&self) -> usize {
        self.ok.map_or(0, |_| 2)
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(v) = self.ok {
            w.write_with_tag(8, |w| w.write_bool(v))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_request_nonce_roundtrips_including_extremes() {
        for nonce in [0u64, 1, u64::MAX, 0x1122_3344_5566_7788] {
            let req = DialRequest { address: vec![9, 9, 9], nonce };
            let encoded = encode_dial_request(&req);
            let decoded = decode_dial_request(&encoded).unwrap();
            assert_eq!(decoded, req);
        }
    }

    #[test]
    fn dial_back_nonce_roundtrips() {
        let back = DialBack { nonce: 0xdead_beef_cafe_babe };
        let encoded = encode_dial_back(&back);
        let decoded = decode_dial_back(&encoded).unwrap();
        assert_eq!(decoded, back);
    }

    #[test]
    fn unknown_dial_status_maps_to_internal_error() {
        let wire = WireDialResponse { status: Some(777), status_text: None };
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        wire.write_message(&mut writer).unwrap();
        let decoded = decode_dial_response(&buf).unwrap();
        assert_eq!(decoded.status, DialStatus::InternalError);
    }
}
