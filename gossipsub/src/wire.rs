//! RPC wire encoding/decoding (protobuf-shaped, per §6).
//!
//! Hand-implements [`quick_protobuf`]'s `MessageRead`/`MessageWrite` for
//! the gossipsub RPC rather than generating them from a `.proto` file,
//! since this workspace has no build-time codegen step. Field numbers
//! and wire types mirror the reference `rpc.proto` used by the
//! gossipsub v1.1 implementations this design follows.

use quick_protobuf::sizeofs::sizeof_len;
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Result as PbResult, Writer, WriterBackend};

use crate::control::{ControlMessage, Graft, IDontWant, IHave, IWant, Prune};
use crate::error::GossipsubError;
use crate::message::RawGossipsubMessage;
use crate::topic::Subscription;
use crate::types::{MessageId, Topic};

/// One full RPC: subscription announcements, published messages, and an
/// optional control batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rpc {
    pub subscriptions: Vec<Subscription>,
    pub messages: Vec<RawGossipsubMessage>,
    pub control: Option<ControlMessage>,
}

pub fn encode_rpc(rpc: &Rpc) -> Vec<u8> {
    let wire = WireRpc::from(rpc);
    let mut buf = Vec::with_capacity(wire.get_size());
    let mut writer = Writer::new(&mut buf);
    wire.write_message(&mut writer).expect("writing to a Vec<u8> never fails");
    buf
}

pub fn decode_rpc(bytes: &[u8]) -> Result<Rpc, GossipsubError> {
    let mut reader = BytesReader::from_bytes(bytes);
    let wire = WireRpc::from_reader(&mut reader, bytes)
        .map_err(|e| GossipsubError::RpcDecodeFailure(e.to_string()))?;
    Ok(Rpc::from(wire))
}

/// Protobuf encoding of `message` with `signature` and `key` cleared, per
/// the §6 signing-data rule. Callers prefix this with `"libp2p-pubsub:"`.
pub fn encode_message_for_signing(message: &RawGossipsubMessage) -> Vec<u8> {
    let mut wire = WireMessage::from(message);
    wire.signature = None;
    wire.key = None;
    let mut buf = Vec::with_capacity(wire.get_size());
    let mut writer = Writer::new(&mut buf);
    wire.write_message(&mut writer).expect("writing to a Vec<u8> never fails");
    buf
}

// ---------------------------------------------------------------------
// Wire-shaped structs. Optional scalar/message fields follow proto2
// "presence" semantics; repeated fields default to empty.
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
struct WireSubOpts {
    subscribe: Option<bool>,
    topic_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireMessage {
    from: Option<Vec<u8>>,
    data: Option<Vec<u8>>,
    seqno: Option<Vec<u8>>,
    topic_ids: Vec<String>,
    signature: Option<Vec<u8>>,
    key: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireControlGraft {
    topic_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireControlPrune {
    topic_id: Option<String>,
    backoff: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireControlIHave {
    topic_id: Option<String>,
    message_ids: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireControlIWant {
    message_ids: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireControlIDontWant {
    message_ids: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireControlMessage {
    graft: Vec<WireControlGraft>,
    prune: Vec<WireControlPrune>,
    ihave: Vec<WireControlIHave>,
    iwant: Vec<WireControlIWant>,
    idontwant: Vec<WireControlIDontWant>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WireRpc {
    subscriptions: Vec<WireSubOpts>,
    publish: Vec<WireMessage>,
    control: Option<WireControlMessage>,
}

// ---------------------------------------------------------------------
// Domain <-> wire conversions.
// ---------------------------------------------------------------------

impl From<&Subscription> for WireSubOpts {
    fn from(s: &Subscription) -> Self {
        Self {
            subscribe: Some(s.subscribe),
            topic_id: Some(s.topic.as_str().to_string()),
        }
    }
}

impl From<WireSubOpts> for Subscription {
    fn from(w: WireSubOpts) -> Self {
        Self {
            topic: Topic::new(w.topic_id.unwrap_or_default()),
            subscribe: w.subscribe.unwrap_or(false),
        }
    }
}

impl From<&RawGossipsubMessage> for WireMessage {
    fn from(m: &RawGossipsubMessage) -> Self {
        Self {
            from: m.source.as_ref().map(|p| p.to_bytes()),
            data: Some(m.data.clone()),
            seqno: m.seqno.map(|s| s.to_vec()),
            topic_ids: vec![m.topic.as_str().to_string()],
            signature: m.signature.clone(),
            key: m.key.clone(),
        }
    }
}

impl TryFrom<WireMessage> for RawGossipsubMessage {
    type Error = GossipsubError;

    fn try_from(w: WireMessage) -> Result<Self, Self::Error> {
        let topic = w
            .topic_ids
            .into_iter()
            .next()
            .map(Topic::new)
            .ok_or_else(|| GossipsubError::RpcDecodeFailure("message missing topic".into()))?;

        let mut msg = RawGossipsubMessage::new(topic, w.data.unwrap_or_default());

        if let (Some(from), Some(seqno)) = (&w.from, &w.seqno) {
            let peer = net_core::PeerId::from_bytes(from)
                .map_err(|e| GossipsubError::RpcDecodeFailure(e.to_string()))?;
            let seqno: [u8; 8] = seqno
                .as_slice()
                .try_into()
                .map_err(|_| GossipsubError::RpcDecodeFailure("seqno must be 8 bytes".into()))?;
            msg = msg.with_source(peer, seqno);
        }

        if let Some(signature) = w.signature {
            msg = msg.with_signature(signature, w.key);
        }

        Ok(msg)
    }
}

impl From<&Graft> for WireControlGraft {
    fn from(g: &Graft) -> Self {
        Self {
            topic_id: Some(g.topic_id.as_str().to_string()),
        }
    }
}

impl From<WireControlGraft> for Graft {
    fn from(w: WireControlGraft) -> Self {
        Self {
            topic_id: Topic::new(w.topic_id.unwrap_or_default()),
        }
    }
}

impl From<&Prune> for WireControlPrune {
    fn from(p: &Prune) -> Self {
        Self {
            topic_id: Some(p.topic_id.as_str().to_string()),
            backoff: p.backoff,
        }
    }
}

impl From<WireControlPrune> for Prune {
    fn from(w: WireControlPrune) -> Self {
        Self {
            topic_id: Topic::new(w.topic_id.unwrap_or_default()),
            backoff: w.backoff,
        }
    }
}

impl From<&IHave> for WireControlIHave {
    fn from(i: &IHave) -> Self {
        Self {
            topic_id: Some(i.topic_id.as_str().to_string()),
            message_ids: i.message_ids.iter().map(|id| id.as_bytes().to_vec()).collect(),
        }
    }
}

impl From<WireControlIHave> for IHave {
    fn from(w: WireControlIHave) -> Self {
        Self {
            topic_id: Topic::new(w.topic_id.unwrap_or_default()),
            message_ids: w.message_ids.iter().map(|b| MessageId::from(b.as_slice())).collect(),
        }
    }
}

impl From<&IWant> for WireControlIWant {
    fn from(i: &IWant) -> Self {
        Self {
            message_ids: i.message_ids.iter().map(|id| id.as_bytes().to_vec()).collect(),
        }
    }
}

impl From<WireControlIWant> for IWant {
    fn from(w: WireControlIWant) -> Self {
        Self {
            message_ids: w.message_ids.iter().map(|b| MessageId::from(b.as_slice())).collect(),
        }
    }
}

impl From<&IDontWant> for WireControlIDontWant {
    fn from(i: &IDontWant) -> Self {
        Self {
            message_ids: i.message_ids.iter().map(|id| id.as_bytes().to_vec()).collect(),
        }
    }
}

impl From<WireControlIDontWant> for IDontWant {
    fn from(w: WireControlIDontWant) -> Self {
        Self {
            message_ids: w.message_ids.iter().map(|b| MessageId::from(b.as_slice())).collect(),
        }
    }
}

impl From<&ControlMessage> for WireControlMessage {
    fn from(c: &ControlMessage) -> Self {
        Self {
            graft: c.grafts.iter().map(WireControlGraft::from).collect(),
            prune: c.prunes.iter().map(WireControlPrune::from).collect(),
            ihave: c.ihaves.iter().map(WireControlIHave::from).collect(),
            iwant: c.iwants.iter().map(WireControlIWant::from).collect(),
            idontwant: c.idontwants.iter().map(WireControlIDontWant::from).collect(),
        }
    }
}

impl From<WireControlMessage> for ControlMessage {
    fn from(w: WireControlMessage) -> Self {
        Self {
            grafts: w.graft.into_iter().map(Graft::from).collect(),
            prunes: w.prune.into_iter().map(Prune::from).collect(),
            ihaves: w.ihave.into_iter().map(IHave::from).collect(),
            iwants: w.iwant.into_iter().map(IWant::from).collect(),
            idontwants: w.idontwant.into_iter().map(IDontWant::from).collect(),
        }
    }
}

impl From<&Rpc> for WireRpc {
    fn from(rpc: &Rpc) -> Self {
        Self {
            subscriptions: rpc.subscriptions.iter().map(WireSubOpts::from).collect(),
            publish: rpc.messages.iter().map(WireMessage::from).collect(),
            control: rpc.control.as_ref().map(WireControlMessage::from),
        }
    }
}

impl From<WireRpc> for Rpc {
    fn from(w: WireRpc) -> Self {
        Self {
            subscriptions: w.subscriptions.into_iter().map(Subscription::from).collect(),
            messages: w
                .publish
                .into_iter()
                .filter_map(|m| RawGossipsubMessage::try_from(m).ok())
                .collect(),
            control: w.control.map(ControlMessage::from),
        }
    }
}

// ---------------------------------------------------------------------
// quick_protobuf MessageRead/MessageWrite implementations.
// ---------------------------------------------------------------------

impl<'a> MessageRead<'a> for WireSubOpts {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(8) => msg.subscribe = Some(r.read_bool(bytes)?),
                Ok(18) => msg.topic_id = Some(r.read_string(bytes)?.to_string()),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireSubOpts {
    fn get_size(&self) -> usize {
        self.subscribe.map_or(0, |_| 2)
            + self
                .topic_id
                .as_ref()
                .map_or(0, |s| 1 + sizeof_len(s.len()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(v) = self.subscribe {
            w.write_with_tag(8, |w| w.write_bool(v))?;
        }
        if let Some(ref s) = self.topic_id {
            w.write_with_tag(18, |w| w.write_string(s))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireMessage {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.from = Some(r.read_bytes(bytes)?.to_vec()),
                Ok(18) => msg.data = Some(r.read_bytes(bytes)?.to_vec()),
                Ok(26) => msg.seqno = Some(r.read_bytes(bytes)?.to_vec()),
                Ok(34) => msg.topic_ids.push(r.read_string(bytes)?.to_string()),
                Ok(42) => msg.signature = Some(r.read_bytes(bytes)?.to_vec()),
                Ok(50) => msg.key = Some(r.read_bytes(bytes)?.to_vec()),
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
        self.from.as_ref().map_or(0, |v| 1 + sizeof_len(v.len()))
            + self.data.as_ref().map_or(0, |v| 1 + sizeof_len(v.len()))
            + self.seqno.as_ref().map_or(0, |v| 1 + sizeof_len(v.len()))
            + self
                .topic_ids
                .iter()
                .map(|s| 1 + sizeof_len(s.len()))
                .sum::<usize>()
            + self.signature.as_ref().map_or(0, |v| 1 + sizeof_len(v.len()))
            + self.key.as_ref().map_or(0, |v| 1 + sizeof_len(v.len()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(ref v) = self.from {
            w.write_with_tag(10, |w| w.write_bytes(v))?;
        }
        if let Some(ref v) = self.data {
            w.write_with_tag(18, |w| w.write_bytes(v))?;
        }
        if let Some(ref v) = self.seqno {
            w.write_with_tag(26, |w| w.write_bytes(v))?;
        }
        for s in &self.topic_ids {
            w.write_with_tag(34, |w| w.write_string(s))?;
        }
        if let Some(ref v) = self.signature {
            w.write_with_tag(42, |w| w.write_bytes(v))?;
        }
        if let Some(ref v) = self.key {
            w.write_with_tag(50, |w| w.write_bytes(v))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireControlGraft {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.topic_id = Some(r.read_string(bytes)?.to_string()),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireControlGraft {
    fn get_size(&self) -> usize {
        self.topic_id.as_ref().map_or(0, |s| 1 + sizeof_len(s.len()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(ref s) = self.topic_id {
            w.write_with_tag(10, |w| w.write_string(s))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireControlPrune {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.topic_id = Some(r.read_string(bytes)?.to_string()),
                Ok(24) => msg.backoff = Some(r.read_uint64(bytes)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireControlPrune {
    fn get_size(&self) -> usize {
        self.topic_id.as_ref().map_or(0, |s| 1 + sizeof_len(s.len()))
            + self.backoff.map_or(0, |_| 1 + 10)
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(ref s) = self.topic_id {
            w.write_with_tag(10, |w| w.write_string(s))?;
        }
        if let Some(v) = self.backoff {
            w.write_with_tag(24, |w| w.write_uint64(v))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireControlIHave {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.topic_id = Some(r.read_string(bytes)?.to_string()),
                Ok(18) => msg.message_ids.push(r.read_bytes(bytes)?.to_vec()),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireControlIHave {
    fn get_size(&self) -> usize {
        self.topic_id.as_ref().map_or(0, |s| 1 + sizeof_len(s.len()))
            + self
                .message_ids
                .iter()
                .map(|v| 1 + sizeof_len(v.len()))
                .sum::<usize>()
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(ref s) = self.topic_id {
            w.write_with_tag(10, |w| w.write_string(s))?;
        }
        for id in &self.message_ids {
            w.write_with_tag(18, |w| w.write_bytes(id))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireControlIWant {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.message_ids.push(r.read_bytes(bytes)?.to_vec()),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireControlIWant {
    fn get_size(&self) -> usize {
        self.message_ids
            .iter()
            .map(|v| 1 + sizeof_len(v.len()))
            .sum()
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        for id in &self.message_ids {
            w.write_with_tag(10, |w| w.write_bytes(id))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireControlIDontWant {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.message_ids.push(r.read_bytes(bytes)?.to_vec()),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireControlIDontWant {
    fn get_size(&self) -> usize {
        self.message_ids
            .iter()
            .map(|v| 1 + sizeof_len(v.len()))
            .sum()
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        for id in &self.message_ids {
            w.write_with_tag(10, |w| w.write_bytes(id))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireControlMessage {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg.graft.push(r.read_message(bytes, WireControlGraft::from_reader)?),
                Ok(18) => msg.prune.push(r.read_message(bytes, WireControlPrune::from_reader)?),
                Ok(26) => msg.ihave.push(r.read_message(bytes, WireControlIHave::from_reader)?),
                Ok(34) => msg.iwant.push(r.read_message(bytes, WireControlIWant::from_reader)?),
                Ok(42) => msg
                    .idontwant
                    .push(r.read_message(bytes, WireControlIDontWant::from_reader)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireControlMessage {
    fn get_size(&self) -> usize {
        self.graft.iter().map(|m| 1 + sizeof_len(m.get_size())).sum::<usize>()
            + self.prune.iter().map(|m| 1 + sizeof_len(m.get_size())).sum::<usize>()
            + self.ihave.iter().map(|m| 1 + sizeof_len(m.get_size())).sum::<usize>()
            + self.iwant.iter().map(|m| 1 + sizeof_len(m.get_size())).sum::<usize>()
            + self
                .idontwant
                .iter()
                .map(|m| 1 + sizeof_len(m.get_size()))
                .sum::<usize>()
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        for m in &self.graft {
            w.write_with_tag(10, |w| w.write_message(m))?;
        }
        for m in &self.prune {
            w.write_with_tag(18, |w| w.write_message(m))?;
        }
        for m in &self.ihave {
            w.write_with_tag(26, |w| w.write_message(m))?;
        }
        for m in &self.iwant {
            w.write_with_tag(34, |w| w.write_message(m))?;
        }
        for m in &self.idontwant {
            w.write_with_tag(42, |w| w.write_message(m))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for WireRpc {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = Self::default();
        while !r.is_eof() {
            match r.next_tag(bytes) {
                Ok(10) => msg
                    .subscriptions
                    .push(r.read_message(bytes, WireSubOpts::from_reader)?),
                Ok(18) => msg.publish.push(r.read_message(bytes, WireMessage::from_reader)?),
                Ok(26) => msg.control = Some(r.read_message(bytes, WireControlMessage::from_reader)?),
                Ok(t) => {
                    r.read_unknown(bytes, t)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(msg)
    }
}

impl MessageWrite for WireRpc {
    fn get_size(&self) -> usize {
        self.subscriptions
            .iter()
            .map(|m| 1 + sizeof_len(m.get_size()))
            .sum::<usize>()
            + self.publish.iter().map(|m| 1 + sizeof_len(m.get_size())).sum::<usize>()
            + self
                .control
                .as_ref()
                .map_or(0, |m| 1 + sizeof_len(m.get_size()))
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        for m in &self.subscriptions {
            w.write_with_tag(10, |w| w.write_message(m))?;
        }
        for m in &self.publish {
            w.write_with_tag(18, |w| w.write_message(m))?;
        }
        if let Some(ref m) = self.control {
            w.write_with_tag(26, |w| w.write_message(m))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_roundtrips_through_the_wire() {
        let rpc = Rpc {
            subscriptions: vec![Subscription::subscribe(Topic::new("t"))],
            messages: vec![RawGossipsubMessage::new(Topic::new("t"), b"hello".to_vec())],
            control: Some(ControlMessage {
                grafts: vec![Graft {
                    topic_id: Topic::new("t"),
                }],
                prunes: vec![Prune {
                    topic_id: Topic::new("u"),
                    backoff: Some(60),
                }],
                ihaves: vec![IHave {
                    topic_id: Topic::new("t"),
                    message_ids: vec![MessageId::from_bytes([1; 20])],
                }],
                iwants: vec![IWant {
                    message_ids: vec![MessageId::from_bytes([2; 20])],
                }],
                idontwants: vec![],
            }),
        };

        let encoded = encode_rpc(&rpc);
        let decoded = decode_rpc(&encoded).unwrap();

        assert_eq!(decoded.subscriptions, rpc.subscriptions);
        assert_eq!(decoded.messages.len(), 1);
        assert_eq!(decoded.messages[0].data, b"hello");
        assert_eq!(decoded.control, rpc.control);
    }

    #[test]
    fn unknown_top_level_fields_are_skipped() {
        // Field 99, wire type 2 (length-delimited), containing junk bytes.
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        writer.write_with_tag(99 << 3 | 2, |w| w.write_bytes(b"unknown-future-field")).unwrap();

        let graft = Graft {
            topic_id: Topic::new("t"),
        };
        let control = WireControlMessage {
            graft: vec![WireControlGraft::from(&graft)],
            ..Default::default()
        };
        let wire = WireRpc {
            control: Some(control),
            ..Default::default()
        };
        let mut writer = Writer::new(&mut buf);
        wire.write_message(&mut writer).unwrap();

        let mut reader = BytesReader::from_bytes(&buf);
        let decoded = WireRpc::from_reader(&mut reader, &buf).unwrap();
        assert_eq!(decoded.control.unwrap().graft.len(), 1);
    }
}
