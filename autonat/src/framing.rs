//! Length-prefixed framing shared by the v1 and v2 protocols: an
//! unsigned-LEB128 length followed by that many payload bytes, the same
//! framing `libp2p`'s request-response protocols use over a raw
//! [`MuxedStream`].

use std::io;

use net_core::MuxedStream;

pub async fn write_length_prefixed<S: MuxedStream + ?Sized>(stream: &mut S, data: &[u8]) -> io::Result<()> {
    let mut len_buf = Vec::new();
    let mut len = data.len() as u64;
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        len_buf.push(byte);
        if len == 0 {
            break;
        }
    }
    write_all(stream, &len_buf).await?;
    write_all(stream, data).await?;
    Ok(())
}

pub async fn read_length_prefixed<S: MuxedStream + ?Sized>(stream: &mut S, max_len: usize) -> io::Result<Vec<u8>> {
    let mut len: u64 = 0;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        read_exact(stream, &mut byte).await?;
        len |= ((byte[0] & 0x7f) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 63 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "varint length prefix too long"));
        }
    }
    if len as usize > max_len {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame exceeds maximum length"));
    }
    let mut buf = vec![0u8; len as usize];
    read_exact(stream, &mut buf).await?;
    Ok(buf)
}

async fn write_all<S: MuxedStream + ?Sized>(stream: &mut S, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        let n = stream.write(buf).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
        }
        buf = &buf[n..];
    }
    Ok(())
}

async fn read_exact<S: MuxedStream + ?Sized>(stream: &mut S, buf: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed before frame complete"));
        }
        filled += n;
    }
    Ok(())
}
