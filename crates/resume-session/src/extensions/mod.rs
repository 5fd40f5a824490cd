//! TLS extensions that matter for session resumption (SNI, ALPN, EMS).

use resume_types::SessionError;

/// TLS extension type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtensionType(pub u16);

impl ExtensionType {
    pub const SERVER_NAME: Self = Self(0);
    pub const APPLICATION_LAYER_PROTOCOL_NEGOTIATION: Self = Self(16);
    pub const EXTENDED_MASTER_SECRET: Self = Self(23);
}

/// A raw TLS extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub extension_type: ExtensionType,
    pub data: Vec<u8>,
}

fn malformed(msg: &str) -> SessionError {
    SessionError::MalformedData(msg.into())
}

// ---------------------------------------------------------------------------
// SNI (RFC 6066 §3)
// ---------------------------------------------------------------------------

/// Build the `server_name` extension as sent in ClientHello.
/// Format: server_name_list_length(2) || name_type(1) || host_name_length(2) || host_name
pub fn build_server_name(hostname: &str) -> Extension {
    let name = hostname.as_bytes();
    let entry_len = 1 + 2 + name.len();
    let mut data = Vec::with_capacity(2 + entry_len);
    data.extend_from_slice(&(entry_len as u16).to_be_bytes());
    data.push(0); // host_name
    data.extend_from_slice(&(name.len() as u16).to_be_bytes());
    data.extend_from_slice(name);
    Extension {
        extension_type: ExtensionType::SERVER_NAME,
        data,
    }
}

/// Parse the host name out of a ClientHello `server_name` extension.
pub fn parse_server_name(data: &[u8]) -> Result<Vec<u8>, SessionError> {
    if data.len() < 2 {
        return Err(malformed("SNI: too short"));
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + list_len || list_len < 3 {
        return Err(malformed("SNI: bad list length"));
    }
    let name_type = data[2];
    if name_type != 0 {
        return Err(SessionError::MalformedData(format!(
            "SNI: unsupported name type {name_type}"
        )));
    }
    let name_len = u16::from_be_bytes([data[3], data[4]]) as usize;
    data.get(5..5 + name_len)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| malformed("SNI: name truncated"))
}

// ---------------------------------------------------------------------------
// ALPN (RFC 7301)
// ---------------------------------------------------------------------------

/// ALPN extension offering `protocols` in order of preference.
///
/// Names must be 1 to 255 bytes (RFC 7301 §3.1); others cannot be encoded
/// and are left out of the list.
pub fn build_alpn<I, P>(protocols: I) -> Extension
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut data = vec![0, 0];
    for proto in protocols {
        let name = proto.as_ref();
        if let Ok(len @ 1..=u8::MAX) = u8::try_from(name.len()) {
            data.push(len);
            data.extend_from_slice(name);
        }
    }
    let list_len = (data.len() - 2) as u16;
    data[..2].copy_from_slice(&list_len.to_be_bytes());
    Extension {
        extension_type: ExtensionType::APPLICATION_LAYER_PROTOCOL_NEGOTIATION,
        data,
    }
}

/// Parse the ALPN protocol list offered in ClientHello.
pub fn parse_alpn_list(data: &[u8]) -> Result<Vec<Vec<u8>>, SessionError> {
    if data.len() < 2 {
        return Err(malformed("ALPN: too short"));
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + list_len {
        return Err(malformed("ALPN: bad list length"));
    }
    let mut protos = Vec::new();
    let mut rest = &data[2..];
    while let Some((&proto_len, tail)) = rest.split_first() {
        let proto_len = proto_len as usize;
        if proto_len == 0 || tail.len() < proto_len {
            return Err(malformed("ALPN: protocol truncated"));
        }
        let (proto, tail) = tail.split_at(proto_len);
        protos.push(proto.to_vec());
        rest = tail;
    }
    Ok(protos)
}

// ---------------------------------------------------------------------------
// Extended Master Secret (RFC 7627)
// ---------------------------------------------------------------------------

/// Build the `extended_master_secret` extension. Empty; presence signals EMS.
pub fn build_extended_master_secret() -> Extension {
    Extension {
        extension_type: ExtensionType::EXTENDED_MASTER_SECRET,
        data: vec![],
    }
}
