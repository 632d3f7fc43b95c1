//! Streaming decoder for Android binary XML (`AndroidManifest.xml` as stored in an APK).
//!
//! [`BinaryXmlEvents`] walks the chunk stream once and yields start-element, attribute
//! and end-element events in document order. Nothing beyond the string pool and the
//! stack of open element names is kept in memory.

use log::{debug, trace};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;

pub(crate) const RES_XML_TYPE: u16 = 0x0003;
pub(crate) const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub(crate) const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;
pub(crate) const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub(crate) const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub(crate) const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub(crate) const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub(crate) const RES_XML_CDATA_TYPE: u16 = 0x0104;

pub(crate) const NO_ENTRY_INDEX: u32 = 0xFFFF_FFFF;
pub(crate) const STRING_FLAG_UTF8: u32 = 0x0000_0100;

pub const TYPE_NULL: u8 = 0x00;
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_FLOAT: u8 = 0x04;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;

// `Res_value.data` for TYPE_NULL: 0 means undefined, 1 means explicitly empty.
const DATA_NULL_EMPTY: u32 = 1;

const ATTRIBUTE_RECORD_SIZE: usize = 20;

/// Result alias for binary XML decoding.
pub type BinaryXmlResult<T> = Result<T, BinaryXmlError>;

/// Errors surfaced by the binary XML decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryXmlError {
    /// The document is missing the expected structure.
    MalformedDocument(String),
}

impl BinaryXmlError {
    fn malformed(msg: impl Into<String>) -> Self {
        BinaryXmlError::MalformedDocument(msg.into())
    }
}

impl fmt::Display for BinaryXmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryXmlError::MalformedDocument(msg) => write!(f, "Malformed manifest: {msg}"),
        }
    }
}

impl std::error::Error for BinaryXmlError {}

/// Typed attribute value as stored in the binary document.
///
/// Resource references are not resolved; the raw resource id is carried as is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ManifestValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Hex(u32),
    Reference(u32),
}

impl ManifestValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ManifestValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ManifestValue::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_reference_id(&self) -> Option<u32> {
        match self {
            ManifestValue::Reference(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for ManifestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestValue::String(text) => f.write_str(text),
            ManifestValue::Boolean(flag) => write!(f, "{flag}"),
            ManifestValue::Integer(num) => write!(f, "{num}"),
            ManifestValue::Hex(value) => write!(f, "0x{value:x}"),
            ManifestValue::Reference(id) => write!(f, "@0x{id:08x}"),
        }
    }
}

impl From<&str> for ManifestValue {
    fn from(value: &str) -> Self {
        ManifestValue::String(value.to_owned())
    }
}

impl From<String> for ManifestValue {
    fn from(value: String) -> Self {
        ManifestValue::String(value)
    }
}

impl From<bool> for ManifestValue {
    fn from(value: bool) -> Self {
        ManifestValue::Boolean(value)
    }
}

/// One attribute record of a start-element chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeEvent {
    pub namespace: Option<String>,
    pub name: String,
    pub resource_id: Option<u32>,
    pub type_tag: u8,
    /// `None` when the record holds an undefined (`TYPE_NULL`) value.
    pub value: Option<ManifestValue>,
}

/// Structural events in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement {
        namespace: Option<String>,
        name: String,
    },
    Attribute(AttributeEvent),
    EndElement {
        namespace: Option<String>,
        name: String,
    },
}

struct ChunkHeader {
    chunk_type: u16,
    header_size: u16,
    chunk_size: u32,
    start: usize,
}

impl ChunkHeader {
    fn end(&self) -> usize {
        self.start + self.chunk_size as usize
    }

    fn body_start(&self) -> usize {
        self.start + self.header_size as usize
    }
}

struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BinaryReader { data, pos: 0 }
    }

    /// A reader over the same bytes that cannot read past `end`.
    fn bounded(&self, end: usize) -> BinaryReader<'a> {
        BinaryReader {
            data: &self.data[..end.min(self.data.len())],
            pos: self.pos,
        }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn take<const N: usize>(&mut self) -> BinaryXmlResult<[u8; N]> {
        let end = self
            .pos
            .checked_add(N)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                BinaryXmlError::malformed(format!(
                    "Unexpected end of binary XML at offset {}",
                    self.pos
                ))
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    fn read_u8(&mut self) -> BinaryXmlResult<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn read_u16(&mut self) -> BinaryXmlResult<u16> {
        Ok(u16::from_le_bytes(self.take::<2>()?))
    }

    fn read_u32(&mut self) -> BinaryXmlResult<u32> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    fn seek(&mut self, offset: usize) -> BinaryXmlResult<()> {
        if offset > self.data.len() {
            return Err(BinaryXmlError::malformed(
                "Attempted to seek past end of chunk",
            ));
        }
        self.pos = offset;
        Ok(())
    }
}

struct StringPool {
    strings: Vec<String>,
}

impl StringPool {
    fn parse(data: &[u8], header: &ChunkHeader) -> BinaryXmlResult<Self> {
        let chunk_end = header.end();
        let mut reader = BinaryReader::new(&data[..chunk_end]);
        reader.seek(header.start + 8)?;
        let string_count = reader.read_u32()? as usize;
        let _style_count = reader.read_u32()?;
        let flags = reader.read_u32()?;
        let strings_start = reader.read_u32()? as usize;
        let _styles_start = reader.read_u32()?;

        let is_utf8 = (flags & STRING_FLAG_UTF8) != 0;

        reader.seek(header.body_start())?;
        if string_count > reader.remaining() / 4 {
            return Err(BinaryXmlError::malformed(
                "String pool offset table exceeds chunk bounds",
            ));
        }
        let mut string_offsets = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            string_offsets.push(reader.read_u32()? as usize);
        }

        let strings_base = header.start + strings_start;
        let mut strings = Vec::with_capacity(string_count);
        for offset in string_offsets {
            let absolute = strings_base.checked_add(offset).ok_or_else(|| {
                BinaryXmlError::malformed("String offset overflow")
            })?;
            let text = if is_utf8 {
                read_utf8_string(data, absolute, chunk_end)?
            } else {
                read_utf16_string(data, absolute, chunk_end)?
            };
            strings.push(text);
        }

        trace!(
            "string pool: {} {} strings",
            strings.len(),
            if is_utf8 { "UTF-8" } else { "UTF-16" }
        );
        Ok(StringPool { strings })
    }

    fn get(&self, idx: u32) -> Option<&str> {
        if idx == NO_ENTRY_INDEX {
            return None;
        }
        self.strings.get(idx as usize).map(|s| s.as_str())
    }

    /// Like [`StringPool::get`], but an index that is neither "no entry" nor in range is an error.
    fn lookup(&self, idx: u32, what: &str) -> BinaryXmlResult<Option<&str>> {
        if idx == NO_ENTRY_INDEX {
            return Ok(None);
        }
        self.get(idx).map(Some).ok_or_else(|| {
            BinaryXmlError::malformed(format!("{what} references invalid string index {idx}"))
        })
    }

    fn require(&self, idx: u32, what: &str) -> BinaryXmlResult<&str> {
        self.lookup(idx, what)?.ok_or_else(|| {
            BinaryXmlError::malformed(format!("{what} is missing its string index"))
        })
    }
}

fn read_utf8_string(data: &[u8], offset: usize, limit: usize) -> BinaryXmlResult<String> {
    let mut cursor = offset;
    if cursor >= limit {
        return Err(BinaryXmlError::malformed(
            "String offset exceeds chunk bounds",
        ));
    }
    // UTF-16 length first, then the encoded byte length; only the latter is needed.
    let (_, len_bytes) = read_utf8_length(data, cursor, limit)?;
    cursor += len_bytes;
    let (byte_len, byte_len_size) = read_utf8_length(data, cursor, limit)?;
    cursor += byte_len_size;
    if cursor + byte_len > limit {
        return Err(BinaryXmlError::malformed(
            "UTF-8 string exceeds chunk bounds",
        ));
    }
    let slice = &data[cursor..cursor + byte_len];
    cursor += byte_len;
    if cursor >= limit {
        return Err(BinaryXmlError::malformed("Missing UTF-8 terminator"));
    }
    // Older aapt releases wrote Java modified UTF-8 for supplementary characters.
    let text = std::str::from_utf8(slice)
        .map(Cow::Borrowed)
        .or_else(|_| cesu8::from_java_cesu8(slice))
        .map_err(|_| BinaryXmlError::malformed("String pool entry is not valid UTF-8"))?;
    Ok(text.into_owned())
}

fn read_utf16_string(data: &[u8], offset: usize, limit: usize) -> BinaryXmlResult<String> {
    let mut cursor = offset;
    let (char_count, header_bytes) = read_utf16_length(data, cursor, limit)?;
    cursor += header_bytes;
    let byte_len = char_count * 2;
    if cursor + byte_len > limit {
        return Err(BinaryXmlError::malformed(
            "UTF-16 string exceeds chunk bounds",
        ));
    }
    let units: Vec<u16> = data[cursor..cursor + byte_len]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    cursor += byte_len;
    if cursor + 2 > limit {
        return Err(BinaryXmlError::malformed("Missing UTF-16 terminator"));
    }
    if u16::from_le_bytes([data[cursor], data[cursor + 1]]) != 0 {
        return Err(BinaryXmlError::malformed(
            "UTF-16 string missing terminator",
        ));
    }
    String::from_utf16(&units).map_err(|err| BinaryXmlError::malformed(err.to_string()))
}

fn read_utf8_length(data: &[u8], offset: usize, limit: usize) -> BinaryXmlResult<(usize, usize)> {
    if offset >= limit {
        return Err(BinaryXmlError::malformed("Invalid UTF-8 length offset"));
    }
    let first = data[offset];
    if (first & 0x80) == 0 {
        Ok((first as usize, 1))
    } else {
        if offset + 1 >= limit {
            return Err(BinaryXmlError::malformed("Truncated UTF-8 length"));
        }
        let second = data[offset + 1];
        let length = (((first & 0x7F) as usize) << 8) | second as usize;
        Ok((length, 2))
    }
}

fn read_utf16_length(data: &[u8], offset: usize, limit: usize) -> BinaryXmlResult<(usize, usize)> {
    if offset + 2 > limit {
        return Err(BinaryXmlError::malformed("Invalid UTF-16 length offset"));
    }
    let first = u16::from_le_bytes([data[offset], data[offset + 1]]);
    if (first & 0x8000) == 0 {
        Ok((first as usize, 2))
    } else {
        if offset + 4 > limit {
            return Err(BinaryXmlError::malformed("Truncated UTF-16 length"));
        }
        let second = u16::from_le_bytes([data[offset + 2], data[offset + 3]]);
        let length = (((first & 0x7FFF) as usize) << 16) | second as usize;
        Ok((length, 4))
    }
}

fn read_chunk_header(reader: &mut BinaryReader<'_>, limit: usize) -> BinaryXmlResult<ChunkHeader> {
    let start = reader.position();
    if reader.remaining() < 8 {
        return Err(BinaryXmlError::malformed(
            "Truncated binary XML chunk header",
        ));
    }
    let chunk_type = reader.read_u16()?;
    let header_size = reader.read_u16()?;
    let chunk_size = reader.read_u32()?;
    if header_size < 8 || chunk_size < header_size as u32 {
        return Err(BinaryXmlError::malformed(format!(
            "Invalid sizing for chunk 0x{chunk_type:04x} at offset {start}"
        )));
    }
    let end = start
        .checked_add(chunk_size as usize)
        .ok_or_else(|| BinaryXmlError::malformed("Chunk size overflow"))?;
    if end > limit {
        return Err(BinaryXmlError::malformed(format!(
            "Chunk 0x{chunk_type:04x} at offset {start} extends past end of document"
        )));
    }
    Ok(ChunkHeader {
        chunk_type,
        header_size,
        chunk_size,
        start,
    })
}

fn decode_value(
    strings: &StringPool,
    raw_value_idx: u32,
    data_type: u8,
    data: u32,
) -> BinaryXmlResult<Option<ManifestValue>> {
    if let Some(raw) = strings.lookup(raw_value_idx, "Attribute raw value")? {
        return Ok(Some(ManifestValue::String(raw.to_string())));
    }

    let value = match data_type {
        TYPE_NULL if data == DATA_NULL_EMPTY => ManifestValue::String(String::new()),
        TYPE_NULL => return Ok(None),
        TYPE_STRING => {
            ManifestValue::String(strings.require(data, "String attribute value")?.to_string())
        }
        TYPE_REFERENCE => ManifestValue::Reference(data),
        TYPE_INT_BOOLEAN => ManifestValue::Boolean(data != 0),
        TYPE_INT_DEC => ManifestValue::Integer(i64::from(data as i32)),
        TYPE_INT_HEX => ManifestValue::Hex(data),
        TYPE_FLOAT => ManifestValue::String(f32::from_bits(data).to_string()),
        _ => ManifestValue::Hex(data),
    };
    Ok(Some(value))
}

struct OpenElement {
    namespace: Option<String>,
    name: String,
}

/// Pull-based event stream over a binary XML document.
///
/// Yields [`XmlEvent`]s in document order. The first error ends the stream.
///
/// ```no_run
/// use apk_manifest_props::android::binary_xml::{BinaryXmlEvents, XmlEvent};
///
/// let bytes = std::fs::read("AndroidManifest.xml").unwrap();
/// for event in BinaryXmlEvents::new(&bytes).unwrap() {
///     if let XmlEvent::StartElement { name, .. } = event.unwrap() {
///         println!("<{name}>");
///     }
/// }
/// ```
pub struct BinaryXmlEvents<'a> {
    reader: BinaryReader<'a>,
    xml_end: usize,
    strings: Option<StringPool>,
    resource_map: Vec<u32>,
    namespace_depth: usize,
    open_elements: Vec<OpenElement>,
    pending: VecDeque<XmlEvent>,
    finished: bool,
}

impl<'a> BinaryXmlEvents<'a> {
    pub fn new(bytes: &'a [u8]) -> BinaryXmlResult<Self> {
        let mut reader = BinaryReader::new(bytes);
        let xml_header = read_chunk_header(&mut reader, bytes.len())?;
        if xml_header.chunk_type != RES_XML_TYPE {
            return Err(BinaryXmlError::malformed(format!(
                "Binary XML does not start with RES_XML_TYPE header (found 0x{:04x})",
                xml_header.chunk_type
            )));
        }
        reader.seek(xml_header.body_start())?;
        Ok(BinaryXmlEvents {
            reader,
            xml_end: xml_header.end(),
            strings: None,
            resource_map: Vec::new(),
            namespace_depth: 0,
            open_elements: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        })
    }

    /// Number of elements currently open.
    pub fn depth(&self) -> usize {
        self.open_elements.len()
    }

    fn advance(&mut self) -> BinaryXmlResult<Option<XmlEvent>> {
        while self.reader.position() < self.xml_end {
            let header = read_chunk_header(&mut self.reader, self.xml_end)?;
            let event = match header.chunk_type {
                RES_STRING_POOL_TYPE => {
                    self.strings = Some(StringPool::parse(self.reader.data, &header)?);
                    None
                }
                RES_XML_RESOURCE_MAP_TYPE => {
                    self.read_resource_map(&header)?;
                    None
                }
                RES_XML_START_NAMESPACE_TYPE => {
                    self.string_pool("Namespace chunk")?;
                    self.namespace_depth += 1;
                    None
                }
                RES_XML_END_NAMESPACE_TYPE => {
                    self.namespace_depth = self.namespace_depth.checked_sub(1).ok_or_else(|| {
                        BinaryXmlError::malformed("End namespace without matching start")
                    })?;
                    None
                }
                RES_XML_START_ELEMENT_TYPE => Some(self.read_start_element(&header)?),
                RES_XML_END_ELEMENT_TYPE => Some(self.read_end_element(&header)?),
                RES_XML_CDATA_TYPE => {
                    self.string_pool("CDATA chunk")?;
                    None
                }
                other => {
                    debug!("skipping unknown binary XML chunk 0x{other:04x} at offset {}", header.start);
                    None
                }
            };
            self.reader.seek(header.end())?;
            if event.is_some() {
                return Ok(event);
            }
        }

        if let Some(open) = self.open_elements.last() {
            return Err(BinaryXmlError::malformed(format!(
                "Unclosed element <{}> at end of document",
                open.name
            )));
        }
        Ok(None)
    }

    fn string_pool(&self, what: &str) -> BinaryXmlResult<&StringPool> {
        self.strings.as_ref().ok_or_else(|| {
            BinaryXmlError::malformed(format!("{what} encountered before string pool"))
        })
    }

    fn read_resource_map(&mut self, header: &ChunkHeader) -> BinaryXmlResult<()> {
        let mut reader = self.reader.bounded(header.end());
        reader.seek(header.body_start())?;
        let mut ids = Vec::with_capacity(reader.remaining() / 4);
        while reader.remaining() >= 4 {
            ids.push(reader.read_u32()?);
        }
        self.resource_map = ids;
        Ok(())
    }

    fn read_start_element(&mut self, header: &ChunkHeader) -> BinaryXmlResult<XmlEvent> {
        let pool = self.string_pool("Start element")?;
        let mut reader = self.reader.bounded(header.end());
        reader.seek(header.body_start())?;

        let ns_idx = reader.read_u32()?;
        let name_idx = reader.read_u32()?;
        let attribute_start = reader.read_u16()? as usize;
        let attribute_size = reader.read_u16()? as usize;
        let attr_count = reader.read_u16()? as usize;
        reader.read_u16()?; // idIndex
        reader.read_u16()?; // classIndex
        reader.read_u16()?; // styleIndex

        if attr_count > 0 && attribute_size < ATTRIBUTE_RECORD_SIZE {
            return Err(BinaryXmlError::malformed(format!(
                "Attribute record size {attribute_size} is too small"
            )));
        }

        let name = pool.require(name_idx, "Element name")?.to_string();
        let namespace = pool.lookup(ns_idx, "Element namespace")?.map(str::to_string);

        let attrs_base = header.body_start() + attribute_start;
        let mut attributes = Vec::with_capacity(attr_count);
        for idx in 0..attr_count {
            reader.seek(attrs_base + idx * attribute_size)?;
            let attr_ns_idx = reader.read_u32()?;
            let attr_name_idx = reader.read_u32()?;
            let raw_value_idx = reader.read_u32()?;
            let value_size = reader.read_u16()?;
            reader.read_u8()?; // res0
            let type_tag = reader.read_u8()?;
            let data = reader.read_u32()?;
            if value_size != 8 {
                return Err(BinaryXmlError::malformed(format!(
                    "Attribute value size must be 8, found {value_size}"
                )));
            }
            let resource_id = self
                .resource_map
                .get(attr_name_idx as usize)
                .copied()
                .filter(|id| *id != 0);
            attributes.push(AttributeEvent {
                namespace: pool.lookup(attr_ns_idx, "Attribute namespace")?.map(str::to_string),
                name: pool.require(attr_name_idx, "Attribute name")?.to_string(),
                resource_id,
                type_tag,
                value: decode_value(pool, raw_value_idx, type_tag, data)?,
            });
        }

        trace!("<{name}> with {} attributes", attributes.len());
        self.pending
            .extend(attributes.into_iter().map(XmlEvent::Attribute));
        self.open_elements.push(OpenElement {
            namespace: namespace.clone(),
            name: name.clone(),
        });
        Ok(XmlEvent::StartElement { namespace, name })
    }

    fn read_end_element(&mut self, header: &ChunkHeader) -> BinaryXmlResult<XmlEvent> {
        let pool = self.string_pool("End element")?;
        let mut reader = self.reader.bounded(header.end());
        reader.seek(header.body_start())?;
        let _ns_idx = reader.read_u32()?;
        let name_idx = reader.read_u32()?;
        let name = pool.require(name_idx, "End element name")?.to_string();

        let open = self.open_elements.pop().ok_or_else(|| {
            BinaryXmlError::malformed(format!("End element </{name}> without matching start"))
        })?;
        if open.name != name {
            return Err(BinaryXmlError::malformed(format!(
                "End element </{name}> does not close <{}>",
                open.name
            )));
        }
        trace!("</{name}>");
        Ok(XmlEvent::EndElement {
            namespace: open.namespace,
            name: open.name,
        })
    }
}

impl Iterator for BinaryXmlEvents<'_> {
    type Item = BinaryXmlResult<XmlEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(Ok(event));
        }
        if self.finished {
            return None;
        }
        match self.advance() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                self.pending.clear();
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for BinaryXmlEvents<'_> {}
