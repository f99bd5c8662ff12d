//! Little-endian single-image TIFF layout.
//!
//! The file is written as: header, IFD, out-of-line field values in tag
//! order, then one pixel strip. Every out-of-line value starts at an offset
//! aligned to its element size and the strip is aligned to 4 bytes.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::EncodeError;

pub const IMAGE_WIDTH: u16 = 256;
pub const IMAGE_LENGTH: u16 = 257;
pub const BITS_PER_SAMPLE: u16 = 258;
pub const COMPRESSION: u16 = 259;
pub const PHOTOMETRIC_INTERPRETATION: u16 = 262;
pub const IMAGE_DESCRIPTION: u16 = 270;
pub const STRIP_OFFSETS: u16 = 273;
pub const SAMPLES_PER_PIXEL: u16 = 277;
pub const ROWS_PER_STRIP: u16 = 278;
pub const STRIP_BYTE_COUNTS: u16 = 279;
pub const X_RESOLUTION: u16 = 282;
pub const Y_RESOLUTION: u16 = 283;
pub const PLANAR_CONFIGURATION: u16 = 284;
pub const RESOLUTION_UNIT: u16 = 296;
pub const EXTRA_SAMPLES: u16 = 338;
pub const SAMPLE_FORMAT: u16 = 339;
pub const MODEL_PIXEL_SCALE: u16 = 33550;
pub const MODEL_TIEPOINT: u16 = 33922;
pub const GEO_KEY_DIRECTORY: u16 = 34735;
pub const GDAL_NODATA: u16 = 42113;

const HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Ascii = 2,
    Short = 3,
    Long = 4,
    Rational = 5,
    Double = 12,
}

impl FieldType {
    fn element_size(self) -> usize {
        match self {
            FieldType::Ascii => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational => 8,
            FieldType::Double => 8,
        }
    }

    fn alignment(self) -> usize {
        match self {
            // TIFF word boundary
            FieldType::Ascii => 2,
            FieldType::Short => 2,
            FieldType::Long | FieldType::Rational => 4,
            FieldType::Double => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<(u32, u32)>),
    Double(Vec<f64>),
}

impl Value {
    fn field_type(&self) -> FieldType {
        match self {
            Value::Ascii(_) => FieldType::Ascii,
            Value::Short(_) => FieldType::Short,
            Value::Long(_) => FieldType::Long,
            Value::Rational(_) => FieldType::Rational,
            Value::Double(_) => FieldType::Double,
        }
    }

    fn count(&self) -> usize {
        match self {
            // trailing NUL
            Value::Ascii(text) => text.len() + 1,
            Value::Short(values) => values.len(),
            Value::Long(values) => values.len(),
            Value::Rational(values) => values.len(),
            Value::Double(values) => values.len(),
        }
    }

    fn byte_len(&self) -> usize {
        self.count() * self.field_type().element_size()
    }

    fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        match self {
            Value::Ascii(text) => {
                out.write_all(text.as_bytes())?;
                out.write_u8(0)
            }
            Value::Short(values) => values
                .iter()
                .try_for_each(|&v| out.write_u16::<LittleEndian>(v)),
            Value::Long(values) => values
                .iter()
                .try_for_each(|&v| out.write_u32::<LittleEndian>(v)),
            Value::Rational(values) => values.iter().try_for_each(|&(num, den)| {
                out.write_u32::<LittleEndian>(num)?;
                out.write_u32::<LittleEndian>(den)
            }),
            Value::Double(values) => values
                .iter()
                .try_for_each(|&v| out.write_f64::<LittleEndian>(v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub tag: u16,
    pub value: Value,
}

impl Entry {
    pub fn short(tag: u16, value: u16) -> Self {
        Self::shorts(tag, vec![value])
    }

    pub fn shorts(tag: u16, values: Vec<u16>) -> Self {
        Self {
            tag,
            value: Value::Short(values),
        }
    }

    pub fn long(tag: u16, value: u32) -> Self {
        Self {
            tag,
            value: Value::Long(vec![value]),
        }
    }

    pub fn rational(tag: u16, numerator: u32, denominator: u32) -> Self {
        Self {
            tag,
            value: Value::Rational(vec![(numerator, denominator)]),
        }
    }

    pub fn doubles(tag: u16, values: Vec<f64>) -> Self {
        Self {
            tag,
            value: Value::Double(values),
        }
    }

    pub fn ascii(tag: u16, text: impl Into<String>) -> Self {
        Self {
            tag,
            value: Value::Ascii(text.into()),
        }
    }

    fn is_inline(&self) -> bool {
        self.value.byte_len() <= 4
    }
}

/// Tag set of a single-strip image. Strip location fields are added by
/// [`Directory::write`].
#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: Vec<Entry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: Entry) -> &mut Self {
        self.entries.retain(|existing| existing.tag != entry.tag);
        self.entries.push(entry);
        self
    }

    /// Serializes the directory followed by `strip` into a complete TIFF file.
    pub fn write(&self, strip: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let mut entries = self.entries.clone();
        // Placeholders: both are single LONGs, so they stay inline and their
        // final values do not move any other field.
        entries.retain(|e| e.tag != STRIP_OFFSETS && e.tag != STRIP_BYTE_COUNTS);
        entries.push(Entry::long(STRIP_OFFSETS, 0));
        entries.push(Entry::long(STRIP_BYTE_COUNTS, 0));
        entries.sort_by_key(|e| e.tag);

        let ifd_len = 2 + entries.len() * ENTRY_LEN + 4;
        let mut cursor = HEADER_LEN + ifd_len;
        let mut offsets = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.is_inline() {
                offsets.push(None);
            } else {
                cursor = align(cursor, entry.value.field_type().alignment());
                offsets.push(Some(cursor));
                cursor += entry.value.byte_len();
            }
        }
        let strip_offset = align(cursor, 4);
        let total_len = strip_offset + strip.len();
        if u32::try_from(total_len).is_err() {
            return Err(EncodeError::TooLarge(total_len));
        }

        for entry in &mut entries {
            match entry.tag {
                STRIP_OFFSETS => entry.value = Value::Long(vec![strip_offset as u32]),
                STRIP_BYTE_COUNTS => entry.value = Value::Long(vec![strip.len() as u32]),
                _ => {}
            }
        }

        let mut out = Vec::with_capacity(total_len);
        out.write_all(b"II")?;
        out.write_u16::<LittleEndian>(42)?;
        out.write_u32::<LittleEndian>(HEADER_LEN as u32)?;

        out.write_u16::<LittleEndian>(entries.len() as u16)?;
        for (entry, offset) in entries.iter().zip(&offsets) {
            out.write_u16::<LittleEndian>(entry.tag)?;
            out.write_u16::<LittleEndian>(entry.value.field_type() as u16)?;
            out.write_u32::<LittleEndian>(entry.value.count() as u32)?;
            match offset {
                Some(offset) => out.write_u32::<LittleEndian>(*offset as u32)?,
                None => {
                    let mut inline = Vec::with_capacity(4);
                    entry.value.write_to(&mut inline)?;
                    inline.resize(4, 0);
                    out.write_all(&inline)?;
                }
            }
        }
        // no further IFDs
        out.write_u32::<LittleEndian>(0)?;

        for (entry, offset) in entries.iter().zip(&offsets) {
            if let Some(offset) = offset {
                out.resize(*offset, 0);
                entry.value.write_to(&mut out)?;
            }
        }
        out.resize(strip_offset, 0);
        out.write_all(strip)?;

        Ok(out)
    }
}

fn align(offset: usize, alignment: usize) -> usize {
    offset.div_ceil(alignment) * alignment
}
