//! Minimal FITS image writer
//!
//! Writes a primary HDU followed by IMAGE extensions. Only what the snapshot
//! record needs is supported: 1-D and 2-D float arrays (`BITPIX` -32/-64)
//! and fixed-format header cards. Layout per the FITS standard: 80-byte
//! ASCII cards, header and data each padded to 2880-byte blocks, data in
//! big-endian byte order.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

pub const BLOCK: usize = 2880;
pub const CARD: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Logical(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    fn render(&self) -> String {
        match self {
            Value::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
            Value::Int(i) => format!("{:>20}", i),
            Value::Float(f) => format!("{:>20}", format!("{:.10E}", f)),
            Value::Text(s) => {
                // Quotes are escaped by doubling; the string is padded to 8 chars
                let escaped = s.replace('\'', "''");
                format!("'{:<8}'", escaped)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    keyword: String,
    value: Value,
    comment: Option<String>,
}

impl Card {
    pub fn new(keyword: &str, value: Value) -> Self {
        Self {
            keyword: keyword.to_ascii_uppercase(),
            value,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// The 80-column card image
    pub fn render(&self) -> String {
        let mut line = format!("{:<8}= {}", self.keyword, self.value.render());
        if let Some(comment) = &self.comment {
            line.push_str(" / ");
            line.push_str(comment);
        }
        let mut line: String = line
            .chars()
            .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
            .take(CARD)
            .collect();
        while line.len() < CARD {
            line.push(' ');
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ImageData {
    fn bitpix(&self) -> i64 {
        match self {
            ImageData::F32(_) => -32,
            ImageData::F64(_) => -64,
        }
    }

    fn len(&self) -> usize {
        match self {
            ImageData::F32(v) => v.len(),
            ImageData::F64(v) => v.len(),
        }
    }

    fn byte_len(&self) -> usize {
        match self {
            ImageData::F32(v) => v.len() * 4,
            ImageData::F64(v) => v.len() * 8,
        }
    }
}

/// One header-data unit
///
/// `shape` lists axis lengths fastest-varying first, i.e. `NAXIS1` is
/// `shape[0]`. A row-major `rows × cols` matrix has shape `[cols, rows]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHdu {
    pub name: Option<String>,
    pub shape: Vec<usize>,
    pub data: ImageData,
    pub cards: Vec<Card>,
}

impl ImageHdu {
    pub fn new(shape: Vec<usize>, data: ImageData) -> Self {
        Self {
            name: None,
            shape,
            data,
            cards: Vec::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn card(mut self, card: Card) -> Self {
        self.cards.push(card);
        self
    }

    fn header(&self, primary: bool) -> Vec<Card> {
        let mut cards = Vec::with_capacity(8 + self.cards.len());
        if primary {
            cards.push(Card::new("SIMPLE", Value::Logical(true)).with_comment("conforms to FITS standard"));
        } else {
            cards.push(Card::new("XTENSION", Value::Text("IMAGE".to_string())).with_comment("image extension"));
        }
        cards.push(Card::new("BITPIX", Value::Int(self.data.bitpix())).with_comment("IEEE floating point"));
        cards.push(Card::new("NAXIS", Value::Int(self.shape.len() as i64)));
        for (i, len) in self.shape.iter().enumerate() {
            cards.push(Card::new(&format!("NAXIS{}", i + 1), Value::Int(*len as i64)));
        }
        if primary {
            cards.push(Card::new("EXTEND", Value::Logical(true)));
        } else {
            cards.push(Card::new("PCOUNT", Value::Int(0)));
            cards.push(Card::new("GCOUNT", Value::Int(1)));
        }
        if let Some(name) = &self.name {
            cards.push(Card::new("EXTNAME", Value::Text(name.clone())));
        }
        cards.extend(self.cards.iter().cloned());
        cards
    }
}

/// Write `hdus` as one FITS file; the first becomes the primary HDU
pub fn write_fits<W: Write>(out: &mut W, hdus: &[ImageHdu]) -> io::Result<()> {
    for (i, hdu) in hdus.iter().enumerate() {
        let expected: usize = hdu.shape.iter().product();
        if expected != hdu.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "HDU {} shape {:?} does not match {} data values",
                    i,
                    hdu.shape,
                    hdu.data.len()
                ),
            ));
        }
        write_header(out, &hdu.header(i == 0))?;
        write_data(out, &hdu.data)?;
    }
    Ok(())
}

fn write_header<W: Write>(out: &mut W, cards: &[Card]) -> io::Result<()> {
    let mut written = 0;
    for card in cards {
        out.write_all(card.render().as_bytes())?;
        written += CARD;
    }
    out.write_all(format!("{:<80}", "END").as_bytes())?;
    written += CARD;
    pad(out, written, b' ')
}

fn write_data<W: Write>(out: &mut W, data: &ImageData) -> io::Result<()> {
    match data {
        ImageData::F32(values) => {
            for &v in values {
                out.write_f32::<BigEndian>(v)?;
            }
        }
        ImageData::F64(values) => {
            for &v in values {
                out.write_f64::<BigEndian>(v)?;
            }
        }
    }
    pad(out, data.byte_len(), 0)
}

fn pad<W: Write>(out: &mut W, written: usize, fill: u8) -> io::Result<()> {
    let remainder = written % BLOCK;
    if remainder != 0 {
        out.write_all(&vec![fill; BLOCK - remainder])?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::ByteOrder;

    /// Parse the cards of the header starting at `offset`; returns the cards
    /// and the offset of the data that follows
    pub(crate) fn read_header(bytes: &[u8], offset: usize) -> (Vec<String>, usize) {
        let mut cards = Vec::new();
        let mut pos = offset;
        loop {
            let card = std::str::from_utf8(&bytes[pos..pos + CARD]).unwrap().to_string();
            pos += CARD;
            if card.trim_end() == "END" {
                break;
            }
            cards.push(card);
        }
        let consumed = pos - offset;
        let padded = consumed.div_ceil(BLOCK) * BLOCK;
        (cards, offset + padded)
    }

    pub(crate) fn card_value<'a>(cards: &'a [String], keyword: &str) -> Option<&'a str> {
        cards
            .iter()
            .find(|c| c[..8].trim_end() == keyword)
            .map(|c| c[10..].split(" / ").next().unwrap_or("").trim())
    }

    #[test]
    fn test_card_layout() {
        let card = Card::new("naxis1", Value::Int(42)).render();
        assert_eq!(card.len(), 80);
        assert_eq!(&card[..10], "NAXIS1  = ");
        assert_eq!(card[10..30].trim_start(), "42");

        let text = Card::new("EXTNAME", Value::Text("FREQ".to_string())).render();
        assert_eq!(&text[10..20], "'FREQ    '");

        let quoted = Card::new("SITE", Value::Text("O'Hare".to_string())).render();
        assert!(quoted.contains("'O''Hare '"));
    }

    #[test]
    fn test_blocks_and_big_endian_data() {
        let hdus = vec![
            ImageHdu::new(vec![3], ImageData::F64(vec![-2.0, -1.0, 0.0]))
                .card(Card::new("FS", Value::Int(1000))),
            ImageHdu::new(vec![2, 2], ImageData::F32(vec![1.0, f32::NAN, 3.0, 4.0])).named("DATA"),
        ];
        let mut bytes = Vec::new();
        write_fits(&mut bytes, &hdus).unwrap();
        assert_eq!(bytes.len() % BLOCK, 0);
        assert_eq!(bytes.len(), 4 * BLOCK);

        let (primary, data_at) = read_header(&bytes, 0);
        assert_eq!(card_value(&primary, "SIMPLE"), Some("T"));
        assert_eq!(card_value(&primary, "BITPIX"), Some("-64"));
        assert_eq!(card_value(&primary, "NAXIS1"), Some("3"));
        assert_eq!(card_value(&primary, "FS"), Some("1000"));
        assert_eq!(BigEndian::read_f64(&bytes[data_at..]), -2.0);

        let (ext, ext_data) = read_header(&bytes, 2 * BLOCK);
        assert_eq!(card_value(&ext, "XTENSION"), Some("'IMAGE   '"));
        assert_eq!(card_value(&ext, "EXTNAME"), Some("'DATA    '"));
        assert_eq!(card_value(&ext, "NAXIS2"), Some("2"));
        assert_eq!(BigEndian::read_f32(&bytes[ext_data..]), 1.0);
        assert!(BigEndian::read_f32(&bytes[ext_data + 4..]).is_nan());
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let hdu = ImageHdu::new(vec![4], ImageData::F32(vec![1.0]));
        let mut bytes = Vec::new();
        assert!(write_fits(&mut bytes, &[hdu]).is_err());
    }
}
