//! Tag model and the lazy address-option parser.
//!
//! Addresses are opaque, device-specific strings (e.g. `1!400001.B`). Rather than
//! re-parsing the string on every poll, we parse the optional suffix once into a
//! tagged `AddressOption` and cache it — the original string is always kept
//! around so the canonical suffix can be re-rendered for round-trip checks (P5).

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, NeuError, Result};
use crate::ids::TagId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian16 {
    Big,
    Little,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian32 {
    /// Big byte order, big word order.
    BB,
    /// Big byte order, little word order.
    BL,
    /// Little byte order, little word order.
    LL,
    /// Little byte order, big word order.
    LB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringSubType {
    /// High byte first.
    H,
    /// Low byte first.
    L,
    /// BCD-decoded digits.
    D,
    /// EBCDIC-encoded text.
    E,
}

/// A tag's parsed address suffix. Consulted at runtime; the raw address string
/// is always preserved alongside it for round-tripping and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressOption {
    None,
    String { length: u32, subtype: StringSubType },
    U16 { endian: Endian16 },
    U32 { endian: Endian32 },
    Bool { bit: u8 },
}

impl AddressOption {
    /// Re-render the canonical suffix (including the separator), or the empty
    /// string for `None`. Used by the P5 round-trip property test.
    pub fn render(self) -> String {
        match self {
            AddressOption::None => String::new(),
            AddressOption::String { length, subtype } => format!(".{length}{}", subtype.letter()),
            AddressOption::U16 { endian } => format!("#{}", endian.letter()),
            AddressOption::U32 { endian } => format!("#{}", endian.code()),
            AddressOption::Bool { bit } => format!(".{bit}"),
        }
    }
}

impl Endian16 {
    fn letter(self) -> char {
        match self {
            Endian16::Big => 'B',
            Endian16::Little => 'L',
        }
    }
}

impl Endian32 {
    fn code(self) -> &'static str {
        match self {
            Endian32::BB => "BB",
            Endian32::BL => "BL",
            Endian32::LL => "LL",
            Endian32::LB => "LB",
        }
    }
}

impl StringSubType {
    fn letter(self) -> char {
        match self {
            StringSubType::H => 'H',
            StringSubType::L => 'L',
            StringSubType::D => 'D',
            StringSubType::E => 'E',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'H' => Some(StringSubType::H),
            'L' => Some(StringSubType::L),
            'D' => Some(StringSubType::D),
            'E' => Some(StringSubType::E),
            _ => None,
        }
    }
}

/// Which address-option grammar a tag's type selects, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionClass {
    None,
    StringSuffix,
    U16Suffix,
    U32Suffix,
    BoolSuffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
    String,
    Bytes,
    Array,
}

impl TagType {
    fn option_class(self) -> OptionClass {
        match self {
            TagType::String => OptionClass::StringSuffix,
            TagType::U16 | TagType::I16 => OptionClass::U16Suffix,
            TagType::U32 | TagType::I32 => OptionClass::U32Suffix,
            TagType::Bool => OptionClass::BoolSuffix,
            _ => OptionClass::None,
        }
    }
}

/// Parse the optional suffix of `address` according to `tag_type`'s grammar.
///
/// Lazy by contract: callers parse once (on first tick) and cache the result
/// in `Tag::addr_option`.
pub fn parse_address_option(address: &str, tag_type: TagType) -> Result<AddressOption> {
    match tag_type.option_class() {
        OptionClass::None => Ok(AddressOption::None),
        OptionClass::StringSuffix => match address.rsplit_once('.') {
            None => Ok(AddressOption::None),
            Some((_, suffix)) => parse_string_suffix(suffix),
        },
        OptionClass::U16Suffix => match address.rsplit_once('#') {
            None => Ok(AddressOption::U16 { endian: Endian16::Little }),
            Some((_, suffix)) => parse_u16_suffix(suffix),
        },
        OptionClass::U32Suffix => match address.rsplit_once('#') {
            None => Ok(AddressOption::U32 { endian: Endian32::LL }),
            Some((_, suffix)) => parse_u32_suffix(suffix),
        },
        OptionClass::BoolSuffix => match address.rsplit_once('.') {
            None => Ok(AddressOption::Bool { bit: 0 }),
            Some((_, suffix)) => parse_bool_suffix(suffix),
        },
    }
}

fn parse_string_suffix(suffix: &str) -> Result<AddressOption> {
    let (digits, letter) = split_trailing_letter(suffix);
    let subtype = match letter {
        Some(c) => StringSubType::from_letter(c)
            .ok_or_else(|| NeuError::InvalidArgument(format!("unknown string sub-type '{c}'")))?,
        None => StringSubType::H,
    };
    let length: u32 = digits
        .parse()
        .map_err(|_| NeuError::InvalidArgument(format!("invalid string length in '.{suffix}'")))?;
    if length == 0 {
        return Err(NeuError::domain(
            ErrorCode::ParamIsWrong,
            "string address option requires length > 0",
        ));
    }
    Ok(AddressOption::String { length, subtype })
}

fn parse_u16_suffix(suffix: &str) -> Result<AddressOption> {
    match suffix {
        "B" => Ok(AddressOption::U16 { endian: Endian16::Big }),
        "L" => Ok(AddressOption::U16 { endian: Endian16::Little }),
        other => Err(NeuError::InvalidArgument(format!("unknown 16-bit endian suffix '#{other}'"))),
    }
}

fn parse_u32_suffix(suffix: &str) -> Result<AddressOption> {
    match suffix {
        "BB" => Ok(AddressOption::U32 { endian: Endian32::BB }),
        "BL" => Ok(AddressOption::U32 { endian: Endian32::BL }),
        "LL" => Ok(AddressOption::U32 { endian: Endian32::LL }),
        "LB" => Ok(AddressOption::U32 { endian: Endian32::LB }),
        other => Err(NeuError::InvalidArgument(format!("unknown 32-bit order suffix '#{other}'"))),
    }
}

fn parse_bool_suffix(suffix: &str) -> Result<AddressOption> {
    let bit: u8 = suffix
        .parse()
        .map_err(|_| NeuError::InvalidArgument(format!("invalid bit offset in '.{suffix}'")))?;
    Ok(AddressOption::Bool { bit })
}

/// Split a suffix like `"10H"` into `("10", Some('H'))`, or `"5"` into `("5", None)`.
fn split_trailing_letter(suffix: &str) -> (&str, Option<char>) {
    match suffix.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&suffix[..suffix.len() - c.len_utf8()], Some(c)),
        _ => (suffix, None),
    }
}

/// A readable/writable point within a Group.
#[derive(Debug, Serialize, Deserialize)]
pub struct Tag {
    pub tag_id: TagId,
    pub name: String,
    pub address: String,
    pub tag_type: TagType,
    pub attributes: AttributeSet,
    #[serde(skip)]
    addr_option: OnceLock<AddressOption>,
}

impl Clone for Tag {
    /// The parsed-address cache is not carried over; the clone re-parses
    /// lazily on its own first access.
    fn clone(&self) -> Self {
        Self {
            tag_id: self.tag_id,
            name: self.name.clone(),
            address: self.address.clone(),
            tag_type: self.tag_type,
            attributes: self.attributes,
            addr_option: OnceLock::new(),
        }
    }
}

impl Tag {
    pub fn new(tag_id: TagId, name: impl Into<String>, address: impl Into<String>, tag_type: TagType, attributes: AttributeSet) -> Result<Self> {
        if attributes.is_empty() {
            return Err(NeuError::domain(
                ErrorCode::ParamIsWrong,
                "tag attribute_set must be non-empty",
            ));
        }
        Ok(Self {
            tag_id,
            name: name.into(),
            address: address.into(),
            tag_type,
            attributes,
            addr_option: OnceLock::new(),
        })
    }

    /// Parse (and cache) the address option on first access.
    pub fn addr_option(&self) -> Result<AddressOption> {
        if let Some(opt) = self.addr_option.get() {
            return Ok(*opt);
        }
        let parsed = parse_address_option(&self.address, self.tag_type)?;
        // Another thread may have raced us; OnceLock::set returning Err just
        // means we lost the race, which is fine since the value is identical.
        let _ = self.addr_option.set(parsed);
        Ok(parsed)
    }
}

/// Which operations a tag supports: read, write, and/or subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSet {
    pub read: bool,
    pub write: bool,
    pub subscribe: bool,
}

impl AttributeSet {
    pub fn read_only() -> Self {
        Self { read: true, write: false, subscribe: false }
    }

    pub fn is_empty(self) -> bool {
        !self.read && !self.write && !self.subscribe
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.read {
            parts.push("read");
        }
        if self.write {
            parts.push("write");
        }
        if self.subscribe {
            parts.push("subscribe");
        }
        write!(f, "{}", parts.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_suffix_round_trips() {
        let opt = parse_address_option("1!40001.10H", TagType::String).unwrap();
        assert_eq!(opt, AddressOption::String { length: 10, subtype: StringSubType::H });
        assert_eq!(opt.render(), ".10H");
    }

    #[test]
    fn string_suffix_requires_positive_length() {
        let err = parse_address_option("1!40001.0H", TagType::String).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParamIsWrong);
    }

    #[test]
    fn u16_suffix_defaults_to_little_endian() {
        let opt = parse_address_option("1!400001", TagType::U16).unwrap();
        assert_eq!(opt, AddressOption::U16 { endian: Endian16::Little });
    }

    #[test]
    fn u16_big_endian_suffix() {
        let opt = parse_address_option("1!400001#B", TagType::U16).unwrap();
        assert_eq!(opt, AddressOption::U16 { endian: Endian16::Big });
        assert_eq!(opt.render(), "#B");
    }

    #[test]
    fn u32_suffix_defaults_to_ll() {
        let opt = parse_address_option("1!400001", TagType::U32).unwrap();
        assert_eq!(opt, AddressOption::U32 { endian: Endian32::LL });
    }

    #[test]
    fn u32_explicit_orders_round_trip() {
        for (suffix, expect) in [("BB", Endian32::BB), ("BL", Endian32::BL), ("LL", Endian32::LL), ("LB", Endian32::LB)] {
            let addr = format!("1!400001#{suffix}");
            let opt = parse_address_option(&addr, TagType::U32).unwrap();
            assert_eq!(opt, AddressOption::U32 { endian: expect });
            assert_eq!(opt.render(), format!("#{suffix}"));
        }
    }

    #[test]
    fn bool_bit_offset() {
        let opt = parse_address_option("1!10001.3", TagType::Bool).unwrap();
        assert_eq!(opt, AddressOption::Bool { bit: 3 });
        assert_eq!(opt.render(), ".3");
    }

    #[test]
    fn tag_requires_non_empty_attribute_set() {
        let attrs = AttributeSet { read: false, write: false, subscribe: false };
        let err = Tag::new(TagId(1), "t", "1!1", TagType::U16, attrs).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParamIsWrong);
    }

    #[test]
    fn addr_option_is_cached_after_first_parse() {
        let tag = Tag::new(TagId(1), "t", "1!1#B", TagType::U16, AttributeSet::read_only()).unwrap();
        let first = tag.addr_option().unwrap();
        let second = tag.addr_option().unwrap();
        assert_eq!(first, second);
    }
}
