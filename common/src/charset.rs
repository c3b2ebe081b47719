use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::err::{ServerError, SqlResult};

/// MySQL character set ids.
///
/// ref: https://dev.mysql.com/doc/refman/8.0/en/information-schema-character-sets-table.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CharacterSet {
    Big5 = 1,
    Dec8 = 3,
    Cp850 = 4,
    Hp8 = 6,
    Koi8r = 7,
    Latin1 = 8,
    Latin2 = 9,
    Swe7 = 10,
    Ascii = 11,
    Ujis = 12,
    Sjis = 13,
    Hebrew = 16,
    Tis620 = 18,
    Euckr = 19,
    Koi8u = 22,
    Gb2312 = 24,
    Greek = 25,
    Cp1250 = 26,
    Gbk = 28,
    Latin5 = 30,
    Armscii8 = 32,
    Utf8 = 33,
    Ucs2 = 35,
    Cp866 = 36,
    Keybcs2 = 37,
    Macce = 38,
    Macroman = 39,
    Cp852 = 40,
    Latin7 = 41,
    Cp1251 = 51,
    Utf16 = 54,
    Utf16le = 56,
    Cp1256 = 57,
    Cp1257 = 59,
    Utf32 = 60,
    Binary = 63,
    Geostd8 = 92,
    Cp932 = 95,
    Eucjpms = 97,
    Gb18030 = 248,
    Utf8mb4 = 255,
}

impl CharacterSet {
    pub fn name(self) -> &'static str {
        match self {
            CharacterSet::Big5 => "big5",
            CharacterSet::Dec8 => "dec8",
            CharacterSet::Cp850 => "cp850",
            CharacterSet::Hp8 => "hp8",
            CharacterSet::Koi8r => "koi8r",
            CharacterSet::Latin1 => "latin1",
            CharacterSet::Latin2 => "latin2",
            CharacterSet::Swe7 => "swe7",
            CharacterSet::Ascii => "ascii",
            CharacterSet::Ujis => "ujis",
            CharacterSet::Sjis => "sjis",
            CharacterSet::Hebrew => "hebrew",
            CharacterSet::Tis620 => "tis620",
            CharacterSet::Euckr => "euckr",
            CharacterSet::Koi8u => "koi8u",
            CharacterSet::Gb2312 => "gb2312",
            CharacterSet::Greek => "greek",
            CharacterSet::Cp1250 => "cp1250",
            CharacterSet::Gbk => "gbk",
            CharacterSet::Latin5 => "latin5",
            CharacterSet::Armscii8 => "armscii8",
            CharacterSet::Utf8 => "utf8",
            CharacterSet::Ucs2 => "ucs2",
            CharacterSet::Cp866 => "cp866",
            CharacterSet::Keybcs2 => "keybcs2",
            CharacterSet::Macce => "macce",
            CharacterSet::Macroman => "macroman",
            CharacterSet::Cp852 => "cp852",
            CharacterSet::Latin7 => "latin7",
            CharacterSet::Cp1251 => "cp1251",
            CharacterSet::Utf16 => "utf16",
            CharacterSet::Utf16le => "utf16le",
            CharacterSet::Cp1256 => "cp1256",
            CharacterSet::Cp1257 => "cp1257",
            CharacterSet::Utf32 => "utf32",
            CharacterSet::Binary => "binary",
            CharacterSet::Geostd8 => "geostd8",
            CharacterSet::Cp932 => "cp932",
            CharacterSet::Eucjpms => "eucjpms",
            CharacterSet::Gb18030 => "gb18030",
            CharacterSet::Utf8mb4 => "utf8mb4",
        }
    }

    pub fn from_name(name: &str) -> Option<CharacterSet> {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "big5" => Some(CharacterSet::Big5),
            "dec8" => Some(CharacterSet::Dec8),
            "cp850" => Some(CharacterSet::Cp850),
            "hp8" => Some(CharacterSet::Hp8),
            "koi8r" => Some(CharacterSet::Koi8r),
            "latin1" => Some(CharacterSet::Latin1),
            "latin2" => Some(CharacterSet::Latin2),
            "swe7" => Some(CharacterSet::Swe7),
            "ascii" => Some(CharacterSet::Ascii),
            "ujis" => Some(CharacterSet::Ujis),
            "sjis" => Some(CharacterSet::Sjis),
            "hebrew" => Some(CharacterSet::Hebrew),
            "tis620" => Some(CharacterSet::Tis620),
            "euckr" => Some(CharacterSet::Euckr),
            "koi8u" => Some(CharacterSet::Koi8u),
            "gb2312" => Some(CharacterSet::Gb2312),
            "greek" => Some(CharacterSet::Greek),
            "cp1250" => Some(CharacterSet::Cp1250),
            "gbk" => Some(CharacterSet::Gbk),
            "latin5" => Some(CharacterSet::Latin5),
            "armscii8" => Some(CharacterSet::Armscii8),
            "utf8" | "utf8mb3" => Some(CharacterSet::Utf8),
            "ucs2" => Some(CharacterSet::Ucs2),
            "cp866" => Some(CharacterSet::Cp866),
            "keybcs2" => Some(CharacterSet::Keybcs2),
            "macce" => Some(CharacterSet::Macce),
            "macroman" => Some(CharacterSet::Macroman),
            "cp852" => Some(CharacterSet::Cp852),
            "latin7" => Some(CharacterSet::Latin7),
            "cp1251" => Some(CharacterSet::Cp1251),
            "utf16" => Some(CharacterSet::Utf16),
            "utf16le" => Some(CharacterSet::Utf16le),
            "cp1256" => Some(CharacterSet::Cp1256),
            "cp1257" => Some(CharacterSet::Cp1257),
            "utf32" => Some(CharacterSet::Utf32),
            "binary" => Some(CharacterSet::Binary),
            "geostd8" => Some(CharacterSet::Geostd8),
            "cp932" => Some(CharacterSet::Cp932),
            "eucjpms" => Some(CharacterSet::Eucjpms),
            "gb18030" => Some(CharacterSet::Gb18030),
            "utf8mb4" => Some(CharacterSet::Utf8mb4),
            _ => None,
        }
    }

    pub fn default_collation(self) -> Collation {
        match self {
            CharacterSet::Big5 => Collation::Big5ChineseCi,
            CharacterSet::Dec8 => Collation::Dec8SwedishCi,
            CharacterSet::Cp850 => Collation::Cp850GeneralCi,
            CharacterSet::Hp8 => Collation::Hp8EnglishCi,
            CharacterSet::Koi8r => Collation::Koi8rGeneralCi,
            CharacterSet::Latin1 => Collation::Latin1SwedishCi,
            CharacterSet::Latin2 => Collation::Latin2GeneralCi,
            CharacterSet::Swe7 => Collation::Swe7SwedishCi,
            CharacterSet::Ascii => Collation::AsciiGeneralCi,
            CharacterSet::Ujis => Collation::UjisJapaneseCi,
            CharacterSet::Sjis => Collation::SjisJapaneseCi,
            CharacterSet::Hebrew => Collation::HebrewGeneralCi,
            CharacterSet::Tis620 => Collation::Tis620ThaiCi,
            CharacterSet::Euckr => Collation::EuckrKoreanCi,
            CharacterSet::Koi8u => Collation::Koi8uGeneralCi,
            CharacterSet::Gb2312 => Collation::Gb2312ChineseCi,
            CharacterSet::Greek => Collation::GreekGeneralCi,
            CharacterSet::Cp1250 => Collation::Cp1250GeneralCi,
            CharacterSet::Gbk => Collation::GbkChineseCi,
            CharacterSet::Latin5 => Collation::Latin5TurkishCi,
            CharacterSet::Armscii8 => Collation::Armscii8GeneralCi,
            CharacterSet::Utf8 => Collation::Utf8GeneralCi,
            CharacterSet::Ucs2 => Collation::Ucs2GeneralCi,
            CharacterSet::Cp866 => Collation::Cp866GeneralCi,
            CharacterSet::Keybcs2 => Collation::Keybcs2GeneralCi,
            CharacterSet::Macce => Collation::MacceGeneralCi,
            CharacterSet::Macroman => Collation::MacromanGeneralCi,
            CharacterSet::Cp852 => Collation::Cp852GeneralCi,
            CharacterSet::Latin7 => Collation::Latin7GeneralCi,
            CharacterSet::Cp1251 => Collation::Cp1251GeneralCi,
            CharacterSet::Utf16 => Collation::Utf16GeneralCi,
            CharacterSet::Utf16le => Collation::Utf16leGeneralCi,
            CharacterSet::Cp1256 => Collation::Cp1256GeneralCi,
            CharacterSet::Cp1257 => Collation::Cp1257GeneralCi,
            CharacterSet::Utf32 => Collation::Utf32GeneralCi,
            CharacterSet::Binary => Collation::Binary,
            CharacterSet::Geostd8 => Collation::Geostd8GeneralCi,
            CharacterSet::Cp932 => Collation::Cp932JapaneseCi,
            CharacterSet::Eucjpms => Collation::EucjpmsJapaneseCi,
            CharacterSet::Gb18030 => Collation::Gb18030ChineseCi,
            CharacterSet::Utf8mb4 => Collation::Utf8mb4GeneralCi,
        }
    }

    /// Decode client bytes.
    ///
    /// Multi-byte legacy codecs are not transcoded; anything that is not
    /// latin1 is treated as utf8, which covers every charset modern
    /// connectors actually negotiate.
    pub fn decode(self, bytes: &[u8]) -> SqlResult<String> {
        match self {
            CharacterSet::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            CharacterSet::Binary => Ok(String::from_utf8_lossy(bytes).into_owned()),
            _ => String::from_utf8(bytes.to_vec())
                .map_err(|_| ServerError::malformed("invalid utf8 in client string")),
        }
    }

    pub fn encode(self, s: &str) -> Vec<u8> {
        match self {
            CharacterSet::Latin1 => s
                .chars()
                .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
                .collect(),
            _ => s.as_bytes().to_vec(),
        }
    }
}

/// Collation ids, restricted to the default collation of each supported
/// character set plus the handful of non-default ones clients negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Collation {
    Big5ChineseCi = 1,
    Dec8SwedishCi = 3,
    Cp850GeneralCi = 4,
    Hp8EnglishCi = 6,
    Koi8rGeneralCi = 7,
    Latin1SwedishCi = 8,
    Latin2GeneralCi = 9,
    Swe7SwedishCi = 10,
    AsciiGeneralCi = 11,
    UjisJapaneseCi = 12,
    SjisJapaneseCi = 13,
    HebrewGeneralCi = 16,
    Tis620ThaiCi = 18,
    EuckrKoreanCi = 19,
    Koi8uGeneralCi = 22,
    Gb2312ChineseCi = 24,
    GreekGeneralCi = 25,
    Cp1250GeneralCi = 26,
    GbkChineseCi = 28,
    Latin5TurkishCi = 30,
    Armscii8GeneralCi = 32,
    Utf8GeneralCi = 33,
    Ucs2GeneralCi = 35,
    Cp866GeneralCi = 36,
    Keybcs2GeneralCi = 37,
    MacceGeneralCi = 38,
    MacromanGeneralCi = 39,
    Cp852GeneralCi = 40,
    Latin7GeneralCi = 41,
    Utf8mb4GeneralCi = 45,
    Utf8mb4Bin = 46,
    Latin1Bin = 47,
    Cp1251GeneralCi = 51,
    Utf16GeneralCi = 54,
    Utf16leGeneralCi = 56,
    Cp1256GeneralCi = 57,
    Cp1257GeneralCi = 59,
    Utf32GeneralCi = 60,
    Binary = 63,
    Utf8Bin = 83,
    Geostd8GeneralCi = 92,
    Cp932JapaneseCi = 95,
    EucjpmsJapaneseCi = 97,
    Utf8mb4UnicodeCi = 224,
    Gb18030ChineseCi = 248,
    Utf8mb4_0900AiCi = 255,
}

impl Collation {
    pub fn name(self) -> &'static str {
        match self {
            Collation::Big5ChineseCi => "big5_chinese_ci",
            Collation::Dec8SwedishCi => "dec8_swedish_ci",
            Collation::Cp850GeneralCi => "cp850_general_ci",
            Collation::Hp8EnglishCi => "hp8_english_ci",
            Collation::Koi8rGeneralCi => "koi8r_general_ci",
            Collation::Latin1SwedishCi => "latin1_swedish_ci",
            Collation::Latin2GeneralCi => "latin2_general_ci",
            Collation::Swe7SwedishCi => "swe7_swedish_ci",
            Collation::AsciiGeneralCi => "ascii_general_ci",
            Collation::UjisJapaneseCi => "ujis_japanese_ci",
            Collation::SjisJapaneseCi => "sjis_japanese_ci",
            Collation::HebrewGeneralCi => "hebrew_general_ci",
            Collation::Tis620ThaiCi => "tis620_thai_ci",
            Collation::EuckrKoreanCi => "euckr_korean_ci",
            Collation::Koi8uGeneralCi => "koi8u_general_ci",
            Collation::Gb2312ChineseCi => "gb2312_chinese_ci",
            Collation::GreekGeneralCi => "greek_general_ci",
            Collation::Cp1250GeneralCi => "cp1250_general_ci",
            Collation::GbkChineseCi => "gbk_chinese_ci",
            Collation::Latin5TurkishCi => "latin5_turkish_ci",
            Collation::Armscii8GeneralCi => "armscii8_general_ci",
            Collation::Utf8GeneralCi => "utf8_general_ci",
            Collation::Ucs2GeneralCi => "ucs2_general_ci",
            Collation::Cp866GeneralCi => "cp866_general_ci",
            Collation::Keybcs2GeneralCi => "keybcs2_general_ci",
            Collation::MacceGeneralCi => "macce_general_ci",
            Collation::MacromanGeneralCi => "macroman_general_ci",
            Collation::Cp852GeneralCi => "cp852_general_ci",
            Collation::Latin7GeneralCi => "latin7_general_ci",
            Collation::Utf8mb4GeneralCi => "utf8mb4_general_ci",
            Collation::Utf8mb4Bin => "utf8mb4_bin",
            Collation::Latin1Bin => "latin1_bin",
            Collation::Cp1251GeneralCi => "cp1251_general_ci",
            Collation::Utf16GeneralCi => "utf16_general_ci",
            Collation::Utf16leGeneralCi => "utf16le_general_ci",
            Collation::Cp1256GeneralCi => "cp1256_general_ci",
            Collation::Cp1257GeneralCi => "cp1257_general_ci",
            Collation::Utf32GeneralCi => "utf32_general_ci",
            Collation::Binary => "binary",
            Collation::Utf8Bin => "utf8_bin",
            Collation::Geostd8GeneralCi => "geostd8_general_ci",
            Collation::Cp932JapaneseCi => "cp932_japanese_ci",
            Collation::EucjpmsJapaneseCi => "eucjpms_japanese_ci",
            Collation::Utf8mb4UnicodeCi => "utf8mb4_unicode_ci",
            Collation::Gb18030ChineseCi => "gb18030_chinese_ci",
            Collation::Utf8mb4_0900AiCi => "utf8mb4_0900_ai_ci",
        }
    }

    pub fn charset(self) -> CharacterSet {
        match self {
            Collation::Big5ChineseCi => CharacterSet::Big5,
            Collation::Dec8SwedishCi => CharacterSet::Dec8,
            Collation::Cp850GeneralCi => CharacterSet::Cp850,
            Collation::Hp8EnglishCi => CharacterSet::Hp8,
            Collation::Koi8rGeneralCi => CharacterSet::Koi8r,
            Collation::Latin1SwedishCi | Collation::Latin1Bin => CharacterSet::Latin1,
            Collation::Latin2GeneralCi => CharacterSet::Latin2,
            Collation::Swe7SwedishCi => CharacterSet::Swe7,
            Collation::AsciiGeneralCi => CharacterSet::Ascii,
            Collation::UjisJapaneseCi => CharacterSet::Ujis,
            Collation::SjisJapaneseCi => CharacterSet::Sjis,
            Collation::HebrewGeneralCi => CharacterSet::Hebrew,
            Collation::Tis620ThaiCi => CharacterSet::Tis620,
            Collation::EuckrKoreanCi => CharacterSet::Euckr,
            Collation::Koi8uGeneralCi => CharacterSet::Koi8u,
            Collation::Gb2312ChineseCi => CharacterSet::Gb2312,
            Collation::GreekGeneralCi => CharacterSet::Greek,
            Collation::Cp1250GeneralCi => CharacterSet::Cp1250,
            Collation::GbkChineseCi => CharacterSet::Gbk,
            Collation::Latin5TurkishCi => CharacterSet::Latin5,
            Collation::Armscii8GeneralCi => CharacterSet::Armscii8,
            Collation::Utf8GeneralCi | Collation::Utf8Bin => CharacterSet::Utf8,
            Collation::Ucs2GeneralCi => CharacterSet::Ucs2,
            Collation::Cp866GeneralCi => CharacterSet::Cp866,
            Collation::Keybcs2GeneralCi => CharacterSet::Keybcs2,
            Collation::MacceGeneralCi => CharacterSet::Macce,
            Collation::MacromanGeneralCi => CharacterSet::Macroman,
            Collation::Cp852GeneralCi => CharacterSet::Cp852,
            Collation::Latin7GeneralCi => CharacterSet::Latin7,
            Collation::Utf8mb4GeneralCi
            | Collation::Utf8mb4Bin
            | Collation::Utf8mb4UnicodeCi
            | Collation::Utf8mb4_0900AiCi => CharacterSet::Utf8mb4,
            Collation::Cp1251GeneralCi => CharacterSet::Cp1251,
            Collation::Utf16GeneralCi => CharacterSet::Utf16,
            Collation::Utf16leGeneralCi => CharacterSet::Utf16le,
            Collation::Cp1256GeneralCi => CharacterSet::Cp1256,
            Collation::Cp1257GeneralCi => CharacterSet::Cp1257,
            Collation::Utf32GeneralCi => CharacterSet::Utf32,
            Collation::Binary => CharacterSet::Binary,
            Collation::Geostd8GeneralCi => CharacterSet::Geostd8,
            Collation::Cp932JapaneseCi => CharacterSet::Cp932,
            Collation::EucjpmsJapaneseCi => CharacterSet::Eucjpms,
            Collation::Gb18030ChineseCi => CharacterSet::Gb18030,
        }
    }

    pub fn from_name(name: &str) -> Option<Collation> {
        let lower = name.to_ascii_lowercase();
        // Collations are looked up far less often than charsets, so a scan
        // over the known set is fine.
        ALL_COLLATIONS.iter().copied().find(|c| c.name() == lower)
    }

    /// Collation of a client charset byte as sent in the handshake response.
    /// Clients send a collation id here, but some send a bare charset id.
    pub fn charset_from_collation_byte(byte: u8) -> Option<CharacterSet> {
        if let Ok(collation) = Collation::try_from(byte as u16) {
            return Some(collation.charset());
        }
        CharacterSet::try_from(byte).ok()
    }
}

pub const ALL_COLLATIONS: &[Collation] = &[
    Collation::Big5ChineseCi,
    Collation::Dec8SwedishCi,
    Collation::Cp850GeneralCi,
    Collation::Hp8EnglishCi,
    Collation::Koi8rGeneralCi,
    Collation::Latin1SwedishCi,
    Collation::Latin2GeneralCi,
    Collation::Swe7SwedishCi,
    Collation::AsciiGeneralCi,
    Collation::UjisJapaneseCi,
    Collation::SjisJapaneseCi,
    Collation::HebrewGeneralCi,
    Collation::Tis620ThaiCi,
    Collation::EuckrKoreanCi,
    Collation::Koi8uGeneralCi,
    Collation::Gb2312ChineseCi,
    Collation::GreekGeneralCi,
    Collation::Cp1250GeneralCi,
    Collation::GbkChineseCi,
    Collation::Latin5TurkishCi,
    Collation::Armscii8GeneralCi,
    Collation::Utf8GeneralCi,
    Collation::Ucs2GeneralCi,
    Collation::Cp866GeneralCi,
    Collation::Keybcs2GeneralCi,
    Collation::MacceGeneralCi,
    Collation::MacromanGeneralCi,
    Collation::Cp852GeneralCi,
    Collation::Latin7GeneralCi,
    Collation::Utf8mb4GeneralCi,
    Collation::Utf8mb4Bin,
    Collation::Latin1Bin,
    Collation::Cp1251GeneralCi,
    Collation::Utf16GeneralCi,
    Collation::Utf16leGeneralCi,
    Collation::Cp1256GeneralCi,
    Collation::Cp1257GeneralCi,
    Collation::Utf32GeneralCi,
    Collation::Binary,
    Collation::Utf8Bin,
    Collation::Geostd8GeneralCi,
    Collation::Cp932JapaneseCi,
    Collation::EucjpmsJapaneseCi,
    Collation::Utf8mb4UnicodeCi,
    Collation::Gb18030ChineseCi,
    Collation::Utf8mb4_0900AiCi,
];
