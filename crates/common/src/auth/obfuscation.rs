//! Device-bound obfuscation for the persisted refresh token
//!
//! The key is derived from stable device characteristics, so a stored value
//! copied to another device (or read after the device profile changes) no
//! longer decodes. This is obfuscation, not encryption: anyone who can
//! reproduce the fingerprint can reverse it.
//!
//! Encoding: the plaintext's UTF-16 code units are XOR-ed with the key's code
//! units (cycled), written as little-endian bytes and base64-encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{Local, Offset};

const DEFAULT_LANGUAGE: &str = "en-US";
const DEFAULT_COLOR_DEPTH: u32 = 24;

/// Stable characteristics of the running device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub user_agent: String,
    pub language: String,
    pub color_depth: u32,
    /// Minutes to add to local time to get UTC (positive west of Greenwich).
    pub timezone_offset_minutes: i32,
}

impl Fingerprint {
    /// Read the language and timezone from the host environment.
    ///
    /// `LC_ALL`, then `LANG` supply the language tag (`en_US.UTF-8` becomes
    /// `en-US`); the local UTC offset supplies the timezone.
    pub fn detect(user_agent: impl Into<String>) -> Self {
        let language = ["LC_ALL", "LANG"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find_map(|raw| normalize_language(&raw))
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let local_minus_utc = Local::now().offset().fix().local_minus_utc();

        Self {
            user_agent: user_agent.into(),
            language,
            color_depth: DEFAULT_COLOR_DEPTH,
            timezone_offset_minutes: -local_minus_utc / 60,
        }
    }

    fn material(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.user_agent, self.language, self.color_depth, self.timezone_offset_minutes
        )
    }
}

fn normalize_language(raw: &str) -> Option<String> {
    let tag = raw.split(['.', '@']).next().unwrap_or_default().trim();
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        return None;
    }
    Some(tag.replace('_', "-"))
}

/// Reversible transform keyed by a [`Fingerprint`]
#[derive(Debug, Clone)]
pub struct Obfuscator {
    key: Vec<u16>,
}

impl Obfuscator {
    pub fn new(fingerprint: &Fingerprint) -> Self {
        Self::with_key(&device_key(fingerprint))
    }

    fn with_key(key: &str) -> Self {
        Self { key: key.encode_utf16().collect() }
    }

    /// Encode `plaintext` for storage.
    pub fn obfuscate(&self, plaintext: &str) -> String {
        let bytes: Vec<u8> = plaintext
            .encode_utf16()
            .zip(self.key.iter().cycle())
            .flat_map(|(unit, key)| (unit ^ key).to_le_bytes())
            .collect();
        STANDARD.encode(bytes)
    }

    /// Decode a stored value.
    ///
    /// Returns `None` for anything that is not the output of
    /// [`Obfuscator::obfuscate`] under a matching fingerprint closely enough
    /// to decode: bad base64, a truncated byte stream or invalid UTF-16.
    pub fn reveal(&self, encoded: &str) -> Option<String> {
        let bytes = STANDARD.decode(encoded).ok()?;
        if bytes.len() % 2 != 0 {
            return None;
        }

        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .zip(self.key.iter().cycle())
            .map(|(unit, key)| unit ^ key)
            .collect();

        String::from_utf16(&units).ok()
    }
}

/// Rolling 32-bit string hash of the fingerprint, rendered in base 36.
pub fn device_key(fingerprint: &Fingerprint) -> String {
    to_base36(string_hash(&fingerprint.material()))
}

fn string_hash(input: &str) -> i32 {
    input.encode_utf16().fold(0_i32, |hash, unit| {
        hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(i32::from(unit))
    })
}

fn to_base36(value: i32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut magnitude = i64::from(value).unsigned_abs();
    if magnitude == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while magnitude > 0 {
        // Remainder is always < 36.
        let index = usize::try_from(magnitude % 36).unwrap_or_default();
        digits.push(char::from(DIGITS[index]));
        magnitude /= 36;
    }
    if value < 0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}
