extern crate data_encoding;
extern crate ring;
extern crate url;

use data_encoding::BASE32;
use ring::hmac;
use std::borrow::Cow::Borrowed;
use std::fmt;
use url::Url;

use std::convert::From;

use crate::errors::EnrollError;

/// An `otpauth://hotp/...` URI ready to be turned into a barcode.
#[derive(Debug, Clone, PartialEq)]
pub struct OtpEnrollmentUri(Url);

impl OtpEnrollmentUri {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[cfg(test)]
    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for OtpEnrollmentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Encode a seed as an HOTP enrollment URI. The secret is the padded
/// RFC 4648 base32 form of the seed bytes; no counter is written so apps
/// start from zero.
pub fn encode(seed: &[u8], label: &str) -> Result<OtpEnrollmentUri, EnrollError> {
    if seed.is_empty() {
        return Err(EnrollError::EmptySeed);
    }
    if label.is_empty() {
        return Err(EnrollError::Config(String::from("OTP label is empty")));
    }

    let mut u = Url::parse("otpauth://hotp/").map_err(|e| EnrollError::Config(e.to_string()))?;
    u.path_segments_mut()
        .map_err(|_| EnrollError::Config(String::from("otpauth URI cannot take a label")))?
        .pop_if_empty()
        .push(label);
    u.set_query(Some(&format!("secret={}", BASE32.encode(seed))));

    Ok(OtpEnrollmentUri(u))
}

#[derive(Debug)]
pub struct HotpSpec {
    secret: Vec<u8>,
    counter: u64,
    digits: u8,
}

struct Bytes([u8; 8]);

impl Default for HotpSpec {
    fn default() -> HotpSpec {
        HotpSpec {
            secret: Vec::new(),
            counter: 0,
            digits: 6,
        }
    }
}

impl HotpSpec {
    /// Read an HOTP spec back out of an otpauth URI.
    pub fn parse(u: &Url) -> Result<Self, EnrollError> {
        if u.scheme() != "otpauth" || u.host_str() != Some("hotp") {
            return Err(EnrollError::Validation(format!(
                "not an otpauth://hotp URI: {}",
                u
            )));
        }

        let mut spec = HotpSpec::default();

        // Sample url
        // otpauth://hotp/Cruz_ID_MFA?secret=MRSWCZDCMVSWM===&counter=0
        for qs in u.query_pairs() {
            match qs {
                (Borrowed("secret"), x) => {
                    let mut s = x.into_owned();
                    pad_string_to_base32(&mut s);

                    spec.secret = BASE32
                        .decode(s.as_bytes())
                        .map_err(|e| EnrollError::Validation(format!("bad secret: {}", e)))?;
                }
                (Borrowed("counter"), x) => {
                    spec.counter = x
                        .parse()
                        .map_err(|_| EnrollError::Validation(format!("bad counter: {}", x)))?;
                }
                (Borrowed("algorithm"), x) => {
                    // Only HMAC-SHA1 is implemented.
                    if !x.eq_ignore_ascii_case("SHA1") {
                        return Err(EnrollError::Validation(format!(
                            "unsupported HOTP algorithm: {}",
                            x
                        )));
                    }
                }
                (Borrowed("digits"), x) => {
                    spec.digits = x.parse().unwrap_or(6);
                    if spec.digits < 6 || spec.digits > 8 {
                        // default to 6 for any invalid or unsupported
                        // digit count.
                        spec.digits = 6
                    }
                }
                (_, _) => {}
            }
        }

        if spec.secret.is_empty() {
            return Err(EnrollError::EmptySeed);
        }

        Ok(spec)
    }

    #[cfg(test)]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// The code an authenticator shows for the spec's own counter.
    pub fn get_otp(&self) -> String {
        get_otp(self, self.counter)
    }
}

/// Big endian representation of the counter, most significant byte
/// first. Eg: 1 -> [0, 0, 0, 0, 0, 0, 0, 1]
impl From<u64> for Bytes {
    fn from(v: u64) -> Bytes {
        Bytes(v.to_be_bytes())
    }
}

/// Get the HOTP code for `counter` (RFC 4226).
pub fn get_otp(spec: &HotpSpec, counter: u64) -> String {
    // At the moment, only SHA1 is supported.
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, spec.secret.as_slice());
    let tag = hmac::sign(&key, &Bytes::from(counter).0);
    let tag = tag.as_ref();

    // Dynamic truncation: the low 4 bits of the last byte pick the offset.
    let offset: usize = (tag[tag.len() - 1] & 0x0f) as usize;

    let h: u32 = ((tag[offset] & 0x7f) as u32) << 24
        | (tag[offset + 1] as u32) << 16
        | (tag[offset + 2] as u32) << 8
        | (tag[offset + 3] as u32);

    format!(
        "{:0w$}",
        (h % 10u32.pow(spec.digits as u32)),
        w = spec.digits as usize
    )
}

/// Pad the secret to have the length divisible by 8 for it to be
/// decoded as base32.
fn pad_string_to_base32(s: &mut String) {
    let mut pad_len = 0;
    if s.len() % 8 != 0 {
        pad_len = 8 - s.len() % 8;
    }

    for _ in 0..pad_len {
        s.push('=');
    }
}
