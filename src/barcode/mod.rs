use image::{DynamicImage, ImageBuffer, Luma};
use log::{debug, warn};
use qrcode::{Color, EcLevel, QrCode};
use std::path::Path;
use url::Url;

use crate::errors::EnrollError;
use crate::hotp::OtpEnrollmentUri;

/// Pixels per QR module.
const MODULE_PX: u32 = 8;

/// Blank modules around the code.
const QUIET_ZONE: u32 = 4;

/// Render the enrollment URI as a QR code and write it as a PNG. Medium
/// error correction leaves room for a URI of a hundred characters or so
/// at a size phone cameras read easily.
pub fn render_png<P: AsRef<Path>>(uri: &OtpEnrollmentUri, path: P) -> Result<(), EnrollError> {
    let code = QrCode::with_error_correction_level(uri.as_str().as_bytes(), EcLevel::M)
        .map_err(|e| EnrollError::Render(e.to_string()))?;

    let width = code.width() as u32;
    let size = (width + 2 * QUIET_ZONE) * MODULE_PX;
    debug!("QR code is {}x{} modules, {}px", width, width, size);

    let img = ImageBuffer::from_fn(size, size, |x, y| {
        let mx = (x / MODULE_PX) as i64 - QUIET_ZONE as i64;
        let my = (y / MODULE_PX) as i64 - QUIET_ZONE as i64;
        let inside = mx >= 0 && my >= 0 && mx < width as i64 && my < width as i64;
        if inside && code[(mx as usize, my as usize)] == Color::Dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    img.save(path.as_ref())
        .map_err(|e| EnrollError::Render(format!("{}: {}", path.as_ref().display(), e)))
}

/// extract_otp_uri reads back the first QR code found in an image
/// file and returns the otpauth URI it carries.
pub fn extract_otp_uri<P: AsRef<Path>>(file_path: P) -> Option<Url> {
    let img: DynamicImage = match image::open(file_path.as_ref()) {
        Ok(x) => x,
        Err(e) => {
            warn!("Failed to open file: {}", e);
            return None;
        }
    };

    let decoder = bardecoder::default_decoder();
    let u = match decoder.decode(&img).into_iter().find_map(|r| r.ok()) {
        Some(x) => x,
        None => {
            warn!("No OTP url found in the image");
            return None;
        }
    };

    match Url::parse(&u) {
        Ok(x) => Some(x),
        Err(e) => {
            warn!("Invalid url: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotp::{encode, HotpSpec};
    use std::env;
    use std::fs;

    #[test]
    fn render_then_read_back() {
        let path = env::temp_dir().join(format!("otp-enroll-qr-{}.png", std::process::id()));
        let uri = encode(b"deadbeef", "Cruz_ID_MFA").unwrap();

        render_png(&uri, &path).unwrap();
        let read = extract_otp_uri(&path);
        fs::remove_file(&path).unwrap();

        let read = read.unwrap();
        assert_eq!(read.as_str(), uri.as_str());
        assert_eq!(HotpSpec::parse(&read).unwrap().secret(), b"deadbeef");
    }

    #[test]
    fn read_missing_file() {
        let path = env::temp_dir().join("otp-enroll-does-not-exist.png");
        assert_eq!(extract_otp_uri(&path).is_none(), true);
    }

    #[test]
    fn read_blank_image() {
        let path = env::temp_dir().join(format!("otp-enroll-blank-{}.png", std::process::id()));
        let blank: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_pixel(64, 64, Luma([255u8]));
        blank.save(&path).unwrap();

        let read = extract_otp_uri(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(read.is_none(), true);
    }
}
