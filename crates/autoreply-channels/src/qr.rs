//! QR code rendering for pairing payloads.

use autoreply_core::error::AutoReplyError;
use qrcode::{Color, EcLevel, QrCode};

/// Blank modules around the code. Scanners need a light border.
const QUIET_ZONE: usize = 2;

/// Pixels per module in PNG output.
const MODULE_PX: u32 = 8;

fn encode(qr_data: &str) -> Result<QrCode, AutoReplyError> {
    QrCode::with_error_correction_level(qr_data.as_bytes(), EcLevel::L)
        .map_err(|e| AutoReplyError::Connection(format!("QR generation failed: {e}")))
}

/// Dark-module lookup that treats everything outside the code as light.
struct Modules {
    width: usize,
    colors: Vec<Color>,
}

impl Modules {
    fn new(code: QrCode) -> Self {
        let width = code.width();
        Self {
            width,
            colors: code.into_colors(),
        }
    }

    /// Coordinates include the quiet zone.
    fn is_dark(&self, row: usize, col: usize) -> bool {
        let (Some(r), Some(c)) = (row.checked_sub(QUIET_ZONE), col.checked_sub(QUIET_ZONE)) else {
            return false;
        };
        r < self.width && c < self.width && self.colors[r * self.width + c] == Color::Dark
    }

    fn padded_width(&self) -> usize {
        self.width + QUIET_ZONE * 2
    }
}

/// Render a QR code for the terminal using Unicode half-block characters.
///
/// Two module rows share one text line, so the code stays roughly square.
pub fn generate_qr_terminal(qr_data: &str) -> Result<String, AutoReplyError> {
    let modules = Modules::new(encode(qr_data)?);
    let size = modules.padded_width();

    let mut out = String::with_capacity((size + 1) * size.div_ceil(2) * 3);
    for row in (0..size).step_by(2) {
        for col in 0..size {
            let top = modules.is_dark(row, col);
            let bottom = modules.is_dark(row + 1, col);
            out.push(match (top, bottom) {
                (true, true) => '█',
                (true, false) => '▀',
                (false, true) => '▄',
                (false, false) => ' ',
            });
        }
        out.push('\n');
    }
    Ok(out)
}

/// Render a QR code as PNG bytes.
pub fn generate_qr_image(qr_data: &str) -> Result<Vec<u8>, AutoReplyError> {
    use image::{ImageBuffer, Luma};

    let modules = Modules::new(encode(qr_data)?);
    let img_size = modules.padded_width() as u32 * MODULE_PX;

    let img = ImageBuffer::from_fn(img_size, img_size, |x, y| {
        let dark = modules.is_dark((y / MODULE_PX) as usize, (x / MODULE_PX) as usize);
        if dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| AutoReplyError::Connection(format!("PNG encoding failed: {e}")))?;

    Ok(buf.into_inner())
}
