//! Headless capture: PNG screenshots of the rendered frame.

use std::fs;
use std::io::BufWriter;
use std::path::Path;

use spectrum_core::Z80Stepper;

use crate::error::MachineError;
use crate::machine::Spectrum;
use crate::screen::{FRAME_HEIGHT, FRAME_WIDTH};

/// Render the rest of the frame and save it as a PNG.
///
/// # Errors
///
/// File creation or PNG encoding errors.
pub fn save_screenshot<C: Z80Stepper>(
    machine: &mut Spectrum<C>,
    path: &Path,
) -> Result<(), MachineError> {
    machine.render_screen();

    let mut pixels = vec![0u32; FRAME_WIDTH * FRAME_HEIGHT];
    machine.frame_pixels(&mut pixels);

    let file = fs::File::create(path)?;
    let w = BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, FRAME_WIDTH as u32, FRAME_HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;

    // Convert 0x00RRGGBB pixels to RGBA bytes.
    let mut rgba = Vec::with_capacity(FRAME_WIDTH * FRAME_HEIGHT * 4);
    for &pixel in &pixels {
        rgba.push((pixel >> 16) as u8);
        rgba.push((pixel >> 8) as u8);
        rgba.push(pixel as u8);
        rgba.push(0xFF);
    }

    writer.write_image_data(&rgba)?;
    Ok(())
}
