use core::convert::Infallible;

use embedded_graphics::{
    geometry::{OriginDimensions, Size},
    mono_font::{
        ascii::{FONT_10X20, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
    Pixel,
};
use esp_idf_hal::i2c::I2cDriver;

use fridge_common::{DisplayError, StatusDisplay, StatusFrame};

pub const WIDTH: u32 = 128;
pub const HEIGHT: u32 = 32;

const PAGES: u32 = HEIGHT / 8;
const BUFFER_LEN: usize = (WIDTH * PAGES) as usize;
const I2C_TIMEOUT_TICKS: u32 = 100;
const DATA_CHUNK: usize = 16;

const CONTROL_COMMAND: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;

const CMD_COLUMN_ADDRESS: u8 = 0x21;
const CMD_PAGE_ADDRESS: u8 = 0x22;

const INIT_SEQUENCE: &[u8] = &[
    0xAE, // display off
    0xD5, 0x80, // clock divide ratio
    0xA8, 0x1F, // multiplex ratio, 32 rows
    0xD3, 0x00, // no display offset
    0x40, // start line 0
    0x8D, 0x14, // charge pump from internal 3.3 V
    0x20, 0x00, // horizontal addressing
    0xA1, // segment remap
    0xC8, // COM scan descending
    0xDA, 0x02, // COM pins for 128x32
    0x81, 0x8F, // contrast
    0xD9, 0xF1, // pre-charge period
    0xDB, 0x40, // VCOMH deselect level
    0xA4, // follow RAM contents
    0xA6, // non-inverted
    0x2E, // scrolling off
    0xAF, // display on
];

pub struct FrameBuffer {
    pixels: [u8; BUFFER_LEN],
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: [0; BUFFER_LEN],
        }
    }

    pub fn clear_all(&mut self) {
        self.pixels.fill(0);
    }

    fn set_pixel(&mut self, x: u32, y: u32, on: bool) {
        let index = (x + (y / 8) * WIDTH) as usize;
        let mask = 1_u8 << (y % 8);
        if on {
            self.pixels[index] |= mask;
        } else {
            self.pixels[index] &= !mask;
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(WIDTH, HEIGHT)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(point.x), u32::try_from(point.y)) else {
                continue;
            };
            if x < WIDTH && y < HEIGHT {
                self.set_pixel(x, y, color.is_on());
            }
        }
        Ok(())
    }
}

pub struct Ssd1306 {
    i2c: I2cDriver<'static>,
    address: u8,
    buffer: FrameBuffer,
}

impl Ssd1306 {
    // No acknowledge on the first command means nothing answers at `address`.
    pub fn new(i2c: I2cDriver<'static>, address: u8) -> Result<Self, DisplayError> {
        let mut display = Self {
            i2c,
            address,
            buffer: FrameBuffer::new(),
        };

        display
            .command(INIT_SEQUENCE)
            .map_err(|_| DisplayError::NotDetected)?;
        display.flush()?;
        Ok(display)
    }

    fn command(&mut self, commands: &[u8]) -> Result<(), DisplayError> {
        let mut payload = Vec::with_capacity(commands.len() + 1);
        payload.push(CONTROL_COMMAND);
        payload.extend_from_slice(commands);
        self.i2c
            .write(self.address, &payload, I2C_TIMEOUT_TICKS)
            .map_err(|err| DisplayError::Bus(format!("{err:?}")))
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.command(&[
            CMD_COLUMN_ADDRESS,
            0,
            (WIDTH - 1) as u8,
            CMD_PAGE_ADDRESS,
            0,
            (PAGES - 1) as u8,
        ])?;

        let Self {
            i2c,
            address,
            buffer,
        } = self;

        let mut packet = [0_u8; DATA_CHUNK + 1];
        packet[0] = CONTROL_DATA;
        for chunk in buffer.as_bytes().chunks(DATA_CHUNK) {
            packet[1..=chunk.len()].copy_from_slice(chunk);
            i2c.write(*address, &packet[..=chunk.len()], I2C_TIMEOUT_TICKS)
                .map_err(|err| DisplayError::Bus(format!("{err:?}")))?;
        }
        Ok(())
    }
}

fn unreachable_draw_error(never: Infallible) -> DisplayError {
    match never {}
}

impl StatusDisplay for Ssd1306 {
    fn show_status(&mut self, frame: &StatusFrame) -> Result<(), DisplayError> {
        let large = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
        let small = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
        let temperature = frame.temperature_line();
        let relay = frame.relay_line();

        self.buffer.clear_all();
        Text::with_baseline(&temperature, Point::zero(), large, Baseline::Top)
            .draw(&mut self.buffer)
            .map_err(unreachable_draw_error)?;
        Text::with_baseline(&relay, Point::new(0, 22), small, Baseline::Top)
            .draw(&mut self.buffer)
            .map_err(unreachable_draw_error)?;

        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_buffer_is_blank() {
        let buffer = FrameBuffer::default();
        assert_eq!(buffer.as_bytes().len(), BUFFER_LEN);
        assert!(buffer.as_bytes().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn pixels_land_in_page_order() {
        let mut buffer = FrameBuffer::default();
        Pixel(Point::new(3, 9), BinaryColor::On).draw(&mut buffer).unwrap();
        Pixel(Point::new(200, 40), BinaryColor::On).draw(&mut buffer).unwrap();

        assert_eq!(buffer.as_bytes()[WIDTH as usize + 3], 0b0000_0010);
        assert_eq!(buffer.as_bytes().iter().filter(|byte| **byte != 0).count(), 1);

        buffer.clear_all();
        assert!(buffer.as_bytes().iter().all(|byte| *byte == 0));
    }
}
