use std::fmt;

use crate::buffer;
use crate::config::Config;
use crate::error::CaptureError;
use crate::fourcc::FourCC;
use crate::v4l2::videodev::*;

/// Pixel formats the engine can negotiate.
///
/// The set is closed: each tag maps to exactly one fourcc and one plane
/// layout, so the buffer arena can size and slice planes without consulting
/// the driver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    #[default]
    Invalid,
    /// Packed YUV 4:2:2, 16 bits per pixel
    Yuyv422,
    /// Semi-planar YUV 4:2:0, luma and chroma in one contiguous allocation
    Nv12,
    /// Semi-planar YUV 4:2:0 with separately allocated luma/chroma planes
    Nv12sp,
    /// Planar YUV 4:2:2 with separate Y, Cb and Cr planes
    Yuv422p,
    /// Motion JPEG bitstream
    Mjpeg,
    /// Packed 24-bit BGR
    Bgr24,
    /// Packed 24-bit RGB
    Rgb24,
}

impl PixelFormat {
    /// The wire fourcc for this tag, or `None` for [`PixelFormat::Invalid`].
    pub fn fourcc(self) -> Option<FourCC> {
        let repr: &[u8; 4] = match self {
            PixelFormat::Invalid => return None,
            PixelFormat::Yuyv422 => b"YUYV",
            PixelFormat::Yuv422p => b"422P",
            PixelFormat::Nv12 => b"NV12",
            PixelFormat::Nv12sp => b"NM12",
            PixelFormat::Mjpeg => b"MJPG",
            PixelFormat::Bgr24 => b"BGR3",
            PixelFormat::Rgb24 => b"RGB3",
        };
        Some(FourCC::new(repr))
    }

    /// Number of distinct planes the format is made of.
    pub fn planes(self) -> usize {
        match self {
            PixelFormat::Nv12sp => 2,
            PixelFormat::Yuv422p => 3,
            _ => 1,
        }
    }

    /// Whether this is a compressed bitstream rather than raw pixels.
    pub fn is_compressed(self) -> bool {
        matches!(self, PixelFormat::Mjpeg)
    }

    /// Quantization range requested on S_FMT. Compressed bitstreams are
    /// full-range; raw sensor output is limited-range.
    pub(crate) fn quantization(self) -> u32 {
        if self.is_compressed() {
            V4L2_QUANTIZATION_FULL_RANGE
        } else {
            V4L2_QUANTIZATION_LIM_RANGE
        }
    }

    /// Field order requested on S_FMT.
    pub(crate) fn field(self) -> u32 {
        if self.is_compressed() {
            V4L2_FIELD_NONE
        } else {
            V4L2_FIELD_INTERLACED
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fourcc() {
            Some(fourcc) => write!(f, "{}", fourcc),
            None => write!(f, "invalid"),
        }
    }
}

/// The format as negotiated with the driver.
///
/// Wraps the raw payload written back by S_FMT; the driver may have adjusted
/// width, height and the per-plane sizes, so all readers go through here
/// rather than through the configuration.
#[derive(Clone, Copy)]
pub struct Format {
    raw: v4l2_format,
    buf_type: buffer::Type,
    num_planes: usize,
}

impl Format {
    /// Builds the S_FMT request payload for a configuration.
    ///
    /// Fails with [`CaptureError::UnsupportedFormat`] when the configured
    /// pixel format has no fourcc.
    pub(crate) fn request(config: &Config) -> Result<v4l2_format, CaptureError> {
        let fourcc = config
            .pixel_format
            .fourcc()
            .ok_or(CaptureError::UnsupportedFormat)?;
        let pixelformat = u32::from(fourcc);
        let buf_type = config.buffer_type();

        let mut raw: v4l2_format = unsafe { std::mem::zeroed() };
        raw.type_ = buf_type as u32;
        if buf_type.planar() {
            let pix_mp = unsafe { &mut raw.fmt.pix_mp };
            pix_mp.width = config.width;
            pix_mp.height = config.height;
            pix_mp.pixelformat = pixelformat;
            pix_mp.field = config.pixel_format.field();
            pix_mp.quantization = config.pixel_format.quantization() as u8;
            pix_mp.num_planes = config.num_planes() as u8;
        } else {
            let pix = unsafe { &mut raw.fmt.pix };
            pix.width = config.width;
            pix.height = config.height;
            pix.pixelformat = pixelformat;
            pix.field = config.pixel_format.field();
            pix.quantization = config.pixel_format.quantization();
        }
        Ok(raw)
    }

    /// Wraps the payload written back by the driver.
    pub(crate) fn new(raw: v4l2_format, buf_type: buffer::Type, num_planes: usize) -> Self {
        Format {
            raw,
            buf_type,
            num_planes,
        }
    }

    pub fn width(&self) -> u32 {
        if self.buf_type.planar() {
            unsafe { self.raw.fmt.pix_mp.width }
        } else {
            unsafe { self.raw.fmt.pix.width }
        }
    }

    pub fn height(&self) -> u32 {
        if self.buf_type.planar() {
            unsafe { self.raw.fmt.pix_mp.height }
        } else {
            unsafe { self.raw.fmt.pix.height }
        }
    }

    pub fn num_planes(&self) -> usize {
        self.num_planes
    }

    pub(crate) fn buf_type(&self) -> buffer::Type {
        self.buf_type
    }

    /// Kernel-reported storage requirement of one plane, in bytes.
    pub(crate) fn plane_size(&self, plane: usize) -> u32 {
        if self.buf_type.planar() {
            unsafe { self.raw.fmt.pix_mp.plane_fmt[plane].sizeimage }
        } else {
            unsafe { self.raw.fmt.pix.sizeimage }
        }
    }
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Format")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("buf_type", &self.buf_type)
            .field("num_planes", &self.num_planes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_table() {
        let table = [
            (PixelFormat::Yuyv422, *b"YUYV"),
            (PixelFormat::Yuv422p, *b"422P"),
            (PixelFormat::Nv12, *b"NV12"),
            (PixelFormat::Nv12sp, *b"NM12"),
            (PixelFormat::Mjpeg, *b"MJPG"),
            (PixelFormat::Bgr24, *b"BGR3"),
            (PixelFormat::Rgb24, *b"RGB3"),
        ];
        for (format, repr) in table {
            assert_eq!(format.fourcc(), Some(FourCC::new(&repr)));
        }
        assert_eq!(PixelFormat::Invalid.fourcc(), None);
    }

    #[test]
    fn plane_layout() {
        assert_eq!(PixelFormat::Yuyv422.planes(), 1);
        assert_eq!(PixelFormat::Nv12.planes(), 1);
        assert_eq!(PixelFormat::Mjpeg.planes(), 1);
        assert_eq!(PixelFormat::Bgr24.planes(), 1);
        assert_eq!(PixelFormat::Rgb24.planes(), 1);
        assert_eq!(PixelFormat::Nv12sp.planes(), 2);
        assert_eq!(PixelFormat::Yuv422p.planes(), 3);
    }

    #[test]
    fn quantization_and_field() {
        assert_eq!(PixelFormat::Mjpeg.quantization(), V4L2_QUANTIZATION_FULL_RANGE);
        assert_eq!(PixelFormat::Mjpeg.field(), V4L2_FIELD_NONE);
        assert_eq!(PixelFormat::Nv12.quantization(), V4L2_QUANTIZATION_LIM_RANGE);
        assert_eq!(PixelFormat::Nv12.field(), V4L2_FIELD_INTERLACED);
    }

    #[test]
    fn request_rejects_invalid() {
        let config = Config {
            pixel_format: PixelFormat::Invalid,
            ..Config::default()
        };
        assert!(matches!(
            Format::request(&config),
            Err(CaptureError::UnsupportedFormat)
        ));
    }

    #[test]
    fn request_carries_negotiation_fields() {
        let config = Config {
            width: 1920,
            height: 1080,
            pixel_format: PixelFormat::Nv12sp,
            contiguous: false,
            ..Config::default()
        };
        let raw = Format::request(&config).unwrap();
        assert_eq!(raw.type_, buffer::Type::VideoCaptureMplane as u32);
        unsafe {
            assert_eq!(raw.fmt.pix_mp.width, 1920);
            assert_eq!(raw.fmt.pix_mp.num_planes, 2);
            assert_eq!(raw.fmt.pix_mp.field, V4L2_FIELD_INTERLACED);
        }
    }
}
