//! Page embedding: one raster image → one new page sized to the image.
//!
//! A page is exactly `width × height` points for a `width × height` pixel
//! image and its content stream draws the image once, at the origin, covering
//! the whole page:
//!
//! ```text
//! q  W 0 0 H 0 0 cm  /Im0 Do  Q
//! ```
//!
//! ## Storage
//!
//! * Baseline/progressive JPEGs with 1 or 3 colour components are stored
//!   verbatim with `/DCTDecode`; PDF viewers decode them natively, so there
//!   is no generation loss and the file stays the size of the upload.
//! * Everything else (PNG, CMYK JPEG, or passthrough disabled) is stored as
//!   8-bit Gray/RGB samples under `/FlateDecode`. An alpha channel becomes a
//!   separate `/SMask` image.
//!
//! The image is always fully decoded first, even on the passthrough path, so
//! a truncated or corrupt upload is rejected here rather than producing a
//! page that viewers cannot render.

use crate::error::SkipReason;
use crate::output::PageOrigin;
use crate::pipeline::assemble::{PageBatch, PreparedPage};
use crate::pipeline::format::FileFormat;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageReader, Limits};
use lopdf::{dictionary, Object, ObjectId, Stream};
use std::io::{Cursor, Write};
use tracing::debug;

/// Knobs for the embedder, taken from [`crate::config::ConsolidationConfig`].
#[derive(Debug, Clone, Copy)]
pub struct EmbedOptions {
    pub jpeg_passthrough: bool,
    pub max_image_pixels: u64,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            jpeg_passthrough: true,
            max_image_pixels: 100_000_000,
        }
    }
}

/// Build a single-page batch for a PNG or JPEG.
///
/// Object numbers are allocated from `first_id` upwards.
///
/// # Errors
/// [`SkipReason::Decode`] when the bytes are not a decodable image of the
/// declared format or exceed `max_image_pixels`.
pub fn embed_image(
    bytes: &[u8],
    format: FileFormat,
    first_id: u32,
    options: &EmbedOptions,
) -> Result<PageBatch, SkipReason> {
    let image_format = format
        .image_format()
        .ok_or_else(|| SkipReason::decode(format.to_string(), "not a raster format"))?;

    let img = decode(bytes, format, image_format, options.max_image_pixels)?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err(SkipReason::decode(format.to_string(), "image has zero size"));
    }

    let mut ids = IdAllocator::new(first_id);
    let mut objects: Vec<(ObjectId, Object)> = Vec::with_capacity(4);

    let passthrough = if format == FileFormat::Jpeg && options.jpeg_passthrough {
        jpeg_components(bytes).and_then(color_space_for)
    } else {
        None
    };

    let (image_stream, is_gray) = match passthrough {
        Some((color_space, is_gray)) => {
            let mut stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                bytes.to_vec(),
            );
            stream.allows_compression = false;
            (stream, is_gray)
        }
        None => {
            let (mut stream, is_gray, alpha) = raw_image_stream(&img, format)?;
            if let Some(alpha) = alpha {
                let smask_id = ids.alloc();
                let smask = flate_stream(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => width as i64,
                        "Height" => height as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    },
                    &alpha,
                    format,
                )?;
                objects.push((smask_id, Object::Stream(smask)));
                stream.dict.set("SMask", smask_id);
            }
            (stream, is_gray)
        }
    };

    let image_id = ids.alloc();
    objects.push((image_id, Object::Stream(image_stream)));

    let content = format!("q\n{width} 0 0 {height} 0 0 cm\n/Im0 Do\nQ\n");
    let content_id = ids.alloc();
    objects.push((
        content_id,
        Object::Stream(Stream::new(dictionary! {}, content.into_bytes())),
    ));

    let proc_set: Vec<Object> = vec![
        Object::Name(b"PDF".to_vec()),
        Object::Name(if is_gray { b"ImageB".to_vec() } else { b"ImageC".to_vec() }),
    ];
    let page_id = ids.alloc();
    let page = dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
            "ProcSet" => proc_set,
        },
        "Contents" => content_id,
    };

    debug!(
        "Embedded {} image {}x{} px ({})",
        format,
        width,
        height,
        if passthrough.is_some() { "DCT passthrough" } else { "flate" }
    );

    Ok(PageBatch {
        objects,
        pages: vec![PreparedPage {
            id: page_id,
            dict: page,
            width: width as f64,
            height: height as f64,
            origin: PageOrigin::Embedded { format },
        }],
    })
}

fn decode(
    bytes: &[u8],
    format: FileFormat,
    image_format: image::ImageFormat,
    max_pixels: u64,
) -> Result<DynamicImage, SkipReason> {
    let (w, h) = ImageReader::with_format(Cursor::new(bytes), image_format)
        .into_dimensions()
        .map_err(|e| SkipReason::decode(format.to_string(), e))?;

    let pixels = w as u64 * h as u64;
    if pixels > max_pixels {
        return Err(SkipReason::decode(
            format.to_string(),
            format!("{w}x{h} px exceeds the {max_pixels} pixel limit"),
        ));
    }

    let mut limits = Limits::default();
    // RGBA16 is the widest buffer either decoder produces.
    limits.max_alloc = Some(max_pixels.saturating_mul(8).max(limits.max_alloc.unwrap_or(0)));

    let mut reader = ImageReader::with_format(Cursor::new(bytes), image_format);
    reader.limits(limits);
    reader
        .decode()
        .map_err(|e| SkipReason::decode(format.to_string(), e))
}

/// Flate-compressed 8-bit samples plus the alpha plane when it is not opaque.
fn raw_image_stream(
    img: &DynamicImage,
    format: FileFormat,
) -> Result<(Stream, bool, Option<Vec<u8>>), SkipReason> {
    let color = img.color();
    let is_gray = matches!(
        color,
        image::ColorType::L8 | image::ColorType::La8 | image::ColorType::L16 | image::ColorType::La16
    );

    let samples = if is_gray {
        img.to_luma8().into_raw()
    } else {
        img.to_rgb8().into_raw()
    };

    let alpha = if color.has_alpha() {
        let plane: Vec<u8> = img.to_rgba8().pixels().map(|p| p[3]).collect();
        if plane.iter().all(|&a| a == u8::MAX) {
            None
        } else {
            Some(plane)
        }
    } else {
        None
    };

    let stream = flate_stream(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img.width() as i64,
            "Height" => img.height() as i64,
            "ColorSpace" => if is_gray { "DeviceGray" } else { "DeviceRGB" },
            "BitsPerComponent" => 8,
        },
        &samples,
        format,
    )?;

    Ok((stream, is_gray, alpha))
}

fn flate_stream(
    mut dict: lopdf::Dictionary,
    data: &[u8],
    format: FileFormat,
) -> Result<Stream, SkipReason> {
    let compress_err =
        |e: std::io::Error| SkipReason::decode(format.to_string(), format!("compressing samples: {e}"));

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data).map_err(compress_err)?;
    let compressed = encoder.finish().map_err(compress_err)?;

    dict.set("Filter", "FlateDecode");
    let mut stream = Stream::new(dict, compressed);
    stream.allows_compression = false;
    Ok(stream)
}

/// Map a JPEG component count to a PDF colour space.
fn color_space_for(components: u8) -> Option<(&'static str, bool)> {
    match components {
        1 => Some(("DeviceGray", true)),
        3 => Some(("DeviceRGB", false)),
        // CMYK/YCCK: the /Decode array depends on the Adobe marker, so these
        // go through the decoder instead.
        _ => None,
    }
}

/// Number of colour components declared in the JPEG frame header.
pub(crate) fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        match marker {
            // Fill bytes.
            0xFF => {
                pos += 1;
                continue;
            }
            // Standalone markers without a length.
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            // Start of scan / end of image before a frame header.
            0xDA | 0xD9 => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // FF Cn | Lf(2) | P(1) | Y(2) | X(2) | Nf(1)
            return bytes.get(pos + 9).copied();
        }
        if len < 2 {
            return None;
        }
        pos += 2 + len;
    }
    None
}

/// Sequential object numbers starting at a given value.
struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    fn new(first: u32) -> Self {
        Self { next: first }
    }

    fn alloc(&mut self) -> ObjectId {
        let id = (self.next, 0);
        self.next += 1;
        id
    }
}
