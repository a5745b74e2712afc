//! PNG decoding and image XObject construction

use super::font::zlib;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// An image embedded in the document, drawable on any page
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHandle {
    pub(crate) id: ObjectId,
    pub(crate) name: String,
    /// Natural width in pixels
    pub width: u32,
    /// Natural height in pixels
    pub height: u32,
}

/// 8-bit samples split into color and optional alpha planes
struct DecodedPng {
    width: u32,
    height: u32,
    color_space: &'static str,
    color: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

fn decode_png(bytes: &[u8]) -> Result<DecodedPng, String> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().map_err(|e| e.to_string())?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf).map_err(|e| e.to_string())?;
    buf.truncate(frame.buffer_size());

    let (color_space, channels, has_alpha) = match frame.color_type {
        png::ColorType::Grayscale => ("DeviceGray", 1, false),
        png::ColorType::GrayscaleAlpha => ("DeviceGray", 2, true),
        png::ColorType::Rgb => ("DeviceRGB", 3, false),
        png::ColorType::Rgba => ("DeviceRGB", 4, true),
        png::ColorType::Indexed => return Err("indexed PNG was not expanded".to_string()),
    };

    if !has_alpha {
        return Ok(DecodedPng {
            width: frame.width,
            height: frame.height,
            color_space,
            color: buf,
            alpha: None,
        });
    }

    let color_channels = channels - 1;
    let pixels = buf.len() / channels;
    let mut color = Vec::with_capacity(pixels * color_channels);
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in buf.chunks_exact(channels) {
        color.extend_from_slice(&pixel[..color_channels]);
        alpha.push(pixel[color_channels]);
    }

    Ok(DecodedPng {
        width: frame.width,
        height: frame.height,
        color_space,
        color,
        alpha: Some(alpha),
    })
}

/// Decode a PNG and add it to `doc` as an image XObject (alpha becomes an SMask)
pub(crate) fn embed_png(
    doc: &mut Document,
    bytes: &[u8],
    name: String,
) -> Result<ImageHandle, String> {
    let image = decode_png(bytes)?;

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => image.color_space,
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if let Some(alpha) = &image.alpha {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            zlib(alpha).map_err(|e| e.to_string())?,
        )
        .with_compression(false);
        let smask_id = doc.add_object(smask);
        dict.set("SMask", Object::Reference(smask_id));
    }

    let stream = Stream::new(dict, zlib(&image.color).map_err(|e| e.to_string())?)
        .with_compression(false);
    let id = doc.add_object(stream);

    Ok(ImageHandle {
        id,
        name,
        width: image.width,
        height: image.height,
    })
}
