use anyhow::{anyhow, bail};
use image::RgbaImage;

use crate::config::JpegBackend;

use super::Image;

pub(super) fn decode(data: &[u8], backend: JpegBackend) -> anyhow::Result<Image> {
    let buf = match backend {
        JpegBackend::JpegDecoder => {
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8()
        }
        JpegBackend::ZuneJpeg => {
            use zune_jpeg::zune_core::colorspace::ColorSpace;
            use zune_jpeg::zune_core::options::DecoderOptions;

            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA),
                data,
            );
            decomp
                .decode_headers()
                .map_err(|e| anyhow!("failed to decode JPEG headers: {e:?}"))?;
            let colorspace = decomp
                .get_output_colorspace()
                .ok_or_else(|| anyhow!("JPEG decoder did not report an output colorspace"))?;
            if colorspace != ColorSpace::RGBA {
                bail!("unsupported colorspace {colorspace:?} (expected RGBA)");
            }

            let size = decomp
                .output_buffer_size()
                .ok_or_else(|| anyhow!("JPEG decoder did not report an output size"))?;
            let mut buf = vec![0; size];
            decomp
                .decode_into(&mut buf)
                .map_err(|e| anyhow!("failed to decode JPEG: {e:?}"))?;
            let (width, height) = decomp
                .dimensions()
                .ok_or_else(|| anyhow!("JPEG decoder did not report image dimensions"))?;
            RgbaImage::from_raw(width.into(), height.into(), buf)
                .ok_or_else(|| anyhow!("decoded JPEG buffer does not match its dimensions"))?
        }
    };

    Ok(Image { buf })
}
