//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::cmp::Reverse;

use anyhow::{bail, Context};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{
    config::{JpegBackend, Settings},
    image::{Image, Resolution},
    timer::Timer,
};

use super::FrameSource;

/// Frame size and rate the webcam is asked for. Lower values are accepted when the camera can't
/// deliver them.
#[derive(Debug, Clone, Copy)]
pub struct WebcamOptions {
    pub resolution: Option<Resolution>,
    pub fps: Option<u32>,
}

impl Default for WebcamOptions {
    fn default() -> Self {
        Self {
            resolution: Some(Resolution::RES_VGA),
            fps: Some(30),
        }
    }
}

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

fn negotiate_format(
    device: &Device,
    mut prefs: WebcamOptions,
) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixel_format() == PixelFormat::JPEG || format.pixel_format() == PixelFormat::MJPG {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    loop {
        if let Some(fmt) = pick_format(&formats, prefs) {
            return Ok((
                PixFormat::new(
                    fmt.resolution.width(),
                    fmt.resolution.height(),
                    pixel_format,
                ),
                fmt.frame_interval,
            ));
        }

        // Give up on the frame rate first, then on the resolution.
        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        if prefs.fps.take().is_none() && prefs.resolution.take().is_none() {
            break;
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }

    bail!("failed to negotiate a webcam format")
}

/// Picks the smallest format that satisfies `prefs`, preferring higher frame rates.
///
/// Without any preferences, the largest format is picked.
fn pick_format(formats: &[FrameFormat], prefs: WebcamOptions) -> Option<FrameFormat> {
    let mut eligible = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();

    if prefs.resolution.is_some() {
        eligible.sort_by_key(|fmt| (Reverse(fmt.resolution.num_pixels()), Reverse(fmt.frame_interval)));
    } else {
        eligible.sort_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.frame_interval)));
    }
    eligible.last().copied()
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    width: u32,
    height: u32,
    jpeg_backend: JpegBackend,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first supported webcam, or the one named in `settings`.
    ///
    /// This can block for a significant amount of time while the webcam initializes (on the order
    /// of hundreds of milliseconds).
    pub fn open(settings: &Settings, options: WebcamOptions) -> anyhow::Result<Self> {
        let devices = linuxvideo::list().context("failed to enumerate video devices")?;
        for res in devices {
            match res {
                Ok(dev) => match Self::open_impl(dev, settings, options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => {
                        log::debug!("{}", e);
                    }
                },
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        match &settings.webcam_name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_impl(
        dev: Device,
        settings: &Settings,
        options: WebcamOptions,
    ) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if let Some(name) = &settings.webcam_name {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options)?;

        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let width = format.width();
        let height = format.height();

        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {}x{} @ {:.1}Hz",
            caps.card(),
            path.display(),
            width,
            height,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream()?;

        Ok(Some(Self {
            stream,
            width,
            height,
            jpeg_backend: settings.jpeg_backend,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Returns profiling timers for webcam access and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

impl FrameSource for Webcam {
    fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let backend = self.jpeg_backend;
        let (width, height) = (self.width, self.height);
        let t_decode = &self.t_decode;
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let image = match t_decode.time(|| Image::decode_jpeg(&buf, backend)) {
                    Ok(image) => image,
                    Err(e) => {
                        // Even good webcams produce the occasional corrupted MJPG frame. Hand back
                        // a blank image instead of ending the stream.
                        log::error!("webcam decode error: {}", e);
                        Image::new(width, height)
                    }
                };
                Ok(image)
            })
            .context("failed to read webcam frame")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(w: u32, h: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(w, h),
            frame_interval: Fract::new(1, fps),
        }
    }

    #[test]
    fn picks_smallest_matching_resolution() {
        let formats = [
            format(1920, 1080, 30),
            format(640, 480, 30),
            format(640, 480, 15),
            format(320, 240, 30),
        ];
        let picked = pick_format(&formats, WebcamOptions::default()).unwrap();
        assert_eq!(picked.resolution, Resolution::new(640, 480));
        assert_eq!(picked.frame_interval, Fract::new(1, 30));
    }

    #[test]
    fn gives_up_on_framerate_first() {
        let formats = [format(1280, 720, 10), format(320, 240, 30)];
        assert!(pick_format(&formats, WebcamOptions::default()).is_none());

        let no_fps = WebcamOptions {
            fps: None,
            ..WebcamOptions::default()
        };
        let picked = pick_format(&formats, no_fps).unwrap();
        assert_eq!(picked.resolution, Resolution::new(1280, 720));
    }
}
