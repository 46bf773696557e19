//! FFmpeg-backed frame source for video containers.
//!
//! Decodes the best video track of a local file, scaling every frame to
//! the configured output resolution in RGB24.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::FrameSource;
use crate::frame::Frame;

pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    resolution: (u32, u32),
    drained: bool,
}

impl FfmpegSource {
    pub fn new(path: &str, resolution: (u32, u32)) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video input '{path}'"))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("'{path}' has no video track"))?;
        let stream_index = stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            resolution.0,
            resolution.1,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            resolution,
            drained: false,
        })
    }

    /// `Ok(None)` means the decoder wants more input (or is drained), not
    /// that decoding failed; real decode errors propagate.
    fn receive_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {}
            Err(ffmpeg::Error::Other {
                errno: ffmpeg::util::error::EAGAIN,
            })
            | Err(ffmpeg::Error::Eof) => return Ok(None),
            Err(e) => {
                return Err(e).context("receive frame from ffmpeg decoder");
            }
        }
        let mut rgb = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb)
            .context("scale frame to RGB")?;
        let pixels = frame_to_pixels(&rgb, self.resolution)?;
        let frame = Frame::from_raw(self.resolution.0, self.resolution.1, pixels)
            .ok_or_else(|| anyhow!("decoded frame has the wrong byte length"))?;
        Ok(Some(frame))
    }
}

impl FrameSource for FfmpegSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.receive_frame()? {
                return Ok(Some(frame));
            }
            if self.drained {
                return Ok(None);
            }

            let mut sent = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?;
                sent = true;
                break;
            }
            if !sent {
                self.decoder
                    .send_eof()
                    .context("flush ffmpeg decoder")?;
                self.drained = true;
            }
        }
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video, resolution: (u32, u32)) -> Result<Vec<u8>> {
    let (width, height) = resolution;
    let row_bytes = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        return Ok(data[..row_bytes * height as usize].to_vec());
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }
    Ok(pixels)
}
