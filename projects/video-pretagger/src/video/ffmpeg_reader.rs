use super::VideoReader;
use anyhow::{anyhow, bail, Context, Result};
use ffmpeg_next::codec::decoder;
use ffmpeg_next::format::{self, Pixel};
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::Video as VideoFrame;
use ffmpeg_next::{ffi, media, Packet};
use opencv::core::{Mat, Scalar, CV_8UC3};
use opencv::prelude::*;
use std::path::Path;

/// CPU decoding through libav. Frames are converted to BGR24 so they match
/// what the OpenCV backend hands out.
pub struct FfmpegReader {
    input: format::context::Input,
    stream_index: usize,
    decoder: decoder::Video,
    /// Built from the first decoded frame, whose pixel format is only known then.
    converter: Option<scaling::Context>,
    fps: f64,
    frame_count: usize,
    drained: bool,
}

impl FfmpegReader {
    pub fn new(path: &Path) -> Result<Self> {
        ffmpeg_next::init().context("Failed to initialize FFmpeg")?;

        let input = format::input(path)
            .with_context(|| format!("Failed to open video file {:?}", path))?;
        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| anyhow!("No video stream found in {:?}", path))?;

        let stream_index = stream.index();
        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() > 0 {
            f64::from(rate)
        } else {
            0.0
        };
        // 0 when the container carries no frame index.
        let frame_count = stream.frames().max(0) as usize;

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .context("Failed to create decoder context")?
            .decoder()
            .video()
            .context("Failed to open video decoder")?;

        tracing::info!(
            "FfmpegReader: opened {:?} ({}x{}, fps={:.2}, stream_frames={})",
            path,
            decoder.width(),
            decoder.height(),
            fps,
            frame_count
        );

        Ok(Self {
            input,
            stream_index,
            decoder,
            converter: None,
            fps,
            frame_count,
            drained: false,
        })
    }

    fn next_decoded(&mut self) -> Result<VideoFrame> {
        let mut frame = VideoFrame::empty();
        loop {
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => return Ok(frame),
                Err(ffmpeg_next::Error::Eof) => bail!("End of stream"),
                Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {}
                Err(e) => bail!("Decoder error: {}", e),
            }
            if self.drained {
                bail!("End of stream");
            }
            self.feed_packet()?;
        }
    }

    /// Send the next packet of the video stream to the decoder. Once the
    /// container runs dry the decoder is flushed instead.
    fn feed_packet(&mut self) -> Result<()> {
        let mut packet = Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() == self.stream_index => {
                    self.decoder
                        .send_packet(&packet)
                        .context("Failed to send packet to decoder")?;
                    return Ok(());
                }
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => break,
                Err(e) => bail!("Failed to read packet: {}", e),
            }
        }

        self.decoder
            .send_eof()
            .context("Failed to flush decoder")?;
        self.drained = true;
        Ok(())
    }

    fn to_bgr(&mut self, frame: &VideoFrame) -> Result<VideoFrame> {
        if self.converter.is_none() {
            let converter = scaling::Context::get(
                frame.format(),
                frame.width(),
                frame.height(),
                Pixel::BGR24,
                frame.width(),
                frame.height(),
                scaling::Flags::BILINEAR,
            )
            .context("Failed to create pixel format converter")?;
            self.converter = Some(converter);
        }
        let converter = self
            .converter
            .as_mut()
            .ok_or_else(|| anyhow!("Pixel format converter unavailable"))?;

        let mut bgr = VideoFrame::empty();
        converter
            .run(frame, &mut bgr)
            .context("Pixel format conversion failed")?;
        Ok(bgr)
    }
}

/// Copy a packed BGR24 frame into an owned Mat, dropping any row padding.
fn bgr_to_mat(frame: &VideoFrame) -> Result<Mat> {
    let row_bytes = frame.width() as usize * 3;
    let stride = frame.stride(0);
    let src = frame.data(0);

    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )?;
    for (y, dst_row) in mat.data_bytes_mut()?.chunks_exact_mut(row_bytes).enumerate() {
        let start = y * stride;
        dst_row.copy_from_slice(&src[start..start + row_bytes]);
    }
    Ok(mat)
}

impl VideoReader for FfmpegReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.frame_count)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(self.fps)
    }

    fn read_frame(&mut self) -> Result<Mat> {
        let decoded = self.next_decoded()?;
        let bgr = self.to_bgr(&decoded)?;
        bgr_to_mat(&bgr)
    }
}
