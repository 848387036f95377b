use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use gst::prelude::*;
use gst::{ClockTime, MessageType, MessageView, SeekFlags, State};
use gst_app::AppSink;
use gst_video::VideoFrameExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::TimelineConfig;
use crate::video::clock::MediaSource;
use crate::video::thumbnail::{FrameGenerator, GeneratedFrame, ThumbnailImage, ThumbnailRequest};

const BUS_POLL_MS: u64 = 100;
const PREROLL_TIMEOUT_SECS: u64 = 5;
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Grabs still frames with a paused decode pipeline, seeking accurately to
/// each requested time in turn.
#[derive(Clone, Debug)]
pub struct GstFrameGenerator {
    thumb_height: u32,
}

impl GstFrameGenerator {
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            thumb_height: config.thumb_height.round().max(1.0) as u32,
        }
    }

    fn create_pipeline(uri: &str) -> anyhow::Result<(gst::Pipeline, AppSink)> {
        let decode = gst::ElementFactory::make("uridecodebin")
            .name("decode")
            .property("uri", uri)
            .build()
            .context("could not create uridecodebin")?;
        let convert = gst::ElementFactory::make("videoconvert")
            .build()
            .context("could not create videoconvert")?;
        let scale = gst::ElementFactory::make("videoscale")
            .build()
            .context("could not create videoscale")?;
        let appsink = AppSink::builder()
            .sync(false)
            .caps(
                &gst_video::VideoCapsBuilder::new()
                    .format(gst_video::VideoFormat::Rgb)
                    .build(),
            )
            .build();

        let pipeline = gst::Pipeline::new();
        pipeline.add_many([&decode, &convert, &scale, appsink.upcast_ref()])?;
        gst::Element::link_many([&convert, &scale, appsink.upcast_ref()])?;

        // uridecodebin exposes its pads only once the stream is typed
        let convert = convert.downgrade();
        decode.connect_pad_added(move |_, pad| {
            if let Some(convert) = convert.upgrade() {
                link_video_pad(pad, &convert);
            }
        });

        Ok((pipeline, appsink))
    }

    fn wait_for_preroll(
        bus: &gst::Bus,
        cancel: &CancellationToken,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let deadline = Instant::now() + timeout;

        while !cancel.is_cancelled() {
            if Instant::now() >= deadline {
                bail!("media did not preroll within {timeout:?}");
            }
            let Some(message) = bus.timed_pop_filtered(
                ClockTime::from_mseconds(BUS_POLL_MS),
                &[MessageType::AsyncDone, MessageType::Error],
            ) else {
                continue;
            };
            match message.view() {
                MessageView::AsyncDone(..) => return Ok(()),
                MessageView::Error(err) => bail!("{} ({:?})", err.error(), err.debug()),
                _ => {}
            }
        }
        Ok(())
    }

    fn grab(
        &self,
        pipeline: &gst::Pipeline,
        appsink: &AppSink,
        time: f64,
    ) -> anyhow::Result<ThumbnailImage> {
        let target = ClockTime::from_nseconds((time.max(0.0) * 1_000_000_000.0) as u64);
        pipeline.seek_simple(SeekFlags::FLUSH | SeekFlags::ACCURATE, target)?;

        let sample = appsink
            .try_pull_preroll(ClockTime::from_seconds(PREROLL_TIMEOUT_SECS))
            .context("no frame prerolled after seek")?;
        self.sample_to_image(&sample)
    }

    fn sample_to_image(&self, sample: &gst::Sample) -> anyhow::Result<ThumbnailImage> {
        let buffer = sample.buffer().context("sample without buffer")?;
        let caps = sample.caps().context("sample without caps")?;
        let info = gst_video::VideoInfo::from_caps(caps)?;

        let frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &info)
            .map_err(|_| anyhow!("could not map video frame"))?;

        let aspect_ratio = (frame.width() as f64 * info.par().numer() as f64)
            / (frame.height() as f64 * info.par().denom() as f64);
        let target_width = (self.thumb_height as f64 * aspect_ratio).round().max(1.0) as u32;

        let img = image::FlatSamples::<&[u8]> {
            samples: frame.plane_data(0)?,
            layout: image::flat::SampleLayout {
                channels: 3,
                channel_stride: 1,
                width: frame.width(),
                width_stride: 3,
                height: frame.height(),
                height_stride: frame.plane_stride()[0] as usize,
            },
            color_hint: Some(image::ColorType::Rgb8),
        };
        let view = img
            .as_view::<image::Rgb<u8>>()
            .map_err(|err| anyhow!("could not view frame: {err}"))?;

        Ok(image::imageops::thumbnail(&view, target_width, self.thumb_height))
    }

    fn grab_all(
        &self,
        pipeline: &gst::Pipeline,
        appsink: &AppSink,
        source: &MediaSource,
        requests: &[ThumbnailRequest],
        frames: &mpsc::UnboundedSender<GeneratedFrame>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let bus = pipeline.bus().context("thumbnail pipeline without a bus")?;
        Self::wait_for_preroll(&bus, cancel, OPEN_TIMEOUT)?;

        for request in requests {
            if cancel.is_cancelled() {
                debug!(uri = %source.uri, "thumbnail generation cancelled");
                break;
            }

            let image = match self.grab(pipeline, appsink, request.requested_time) {
                Ok(image) => Some(image),
                Err(err) => {
                    debug!(index = request.index, %err, "could not grab frame");
                    None
                }
            };
            let frame = GeneratedFrame {
                index: request.index,
                image,
            };
            if frames.send(frame).is_err() {
                break;
            }
        }
        Ok(())
    }
}

impl FrameGenerator for GstFrameGenerator {
    fn generate(
        &self,
        source: &MediaSource,
        requests: &[ThumbnailRequest],
        frames: &mpsc::UnboundedSender<GeneratedFrame>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        gst::init()?;

        let (pipeline, appsink) = Self::create_pipeline(&source.uri)?;
        let result = pipeline
            .set_state(State::Paused)
            .map_err(anyhow::Error::from)
            .and_then(|_| self.grab_all(&pipeline, &appsink, source, requests, frames, cancel));

        if let Err(err) = pipeline.set_state(State::Null) {
            warn!(uri = %source.uri, %err, "could not stop thumbnail pipeline");
        }
        result
    }
}

fn link_video_pad(pad: &gst::Pad, convert: &gst::Element) {
    let is_video = pad
        .current_caps()
        .and_then(|caps| {
            caps.structure(0)
                .map(|structure| structure.name().starts_with("video/"))
        })
        .unwrap_or(false);
    if !is_video {
        trace!(pad = %pad.name(), "ignoring non-video pad");
        return;
    }

    let Some(sink) = convert.static_pad("sink") else {
        return;
    };
    if sink.is_linked() {
        return;
    }
    if let Err(err) = pad.link(&sink) {
        warn!(?err, "could not link decoded video pad");
    }
}
