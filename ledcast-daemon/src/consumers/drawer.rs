//! The paced draw loop: pops frames from the playout buffer as their
//! timestamps come due and pushes their pixels to the matrix.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ledcast_codecs::clock::{self, FrameTimer};
use ledcast_codecs::{Frame, PlayoutBuffer};
use tracing::trace;

use crate::consumers::matrix::MatrixSink;

/// Longest single sleep between pacing checks, in microseconds. Roughly
/// one frame at 25 fps: an empty buffer still wakes promptly when the
/// producer starts sending.
const MAX_SLEEP_MICROS: f64 = 40_000.0;

pub struct PacedDrawer {
    frames: Arc<PlayoutBuffer>,
    shutdown: Arc<AtomicBool>,
    /// Instantaneous draw rate, published for the status responses.
    fps_drawing: Arc<AtomicU32>,
    /// When set, an already-due frame is dropped instead of drawn if the
    /// frame behind it is also due, letting a backlogged receiver catch
    /// up. Off by default: every due frame is drawn.
    burn_extra_frames: bool,
    timer: FrameTimer,
}

impl PacedDrawer {
    pub fn new(
        frames: Arc<PlayoutBuffer>,
        shutdown: Arc<AtomicBool>,
        fps_drawing: Arc<AtomicU32>,
        burn_extra_frames: bool,
    ) -> Self {
        Self {
            frames,
            shutdown,
            fps_drawing,
            burn_extra_frames,
            timer: FrameTimer::new(),
        }
    }

    /// Loop until shutdown. The only error path is the fatal
    /// frame-size/matrix mismatch surfaced by [`draw_frame`].
    pub fn run(&mut self, sink: &mut dyn MatrixSink) -> anyhow::Result<()> {
        while !self.shutdown.load(Ordering::Relaxed) {
            self.drain_due(sink)?;

            let age = self.frames.age_of_oldest(clock::now());
            let delay_micros = (age * 1_000_000.0).min(MAX_SLEEP_MICROS);
            if delay_micros > 0.0 {
                thread::sleep(Duration::from_micros(delay_micros as u64));
            }
        }
        Ok(())
    }

    /// Draw every frame whose timestamp has matured.
    fn drain_due(&mut self, sink: &mut dyn MatrixSink) -> anyhow::Result<()> {
        while self.frames.age_of_oldest(clock::now()) <= 0.0 {
            let Some(frame) = self.frames.pop_oldest() else {
                continue;
            };

            if self.burn_extra_frames && self.frames.age_of_oldest(clock::now()) <= 0.0 {
                trace!("dropping overdue frame to catch up");
                continue;
            }

            draw_frame(sink, &frame)?;
            self.timer.new_frame();
            self.fps_drawing
                .store(self.timer.fps().round() as u32, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Write one frame to the sink and present it.
///
/// The horizontal flip is deliberate: the producer's coordinate system
/// is mirrored relative to the panel chain. A pixel count that does not
/// match the matrix is a configuration mismatch between producer and
/// receiver and is fatal.
pub fn draw_frame(sink: &mut dyn MatrixSink, frame: &Frame) -> anyhow::Result<()> {
    let width = sink.width();
    let height = sink.height();
    if frame.pixel_count() != width * height {
        anyhow::bail!(
            "frame carries {} pixels but the matrix is {width}x{height}; \
             producer and receiver disagree about the panel geometry",
            frame.pixel_count()
        );
    }

    for (i, pixel) in frame.pixels().iter().enumerate() {
        let x = i % width;
        let y = i / width;
        sink.set_pixel(width - 1 - x, y, *pixel);
    }
    sink.present()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledcast_codecs::Pixel;

    /// Records writes instead of driving hardware.
    struct MockMatrix {
        width: usize,
        height: usize,
        writes: Vec<(usize, usize, Pixel)>,
        presents: usize,
    }

    impl MockMatrix {
        fn new(width: usize, height: usize) -> Self {
            Self {
                width,
                height,
                writes: Vec::new(),
                presents: 0,
            }
        }
    }

    impl MatrixSink for MockMatrix {
        fn width(&self) -> usize {
            self.width
        }
        fn height(&self) -> usize {
            self.height
        }
        fn set_pixel(&mut self, x: usize, y: usize, pixel: Pixel) {
            self.writes.push((x, y, pixel));
        }
        fn present(&mut self) -> anyhow::Result<()> {
            self.presents += 1;
            Ok(())
        }
    }

    fn pixel(v: u8) -> Pixel {
        Pixel { r: v, g: v, b: v }
    }

    #[test]
    fn pixels_are_mirrored_horizontally() {
        let mut sink = MockMatrix::new(3, 2);
        let frame = Frame::new(0, 0, (0..6).map(pixel).collect());

        draw_frame(&mut sink, &frame).unwrap();

        // Linear index 0 is the top-left of the producer's image and
        // lands on the top-right of the panel.
        assert_eq!(sink.writes[0], (2, 0, pixel(0)));
        assert_eq!(sink.writes[1], (1, 0, pixel(1)));
        assert_eq!(sink.writes[2], (0, 0, pixel(2)));
        assert_eq!(sink.writes[3], (2, 1, pixel(3)));
        assert_eq!(sink.writes[5], (0, 1, pixel(5)));
        assert_eq!(sink.presents, 1);
    }

    #[test]
    fn size_mismatch_is_fatal_and_draws_nothing() {
        let mut sink = MockMatrix::new(4, 4);
        let frame = Frame::new(0, 0, (0..6).map(pixel).collect());

        assert!(draw_frame(&mut sink, &frame).is_err());
        assert!(sink.writes.is_empty());
        assert_eq!(sink.presents, 0);
    }

    #[test]
    fn due_frame_is_drawn_without_sleeping() {
        let frames = Arc::new(PlayoutBuffer::new(4));
        let now = clock::now();
        frames.push(Frame::new((now - 1.0) as u64, 0, vec![pixel(9); 4]));

        let mut drawer = PacedDrawer::new(
            frames,
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU32::new(0)),
            false,
        );
        let mut sink = MockMatrix::new(2, 2);
        drawer.drain_due(&mut sink).unwrap();

        assert_eq!(sink.presents, 1);
        assert_eq!(sink.writes.len(), 4);
    }

    #[test]
    fn future_frame_is_left_in_the_buffer() {
        let frames = Arc::new(PlayoutBuffer::new(4));
        let now = clock::now();
        frames.push(Frame::new((now + 60.0) as u64, 0, vec![pixel(1); 4]));

        let mut drawer = PacedDrawer::new(
            frames.clone(),
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU32::new(0)),
            false,
        );
        let mut sink = MockMatrix::new(2, 2);
        drawer.drain_due(&mut sink).unwrap();

        assert_eq!(sink.presents, 0);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn burn_extra_frames_drops_backlog_but_draws_the_last() {
        let frames = Arc::new(PlayoutBuffer::new(8));
        let now = clock::now();
        for i in 0..3 {
            frames.push(Frame::new((now - 10.0 + i as f64) as u64, 0, vec![pixel(i); 4]));
        }

        let mut drawer = PacedDrawer::new(
            frames.clone(),
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU32::new(0)),
            true,
        );
        let mut sink = MockMatrix::new(2, 2);
        drawer.drain_due(&mut sink).unwrap();

        // The first two due frames are burned; only the last is drawn.
        assert_eq!(sink.presents, 1);
        assert_eq!(sink.writes[0].2, pixel(2));
        assert!(frames.is_empty());
    }

    #[test]
    fn every_due_frame_is_drawn_when_burning_is_off() {
        let frames = Arc::new(PlayoutBuffer::new(8));
        let now = clock::now();
        for i in 0..3 {
            frames.push(Frame::new((now - 10.0 + i as f64) as u64, 0, vec![pixel(i); 4]));
        }

        let mut drawer = PacedDrawer::new(
            frames.clone(),
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU32::new(0)),
            false,
        );
        let mut sink = MockMatrix::new(2, 2);
        drawer.drain_due(&mut sink).unwrap();

        assert_eq!(sink.presents, 3);
        assert!(frames.is_empty());
    }
}
