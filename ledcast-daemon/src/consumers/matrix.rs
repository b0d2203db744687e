//! The LED matrix sink: a narrow seam over the panel driver so the draw
//! loop can be exercised without hardware.

use anyhow::anyhow;
use ledcast_codecs::Pixel;
use rpi_led_matrix::{LedCanvas, LedColor, LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use tracing::info;

use crate::cli_args::Opt;

/// What the draw loop needs from a display: geometry, per-pixel writes
/// into the back buffer, and an atomic present on the next VSync.
pub trait MatrixSink {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn set_pixel(&mut self, x: usize, y: usize, pixel: Pixel);
    fn present(&mut self) -> anyhow::Result<()>;
}

/// The real panel, driven through the `rpi-led-matrix` binding with
/// double-buffered presentation: writes land in an offscreen canvas and
/// `present` swaps it in on VSync.
pub struct LedPanel {
    matrix: LedMatrix,
    canvas: Option<LedCanvas>,
    width: usize,
    height: usize,
}

impl LedPanel {
    pub fn new(opt: &Opt) -> anyhow::Result<Self> {
        let mut options = LedMatrixOptions::new();
        options.set_hardware_mapping(&opt.hardware_mapping);
        options.set_rows(opt.rows);
        options.set_cols(opt.cols);
        options.set_chain_length(opt.chain_length);
        options.set_parallel(opt.parallel);
        options.set_limit_refresh(opt.limit_refresh_rate);

        let mut rt_options = LedRuntimeOptions::new();
        rt_options.set_gpio_slowdown(opt.gpio_slowdown);

        let matrix = LedMatrix::new(Some(options), Some(rt_options))
            .map_err(|e| anyhow!("failed to create LED matrix: {e}"))?;

        let mut canvas = matrix.offscreen_canvas();
        let (width, height) = canvas.canvas_size();
        info!("matrix size: {width}x{height} ({} LEDs)", width * height);

        // Solid blue splash until the first frame arrives, so a powered
        // panel shows the receiver is up.
        canvas.fill(&LedColor {
            red: 0,
            green: 0,
            blue: 128,
        });
        let canvas = matrix.swap(canvas);

        Ok(Self {
            matrix,
            canvas: Some(canvas),
            width: width as usize,
            height: height as usize,
        })
    }
}

impl MatrixSink for LedPanel {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn set_pixel(&mut self, x: usize, y: usize, pixel: Pixel) {
        if let Some(canvas) = self.canvas.as_mut() {
            canvas.set(
                x as i32,
                y as i32,
                &LedColor {
                    red: pixel.r,
                    green: pixel.g,
                    blue: pixel.b,
                },
            );
        }
    }

    fn present(&mut self) -> anyhow::Result<()> {
        let canvas = self
            .canvas
            .take()
            .ok_or_else(|| anyhow!("offscreen canvas missing"))?;
        self.canvas = Some(self.matrix.swap(canvas));
        Ok(())
    }
}
