use clap::Parser;
use ledcast_codecs::playout_buffer::DEFAULT_CAPACITY;
use ledcast_codecs::wire::DEFAULT_PORT;

/// LED Matrix Frame Receiver
///
/// Listens for timestamped pixel frames streamed over TCP by a desktop
/// producer and draws each one on a chained RGB LED matrix the moment
/// its embedded wall-clock timestamp comes due.
#[derive(Parser, Debug, Clone)]
#[clap(name = "ledcast-daemon", version)]
pub struct Opt {
    /// TCP port to listen on.
    #[clap(long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of frames the playout buffer holds before the oldest is
    /// evicted to admit a new one.
    #[clap(long = "capacity", default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// When the buffer has fallen behind, drop already-due frames
    /// instead of drawing every one of them.
    #[clap(long = "burn-extra-frames")]
    pub burn_extra_frames: bool,

    /// GPIO hardware mapping name understood by the matrix driver.
    #[clap(long = "hardware-mapping", default_value = "adafruit-hat")]
    pub hardware_mapping: String,

    /// Rows per panel.
    #[clap(long = "rows", default_value_t = 32)]
    pub rows: u32,

    /// Columns per panel.
    #[clap(long = "cols", default_value_t = 64)]
    pub cols: u32,

    /// Number of daisy-chained panels.
    #[clap(long = "chain-length", default_value_t = 8)]
    pub chain_length: u32,

    /// Number of parallel chains.
    #[clap(long = "parallel", default_value_t = 1)]
    pub parallel: u32,

    /// GPIO slowdown factor; raise this on faster Pi models.
    #[clap(long = "gpio-slowdown", default_value_t = 5)]
    pub gpio_slowdown: u32,

    /// Cap on the matrix refresh rate in Hz (0 disables the cap).
    /// Capping keeps CPU load down while still unpacking full video.
    #[clap(long = "limit-refresh-rate", default_value_t = 60)]
    pub limit_refresh_rate: u32,
}
