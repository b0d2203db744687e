use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use ledcast_codecs::PlayoutBuffer;
use ledcast_daemon::cli_args::Opt;
use ledcast_daemon::consumers::drawer::PacedDrawer;
use ledcast_daemon::consumers::matrix::{LedPanel, MatrixSink};
use ledcast_daemon::producers::socket_server::SocketServer;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .finish(),
    )?;

    let opt = match Opt::try_parse() {
        Ok(opt) => opt,
        Err(e) => {
            // Help and version are not failures; anything else is.
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    // The handlers' only action is a single atomic store; both loops
    // poll the flag and wind down on their own.
    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, shutdown.clone())?;
    flag::register(SIGTERM, shutdown.clone())?;

    let mut panel = match LedPanel::new(&opt) {
        Ok(panel) => panel,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    };

    let frames = Arc::new(PlayoutBuffer::new(opt.capacity));
    let fps_drawing = Arc::new(AtomicU32::new(0));

    let matrix_pixels = panel.width() * panel.height();
    let server = SocketServer::bind(
        opt.port,
        matrix_pixels,
        frames.clone(),
        fps_drawing.clone(),
        shutdown.clone(),
    )?;
    let listener_thread = thread::spawn(move || server.run());

    // The draw loop owns the main thread; the matrix driver is never
    // touched from anywhere else.
    let mut drawer = PacedDrawer::new(
        frames,
        shutdown.clone(),
        fps_drawing,
        opt.burn_extra_frames,
    );
    let result = drawer.run(&mut panel);

    // Reached on shutdown or on a fatal draw error; either way stop the
    // listener, which unblocks within its socket timeout.
    shutdown.store(true, Ordering::Relaxed);
    if listener_thread.join().is_err() {
        error!("socket server thread panicked");
    }

    match &result {
        Ok(()) => info!("shut down cleanly"),
        Err(e) => error!("draw loop failed: {e:#}"),
    }
    result
}
