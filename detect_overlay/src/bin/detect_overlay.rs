//! Detect overlay binary.
//!
use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use clap::Parser;
use detect_overlay::{
    color::ColorTable,
    config::Args,
    driver::FrameLoop,
    endpoints::{router, Viewer},
    meter::spawn_meter_logger,
    remote::HostedDetector,
    sensors::open_source,
    surface::{load_font, OverlaySurface, StreamingSurface},
};
use env_logger::TimestampPrecision;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let config = args.into_config()?;
    log::debug!("{:?}", &config);

    // Annotated frames are broadcast to all HTTP viewers
    let (frames_tx, _) = broadcast::channel(4);

    let font = load_font(config.font.as_deref())?;
    let surface = StreamingSurface::new(
        OverlaySurface::new(font),
        frames_tx.clone(),
        config.jpeg_quality,
    );
    let colors = match config.deterministic_colors {
        true => ColorTable::deterministic(),
        false => ColorTable::random(),
    };

    let frame_loop = FrameLoop::new(
        open_source(&config.source)?,
        HostedDetector::new(config.hosted)?,
        surface,
        colors,
        config.threshold.clone(),
        config.clock,
    );
    let handle = frame_loop.start().await?;

    spawn_meter_logger(Duration::from_secs(2));

    // Build HTTP server with endpoints
    let app = router(Viewer {
        frames: frames_tx,
        threshold: config.threshold,
    });

    // Serve HTTP server until Ctrl-C
    let addr: SocketAddr = config.server_address;
    log::info!("Serving annotated stream on http://{}", addr);
    let server = axum::Server::bind(&addr).serve(app.into_make_service());

    tokio::select! {
        res = server => res?,
        _ = tokio::signal::ctrl_c() => log::info!("Shutting down"),
    }

    handle.teardown().await?;

    Ok(())
}
