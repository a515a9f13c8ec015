//! Follow the discovery daemon with the async reader loop.
//!
//! Run with:
//!   cargo run --example async-watch --features async -- /tmp/upnpy.sock
//!
//! Without a daemon, replay a captured stream in another terminal first:
//!   cargo run --features cli -- serve /tmp/upnpview-demo.sock capture.txt
//!   cargo run --example async-watch --features async -- /tmp/upnpview-demo.sock

use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use upnpview::line::LineCodec;
use upnpview::model::{DeviceForest, Update};
use upnpview::proto::{Session, SessionEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/upnpy.sock".to_string());
    let stream = UnixStream::connect(&path).await?;
    eprintln!("Connected to {path}");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    // The display task keeps its own forest, rebuilt from the updates.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let display = tokio::spawn(async move {
        let mut mirror = DeviceForest::new();
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::Update(update) => {
                    if let Update::NodeAdded { id, parent, .. } = &update {
                        let kind = if parent.is_some() { "sub-device" } else { "device" };
                        println!("+ {kind} {id}");
                    }
                    if let Err(e) = mirror.apply(&update) {
                        eprintln!("Mirror out of sync: {e}");
                        break;
                    }
                }
                SessionEvent::Diagnostic(diagnostic) => {
                    eprintln!("! {}: {diagnostic}", diagnostic.kind());
                }
            }
        }
        mirror
    });

    let mut lines = FramedRead::new(stream, LineCodec::new());
    let mut session = Session::new();
    let mut sink = tx;
    let report = session.run_async(&mut lines, &mut sink, &cancel).await?;
    drop(sink);

    let mirror = display.await?;
    eprintln!(
        "{} devices ({} mirrored), {} lines, {} diagnostics, ended by {:?}",
        report.devices,
        mirror.len(),
        report.lines,
        report.diagnostics,
        report.end
    );
    Ok(())
}
