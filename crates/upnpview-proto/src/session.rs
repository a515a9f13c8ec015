use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, trace, warn};
use upnpview_line::{LineError, LineReader};
use upnpview_model::DeviceForest;

use crate::error::{ProtocolError, SessionError};
use crate::event::{Diagnostic, EventSink, SessionEvent};
use crate::machine::{Outcome, Parser, ParserContext};

/// Why a read loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// The stream reached end of file.
    Eof,
    /// The owner asked the loop to stop.
    Cancelled,
}

/// Summary returned when a read loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    /// Lines processed, including ignored ones.
    pub lines: u64,
    /// Devices in the forest, roots and sub-devices.
    pub devices: usize,
    /// Diagnostics emitted.
    pub diagnostics: u64,
    pub end: EndReason,
}

/// One connection's parser and forest.
///
/// The session is the only writer of its forest. Readers follow along through
/// the [`SessionEvent`]s passed to the sink, one per mutation, in line order.
#[derive(Debug, Default)]
pub struct Session {
    parser: Parser,
    forest: DeviceForest,
    lines: u64,
    diagnostics: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forest(&self) -> &DeviceForest {
        &self.forest
    }

    pub fn into_forest(self) -> DeviceForest {
        self.forest
    }

    pub fn context(&self) -> &ParserContext {
        self.parser.context()
    }

    /// Process one line and report what it did.
    ///
    /// Protocol violations and bad payloads become diagnostics; only a
    /// parser/forest mismatch is returned as an error.
    pub fn process_line<S: EventSink>(
        &mut self,
        line: &str,
        sink: &mut S,
    ) -> Result<(), SessionError> {
        self.lines += 1;
        trace!(line_no = self.lines, len = line.len(), "line");

        match self.parser.feed(&mut self.forest, line) {
            Ok(Outcome::Applied(update)) => sink.emit(SessionEvent::Update(update)),
            Ok(Outcome::Rejected(diagnostic)) => self.diagnose(diagnostic, sink),
            Ok(Outcome::ModeChanged(_) | Outcome::Ignored) => {}
            Err(ProtocolError::NoActiveRoot { id }) => {
                self.diagnose(Diagnostic::NoActiveRoot { id }, sink);
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    /// Report that the stream ended mid-line.
    pub fn truncated<S: EventSink>(&mut self, len: usize, sink: &mut S) {
        self.diagnose(Diagnostic::Truncated { len }, sink);
    }

    /// Drive the session from a blocking line reader.
    ///
    /// Runs until end of stream, a stream error, or `running` is cleared.
    /// `running` is checked between line reads; a read already blocked is
    /// ended by the transport owner (e.g. shutting the socket down).
    pub fn run<R: Read, S: EventSink>(
        &mut self,
        reader: &mut LineReader<R>,
        sink: &mut S,
        running: &AtomicBool,
    ) -> Result<SessionReport, SessionError> {
        loop {
            if !running.load(Ordering::SeqCst) {
                return Ok(self.finish(EndReason::Cancelled));
            }

            match reader.read_line() {
                Ok(Some(line)) => self.process_line(&line, sink)?,
                Ok(None) => return Ok(self.finish(EndReason::Eof)),
                Err(LineError::Truncated { len }) => {
                    self.truncated(len, sink);
                    return Ok(self.finish(EndReason::Eof));
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Drive the session from an async line stream.
    ///
    /// Stops at end of stream, on a stream error, or when `cancel` fires.
    /// Cancellation between reads keeps any partially received line buffered
    /// in `lines`.
    #[cfg(feature = "async")]
    pub async fn run_async<R, S>(
        &mut self,
        lines: &mut tokio_util::codec::FramedRead<R, upnpview_line::LineCodec>,
        sink: &mut S,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Result<SessionReport, SessionError>
    where
        R: tokio::io::AsyncRead + Unpin,
        S: EventSink,
    {
        use futures_core::Stream;

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(self.finish(EndReason::Cancelled)),
                next = std::future::poll_fn(|cx| std::pin::Pin::new(&mut *lines).poll_next(cx)) => next,
            };

            match next {
                Some(Ok(line)) => self.process_line(&line, sink)?,
                None => return Ok(self.finish(EndReason::Eof)),
                Some(Err(LineError::Truncated { len })) => {
                    self.truncated(len, sink);
                    return Ok(self.finish(EndReason::Eof));
                }
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    /// Summary of the session so far.
    pub fn report(&self, end: EndReason) -> SessionReport {
        SessionReport {
            lines: self.lines,
            devices: self.forest.len(),
            diagnostics: self.diagnostics,
            end,
        }
    }

    fn finish(&self, end: EndReason) -> SessionReport {
        let report = self.report(end);
        debug!(
            lines = report.lines,
            devices = report.devices,
            diagnostics = report.diagnostics,
            end = ?report.end,
            "session ended"
        );
        report
    }

    fn diagnose<S: EventSink>(&mut self, diagnostic: Diagnostic, sink: &mut S) {
        self.diagnostics += 1;
        warn!(kind = diagnostic.kind(), line_no = self.lines, "{diagnostic}");
        sink.emit(SessionEvent::Diagnostic(diagnostic));
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::sync::Arc;

    use upnpview_line::LineConfig;
    use upnpview_model::Update;

    use super::*;
    use crate::testutil::png_base64;

    fn run_bytes(bytes: &[u8]) -> (Session, Vec<SessionEvent>, SessionReport) {
        let mut session = Session::new();
        let mut reader = LineReader::new(Cursor::new(bytes.to_vec()));
        let mut events = Vec::new();
        let running = AtomicBool::new(true);
        let report = session.run(&mut reader, &mut events, &running).unwrap();
        (session, events, report)
    }

    fn diagnostics(events: &[SessionEvent]) -> Vec<&Diagnostic> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Diagnostic(d) => Some(d),
                SessionEvent::Update(_) => None,
            })
            .collect()
    }

    #[test]
    fn runs_to_eof_and_reports() {
        let icon = png_base64(2, 2);
        let wire = format!(
            "DEVICE root1\nMETA\nname:Printer\nICON\n{icon}\nSUBDEVICE sub1\nMETA\nport:9100\n"
        );
        let (session, events, report) = run_bytes(wire.as_bytes());

        assert_eq!(
            report,
            SessionReport {
                lines: 8,
                devices: 2,
                diagnostics: 0,
                end: EndReason::Eof,
            }
        );
        // two nodes, two properties, one icon
        assert_eq!(events.len(), 5);
        assert_eq!(session.forest().roots().len(), 1);
    }

    #[test]
    fn events_replay_into_identical_forest() {
        let icon = png_base64(3, 1);
        let wire = format!(
            "DEVICE a\nMETA\nk:v\nICON\n{icon}\nSUBDEVICE a1\nSUBDEVICE a2\nMETA\nx:y\nDEVICE b\n"
        );
        let (session, events, _) = run_bytes(wire.as_bytes());

        let mut mirror = DeviceForest::new();
        for event in &events {
            if let SessionEvent::Update(update) = event {
                mirror.apply(update).unwrap();
            }
        }
        assert_eq!(&mirror, session.forest());
    }

    #[test]
    fn orphan_subdevice_is_a_diagnostic() {
        let (session, events, report) = run_bytes(b"SUBDEVICE orphan\nDEVICE r\nSUBDEVICE s\n");

        let diags = diagnostics(&events);
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0], Diagnostic::NoActiveRoot { id } if id == "orphan"));
        assert_eq!(diags[0].kind(), "no-active-root");
        assert_eq!(report.diagnostics, 1);
        assert_eq!(session.forest().len(), 2);
    }

    #[test]
    fn bad_icon_yields_exactly_one_diagnostic() {
        let (session, events, report) = run_bytes(b"DEVICE r\nICON\n!!!\nMETA\nk:v\n");

        let diags = diagnostics(&events);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind(), "malformed-base64");
        assert_eq!(report.end, EndReason::Eof);

        let root = session.forest().roots()[0];
        assert!(session.forest().icon(root).is_none());
        assert_eq!(session.forest().properties(root).len(), 1);
    }

    #[test]
    fn truncated_tail_is_reported_not_applied() {
        let (session, events, report) = run_bytes(b"DEVICE r\nMETA\nname:Prin");

        let diags = diagnostics(&events);
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0], Diagnostic::Truncated { len: 9 }));
        assert_eq!(report.end, EndReason::Eof);
        assert!(session
            .forest()
            .properties(session.forest().roots()[0])
            .is_empty());
    }

    #[test]
    fn crlf_stream_parses_like_lf() {
        let (session, _, _) = run_bytes(b"DEVICE r\r\nMETA\r\nk:v\r\n");
        let forest = session.forest();
        let root = forest.roots()[0];
        assert_eq!(forest.node(root).unwrap().id(), "r");
        assert_eq!(forest.properties(root)[0].value, "v");
    }

    #[test]
    fn oversized_line_ends_session_with_error() {
        let mut session = Session::new();
        let mut reader = LineReader::with_config(
            Cursor::new(b"DEVICE r\nICON\nAAAAAAAAAAAAAAAAAAAAAAAAAAAA\n".to_vec()),
            LineConfig { max_line_length: 16 },
        );
        let mut events = Vec::new();
        let running = AtomicBool::new(true);

        let err = session.run(&mut reader, &mut events, &running).unwrap_err();
        assert!(matches!(err, SessionError::Line(LineError::LineTooLong { .. })));
        assert_eq!(session.forest().len(), 1);
    }

    #[test]
    fn cleared_flag_stops_before_reading() {
        let mut session = Session::new();
        let mut reader = LineReader::new(Cursor::new(b"DEVICE r\n".to_vec()));
        let mut events = Vec::new();
        let running = AtomicBool::new(false);

        let report = session.run(&mut reader, &mut events, &running).unwrap();
        assert_eq!(report.end, EndReason::Cancelled);
        assert_eq!(report.lines, 0);
        assert!(session.forest().is_empty());
    }

    #[test]
    fn cancellation_between_lines() {
        struct StopAfterFirst {
            running: Arc<AtomicBool>,
            seen: usize,
        }

        impl EventSink for StopAfterFirst {
            fn emit(&mut self, _event: SessionEvent) {
                self.seen += 1;
                self.running.store(false, Ordering::SeqCst);
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let mut sink = StopAfterFirst {
            running: Arc::clone(&running),
            seen: 0,
        };
        let mut session = Session::new();
        let mut reader = LineReader::new(Cursor::new(b"DEVICE a\nDEVICE b\nDEVICE c\n".to_vec()));

        let report = session.run(&mut reader, &mut sink, &running).unwrap();
        assert_eq!(report.end, EndReason::Cancelled);
        assert_eq!(report.lines, 1);
        assert_eq!(sink.seen, 1);
    }

    #[test]
    fn events_cross_threads_over_mpsc() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();

        let reader_thread = std::thread::spawn(move || {
            let mut session = Session::new();
            let mut reader = LineReader::new(right);
            let mut tx = tx;
            let running = AtomicBool::new(true);
            session.run(&mut reader, &mut tx, &running).unwrap()
        });

        let mut left = left;
        left.write_all(b"DEVICE r\nMETA\nk:v\n").unwrap();
        drop(left);

        let report = reader_thread.join().unwrap();
        let events: Vec<SessionEvent> = rx.iter().collect();
        assert_eq!(report.devices, 1);
        assert!(matches!(
            &events[1],
            SessionEvent::Update(Update::PropertyAdded { key, .. }) if key == "k"
        ));
    }

    #[test]
    fn report_serializes_end_reason() {
        let report = Session::new().report(EndReason::Cancelled);
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["end"], "cancelled");
        assert_eq!(json["devices"], 0);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_session_runs_to_eof() {
        use tokio::io::AsyncWriteExt;
        use tokio_util::codec::FramedRead;
        use tokio_util::sync::CancellationToken;
        use upnpview_line::LineCodec;

        let (mut client, server) = tokio::io::duplex(64);
        let icon = png_base64(2, 2);
        let wire = format!("DEVICE root1\nMETA\nname:Printer\nICON\n{icon}\nSUBDEVICE sub1\n");
        let writer = tokio::spawn(async move {
            client.write_all(wire.as_bytes()).await.unwrap();
            client.shutdown().await.unwrap();
        });

        let mut session = Session::new();
        let mut lines = FramedRead::new(server, LineCodec::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut tx = tx;
        let cancel = CancellationToken::new();

        let report = session.run_async(&mut lines, &mut tx, &cancel).await.unwrap();
        writer.await.unwrap();
        drop(tx);

        assert_eq!(report.end, EndReason::Eof);
        assert_eq!(report.devices, 2);
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
        let root = session.forest().roots()[0];
        assert!(session.forest().icon(root).is_some());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_session_stops_on_cancel() {
        use tokio_util::codec::FramedRead;
        use tokio_util::sync::CancellationToken;
        use upnpview_line::LineCodec;

        let (_client, server) = tokio::io::duplex(64);
        let mut session = Session::new();
        let mut lines = FramedRead::new(server, LineCodec::new());
        let mut events = Vec::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = session
            .run_async(&mut lines, &mut events, &cancel)
            .await
            .unwrap();
        assert_eq!(report.end, EndReason::Cancelled);
        assert!(events.is_empty());
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn async_truncation_is_a_diagnostic() {
        use tokio_util::codec::FramedRead;
        use tokio_util::sync::CancellationToken;
        use upnpview_line::LineCodec;

        let mut session = Session::new();
        let mut lines = FramedRead::new(&b"DEVICE r\nMETA\nk:"[..], LineCodec::new());
        let mut events = Vec::new();
        let cancel = CancellationToken::new();

        let report = session
            .run_async(&mut lines, &mut events, &cancel)
            .await
            .unwrap();
        assert_eq!(report.diagnostics, 1);
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Diagnostic(Diagnostic::Truncated { len: 2 }))
        ));
    }
}
