//! Background replay of a framed feed file into the snapshot board.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use orderbook::clock::format_hms;
use orderbook::{FeedError, FrameReader, Session, SessionConfig, SessionStats};
use tracing::{info, warn};

use crate::board::{BoardSink, SnapshotBoard};
use crate::types::ReplayState;

/// Frames between status refreshes.
const PROGRESS_EVERY: u64 = 1 << 18;

/// Replays `path` to completion. Blocking; run it on a blocking thread.
pub fn run_file(path: &Path, config: SessionConfig, board: &SnapshotBoard) -> Result<SessionStats> {
    let file = File::open(path).with_context(|| format!("open feed {:?}", path));
    let file = match file {
        Ok(file) => file,
        Err(err) => {
            board.update_status(|s| {
                s.state = ReplayState::Failed;
                s.error = Some(format!("{err:#}"));
            });
            return Err(err);
        }
    };
    run(BufReader::with_capacity(1 << 20, file), config, board)
}

pub fn run<R: Read>(
    input: R,
    config: SessionConfig,
    board: &SnapshotBoard,
) -> Result<SessionStats> {
    let mut frames = FrameReader::new(input);
    let mut session = Session::new(config);
    let mut sink = BoardSink::new(board);
    board.set_state(ReplayState::Running);

    let outcome = loop {
        match frames.next_frame() {
            Ok(Some(frame)) => {
                let _ = session.handle_raw(frame);
                session.poll_snapshots(&mut sink);
            }
            Ok(None) => break Ok(()),
            Err(err @ FeedError::ZeroLength { .. }) => warn!(%err, "skipping empty frame"),
            Err(err) => break Err(err),
        }

        if frames.frames() % PROGRESS_EVERY == 0 {
            report(board, &frames, &session, ReplayState::Running);
        }
    };

    session.finish(&mut sink);

    match outcome {
        Ok(()) => {
            report(board, &frames, &session, ReplayState::Completed);
            info!(
                frames = frames.frames(),
                published = sink.published(),
                "replay completed"
            );
            Ok(session.stats().clone())
        }
        Err(err) => {
            report(board, &frames, &session, ReplayState::Failed);
            board.update_status(|s| s.error = Some(err.to_string()));
            Err(err).context("replay aborted")
        }
    }
}

fn report<R: Read>(
    board: &SnapshotBoard,
    frames: &FrameReader<R>,
    session: &Session,
    state: ReplayState,
) {
    board.update_status(|s| {
        s.state = state;
        s.frames = frames.frames();
        s.bytes = frames.offset();
        s.feed_time = format_hms(session.clock().now());
        s.session_ended = session.clock().is_ended();
        s.snapshots = session.stats().snapshots;
        s.stats = Some(session.stats().clone());
    });
}
