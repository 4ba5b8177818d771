//! Drive loop between an encoder and the muxer

use log::trace;

use super::health::SessionStats;
use super::state::SessionState;
use super::types::{MediaKind, TimeBase};
use crate::encoder::{Encoder, Received};
use crate::error::{Error, Result};
use crate::mux::Muxer;

/// How long to keep pulling packets out of an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Until the encoder wants more input
    UntilNotReady,
    /// Until the encoder reports end of stream, after a null-frame flush
    UntilEndOfStream,
}

impl Drain {
    /// How far to drain in `state`; fails where no packet may be written.
    pub fn for_state(state: SessionState) -> Result<Self> {
        match state {
            SessionState::Flushing => Ok(Drain::UntilEndOfStream),
            state if state.accepts_packets() => Ok(Drain::UntilNotReady),
            state => Err(Error::Mux(format!(
                "packets cannot be written while {}",
                state
            ))),
        }
    }
}

/// Destination of one encoder's packets inside the container.
#[derive(Debug, Clone)]
pub struct StreamTarget {
    pub kind: MediaKind,
    pub index: usize,
    /// Container time base of the stream
    pub time_base: TimeBase,
    last_dts: Option<i64>,
}

impl StreamTarget {
    pub fn new(kind: MediaKind, index: usize, time_base: TimeBase) -> Self {
        Self {
            kind,
            index,
            time_base,
            last_dts: None,
        }
    }
}

/// Move every packet the encoder has ready into the muxer, rescaled into the
/// stream's time base. While writing this stops once the encoder wants more
/// input; while flushing it runs to end of stream. Returns the number of
/// packets written.
pub fn drain<E: Encoder + ?Sized>(
    encoder: &mut E,
    target: &mut StreamTarget,
    muxer: &mut dyn Muxer,
    stats: &SessionStats,
    state: SessionState,
) -> Result<usize> {
    let mode = Drain::for_state(state)?;
    let mut written = 0;
    loop {
        match encoder.try_receive()? {
            Received::Packet(packet) => {
                let packet = packet
                    .rescale_ts(target.time_base)
                    .with_stream_index(target.index);

                if let Some(dts) = packet.ordering_ts() {
                    if target.last_dts.is_some_and(|last| dts < last) {
                        return Err(Error::Mux(format!(
                            "{} stream went backwards: {} after {}",
                            target.kind,
                            dts,
                            target.last_dts.unwrap_or_default()
                        )));
                    }
                    target.last_dts = Some(dts);
                }

                trace!("{} packet {:?}", target.kind, packet);
                let size = packet.size();
                muxer.write_packet(packet)?;
                stats.record_packet(target.kind, size, mode == Drain::UntilEndOfStream);
                written += 1;
            }
            Received::NotReady if mode == Drain::UntilNotReady => return Ok(written),
            Received::NotReady => {
                return Err(Error::Receive {
                    kind: target.kind,
                    reason: "encoder stalled while flushing".into(),
                });
            }
            Received::EndOfStream => return Ok(written),
        }
    }
}
