//! Message types for the session actor.

use super::stats::StatsCollector;
use crate::devices::MediaDevice;
use crate::facade::{SessionStatusCode, StopDisposition};
use common::types::TileId;
use tokio::sync::oneshot;

/// Commands from the lifecycle controller.
#[derive(Debug)]
pub enum SessionMessage {
    /// Drop accumulated statistics.
    ResetStats { respond_to: oneshot::Sender<()> },

    /// Empty the roster and the slot table, closing volume subscriptions.
    ClearRoster { respond_to: oneshot::Sender<()> },

    /// Replace the device lists shown in the pickers.
    SetDevices {
        inputs: Vec<MediaDevice>,
        outputs: Vec<MediaDevice>,
    },

    /// Snapshot of the statistics collector.
    GetStats {
        respond_to: oneshot::Sender<StatsCollector>,
    },
}

/// Notifications for the rendering shell that are not part of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    StartConnecting { reconnecting: bool },
    Started,
    Stopped {
        code: SessionStatusCode,
        disposition: StopDisposition,
    },
    LocalMuteChanged { muted: bool },
    CanUnmuteChanged { can_unmute: bool },
    ConnectionPoor,
    ConnectionGood,
    SuggestStopVideo,
    DownlinkBandwidthInsufficient {
        estimated_kbps: f64,
        required_kbps: f64,
    },
    AudioInputStreamEnded { device_id: String },
    /// A remote tile could not be shown because every slot is bound.
    TileDropped { tile_id: TileId },
}
