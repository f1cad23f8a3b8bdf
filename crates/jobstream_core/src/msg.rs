#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The stream request was accepted and the body is being read.
    Connected,
    /// The stream could not be opened at all.
    ConnectFailed { reason: String },
    /// A complete frame came out of the decoder.
    FrameReceived(crate::Frame),
    /// Reading from an open stream failed.
    TransportFailed { reason: String },
    /// The server closed the stream.
    StreamEnded,
    /// Outcome of the manifest retrieval.
    ManifestFetched(Result<crate::Manifest, String>),
    /// One rendering frame elapsed.
    AnimationTick,
    /// One pre-connection simulation interval elapsed.
    SimulationTick,
}
