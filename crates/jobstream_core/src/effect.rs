#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Stop reading the event stream; the job reached a terminal state.
    CloseStream,
    /// Retrieve the final artifact manifest, exactly once per job.
    FetchManifest { job_id: crate::JobId },
    /// Stop the pre-connection progress ramp.
    StopSimulation,
}
