//! Control plane: block detection and pause/resume
//!
//! Workers feed attempt outcomes to the [`Coordinator`] over one serialized
//! channel and read the pause signal through a [`PauseGate`]. All mutation
//! of control state happens inside the coordinator. Blocked failures wait in
//! a [`ParkingLot`] until a pause resolves.

mod block_detector;
mod coordinator;
mod parking;
mod pause;

pub(crate) use block_detector::RETRY_CANDIDATES;
pub use block_detector::{BlockDetector, BlockReport, DomainSignals};
pub use coordinator::{
    command_channel, ControlCommand, ControlPlane, Coordinator, CoordinatorHandle,
    CoordinatorReport,
};
pub use parking::{Idle, ParkingLot};
pub use pause::{ControlState, GateDecision, PauseController, PauseGate, RunMode};
