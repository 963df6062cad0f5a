//! One student's timed exam attempt.
//!
//! Each session runs as an actor task that owns the answers, the violation counter and the
//! phase. The countdown, the remote-stop poller and client commands race to call the single
//! submit entry point; the first caller wins and every later trigger is a no-op.

mod clock;
mod controller;
mod countdown;
mod registry;
mod remote_stop;


pub(crate) use controller::{
    SessionError, SessionHandle, SessionResult, SessionTimings, SessionView, SubmitDisposition,
    SubmitPreview,
};
pub(crate) use registry::{SessionRegistry, StartError};
