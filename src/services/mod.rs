pub(crate) mod analytics;
pub(crate) mod exam_session;
pub(crate) mod exam_store;
pub(crate) mod exam_window;
pub(crate) mod scoring;
pub(crate) mod violation_monitor;
