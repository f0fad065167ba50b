use crate::TrainId;
#[cfg(feature = "debug")]
use serde_json::json;
#[cfg(feature = "debug")]
use slotmap::Key;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

/// Records a decision pass of a driver.
#[allow(unused)]
pub fn debug_decision(train: TrainId, branch: &str, dec: f64, interval: f64) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "decision",
            "train": train.data().as_ffi(),
            "branch": branch,
            "dec": dec,
            "interval": interval,
        }))
    })
}

/// Records a change of a section's aspect.
#[allow(unused)]
pub fn debug_aspect(section: usize, aspect: usize) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "aspect",
            "section": section,
            "aspect": aspect,
        }))
    })
}

#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
