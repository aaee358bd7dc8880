//! One-shot wake-ups: the host alarm facility and the scheduler wrapped
//! around it.

pub mod facility;
pub mod scheduler;

pub use facility::{AlarmFacility, AlarmHandle, AlarmRequest, FileAlarmFacility, PendingAlarm};
pub use scheduler::{AlarmScheduler, FETCH_SERVICE_TARGET};
