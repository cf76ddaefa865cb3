//! Network-activity capture in HTTP Archive (HAR) 1.2 format.
//!
//! The recorder subscribes to the CDP Network domain on a page and feeds a
//! pure builder; stopping the recorder yields the assembled log, which can
//! be written as raw JSON or embedded into a static HTML report.

pub mod log;
mod recorder;
pub mod report;

pub use log::{
    Har, HarBuilder, HarContent, HarCreator, HarEntry, HarHeader, HarLog, HarPage, HarPostData,
    HarQueryParam, HarRequest, HarResponse, HarTimings,
};
pub use recorder::HarRecorder;
pub use report::{write_html, write_json, write_reports};
