pub mod event;
pub mod filename;
pub mod hash;
pub mod ical;
pub mod jwt;
pub mod pricing;
pub mod results;
pub mod scoring;
pub mod upload;
