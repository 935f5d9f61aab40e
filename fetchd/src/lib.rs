pub mod logging;
pub mod paths;
pub mod reporter_tag;
pub mod schedule;
pub mod signals;
pub mod supervisor;
pub mod worker;
