pub mod finding;
pub mod project;
pub mod scan;
pub mod report;
pub mod requests;
pub mod schedule;

pub use finding::*;
pub use project::*;
pub use scan::*;
pub use report::*;
pub use requests::*;
pub use schedule::*;
