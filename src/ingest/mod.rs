pub mod backfill;
pub mod dropdown;
pub mod mapper;
pub mod orchestrator;

pub use backfill::backfill_mappings;
pub use dropdown::DropdownOptionResolver;
pub use mapper::QuestionNameMapper;
pub use orchestrator::{Submission, SurveyIngestor};
