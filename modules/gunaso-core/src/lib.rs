pub mod deps;
pub mod drafts;
pub mod intake;
pub mod lifecycle;
pub mod ratings;
pub mod similarity;
pub mod ward_index;

pub use deps::{ComplaintCore, CoreDeps};
pub use drafts::{ComplaintDraft, DraftStaging, StagedDraft};
pub use intake::{
    ComplaintIntake, DraftDecision, DraftResolution, SubmissionOutcome, SubmissionRequest,
};
pub use lifecycle::{ComplaintLifecycle, DeletionOutcome};
pub use ratings::WardRatings;
pub use similarity::SimilarityFinder;
pub use ward_index::WardIndex;
