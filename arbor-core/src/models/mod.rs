pub mod branch;
pub mod fragment;
pub mod request;

pub use branch::{
    canonical_pair, Branch, BranchFilter, BranchPatch, BranchRecord, BranchType, BranchWrite,
    CreateBranch, NewBranch, DEFAULT_MANUAL_WEIGHT,
};
pub use fragment::{
    Fragment, FragmentFilters, FragmentPatch, FragmentSummary, FragmentType, Metadata,
    NewFragment,
};
pub use request::{AutoLinkRequest, VisualizationRequest};
