//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, ClientConfig, ClientError, Phase, ResearchClient, ResearchRequest, ResearchRun,
    StreamState, split_list,
};
