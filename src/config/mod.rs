pub mod schema;
pub mod site;

pub use schema::{
    BrowserConfig, Config, OutputConfig, RetryConfig, SearchConfig, TimingConfig, Viewport,
    WalkConfig,
};
pub use site::{DecedentFields, FieldSpec, PageJump, RepresentativeRules, SiteProfile};
