//! Configuration module

mod site;

pub use site::SiteConfig;
pub use site::CmsConfig;
pub use site::PaginationConfig;
pub use site::PreviewConfig;
pub use site::RevalidateConfig;
pub use site::ACCESS_TOKEN_ENV;
pub use site::PREVIEW_SECRET_ENV;
