pub mod dispatch;
pub mod labels;
pub mod lifecycle;
pub mod pricing;
pub mod quotes;
pub mod splitter;
