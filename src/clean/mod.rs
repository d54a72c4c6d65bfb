pub mod dimension;
pub mod years;
pub mod pipeline;
