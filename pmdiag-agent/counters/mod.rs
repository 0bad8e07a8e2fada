pub mod rapl;
pub mod thermal;
