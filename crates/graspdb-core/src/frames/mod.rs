pub mod pose;
pub mod tree;
