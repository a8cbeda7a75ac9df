pub mod chain;
pub mod machine;
