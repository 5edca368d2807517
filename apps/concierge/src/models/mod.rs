pub mod corpus;
pub mod intention;
pub mod training;
