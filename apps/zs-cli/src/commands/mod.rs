pub mod audit;
pub mod edit;
pub mod files;
pub mod utility;
