pub mod corpus;
pub mod dataset;
pub mod download;
pub mod inspect;
pub mod managers;
pub mod model_config;
pub mod training;
pub mod vocab;
