pub mod clock;
pub mod embedding;
pub mod note;
pub mod similarity;
