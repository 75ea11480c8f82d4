pub mod markdown;
pub mod minify;
