//! A set of built-in tools that models can use.

mod calculator;
mod describe_image;
mod read_file;
mod search;
mod speak;

pub use calculator::CalculatorTool;
pub use describe_image::{DESCRIBE_PROMPT, DescribeImageTool};
pub use read_file::ReadFileTool;
pub use search::DuckDuckGoSearchTool;
pub use speak::SpeakTool;
