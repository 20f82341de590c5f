//! 文本生成层：抽象与 Mock 实现

pub mod mock;
pub mod traits;

pub use mock::MockGenerator;
pub use traits::TextGenerator;
