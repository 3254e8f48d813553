pub mod loader;
pub mod types;
pub mod utils;

pub use loader::ExcelLoader;
pub use types::{Sheet, SheetSummary, Workbook};
